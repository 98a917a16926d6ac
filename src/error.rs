use thiserror::Error;

/// Errors that can stop an engine from being built or a binary from starting.
///
/// Nothing on the probing path produces one of these: per-URL failures are
/// recorded as outcomes instead.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP client construction failed: {0}")]
    ClientBuild(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

impl ProbeError {
    /// Construction errors abort before any URL is read.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::Configuration(_) | ProbeError::ClientBuild(_)
        )
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::ClientBuild(err.to_string())
    }
}
