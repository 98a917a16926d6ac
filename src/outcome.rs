//! Values that flow through the engine: validated tasks in, outcomes out.

use crate::format_duration;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// A URL that passed syntax validation and is waiting for a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    url: Url,
}

impl ProbeTask {
    /// Validates `line` as an absolute URI.
    pub fn parse(line: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(line)?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// HTTP method that produced an answer for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeMethod {
    Head,
    Get,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::Head => f.write_str("HEAD"),
            ProbeMethod::Get => f.write_str("GET"),
        }
    }
}

/// Classification used as the tally key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutcomeLabel {
    /// Status line of the answering response, e.g. `200 OK`.
    Status(String),
    /// The input line is not an absolute URI.
    ParseError,
    /// The request could not be sent or did not complete.
    RequestError,
    /// The GET body failed mid-stream.
    BodyReadError,
    /// The GET body is larger than the configured ceiling.
    SizeExceeded,
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeLabel::Status(line) => f.write_str(line),
            OutcomeLabel::ParseError => f.write_str("parse error"),
            OutcomeLabel::RequestError => f.write_str("request error"),
            OutcomeLabel::BodyReadError => f.write_str("body read error"),
            OutcomeLabel::SizeExceeded => f.write_str("size exceeded"),
        }
    }
}

/// Result of one probe, produced exactly once per input line.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub url: String,
    pub label: OutcomeLabel,
    pub method: Option<ProbeMethod>,
    /// Declared or counted body size; absent for every error label.
    pub size: Option<u64>,
    pub elapsed: Duration,
    pub detail: Option<String>,
}

impl ProbeOutcome {
    pub fn status(
        url: impl Into<String>,
        method: ProbeMethod,
        status_line: impl Into<String>,
        size: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            label: OutcomeLabel::Status(status_line.into()),
            method: Some(method),
            size: Some(size),
            elapsed,
            detail: None,
        }
    }

    pub fn parse_error(line: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            url: line.into(),
            label: OutcomeLabel::ParseError,
            method: None,
            size: None,
            elapsed: Duration::ZERO,
            detail: Some(reason.to_string()),
        }
    }

    pub fn request_error(
        url: impl Into<String>,
        method: ProbeMethod,
        elapsed: Duration,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            url: url.into(),
            label: OutcomeLabel::RequestError,
            method: Some(method),
            size: None,
            elapsed,
            detail: Some(error.to_string()),
        }
    }

    pub fn body_read_error(url: impl Into<String>, elapsed: Duration, error: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            label: OutcomeLabel::BodyReadError,
            method: Some(ProbeMethod::Get),
            size: None,
            elapsed,
            detail: Some(error.to_string()),
        }
    }

    pub fn size_exceeded(url: impl Into<String>, limit: u64, elapsed: Duration) -> Self {
        Self {
            url: url.into(),
            label: OutcomeLabel::SizeExceeded,
            method: Some(ProbeMethod::Get),
            size: None,
            elapsed,
            detail: Some(format!("MaxSize {limit} limit exceeded")),
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self.label, OutcomeLabel::Status(_))
    }

    /// One line of human-readable diagnostics for the sink.
    pub fn diagnostic_line(&self) -> String {
        let method = self
            .method
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = self.detail.as_deref().unwrap_or("");

        match &self.label {
            OutcomeLabel::Status(_) => format!(
                "Result of querying({}) URL:{}, size(byte)={} , time query={}",
                method,
                self.url,
                self.size.unwrap_or(0),
                format_duration(self.elapsed)
            ),
            OutcomeLabel::ParseError => format!("Error parsing URL:{} ({})", self.url, detail),
            OutcomeLabel::RequestError => {
                format!("Error querying({}) URL:{} (error={})", method, self.url, detail)
            }
            OutcomeLabel::BodyReadError => {
                format!("Error reading body URL:{} (error={})", self.url, detail)
            }
            OutcomeLabel::SizeExceeded => format!("Error {} URL:{}", detail, self.url),
        }
    }
}
