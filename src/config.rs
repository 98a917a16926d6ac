//! Configuration management with serde serialization/deserialization
//!
//! Every tunable of a probing run lives in [`Config`], which is handed to the
//! engine at construction time. Nothing here is process-wide state.

use crate::ProbeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Idle period after which a worker with no task retires itself.
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a streamed GET body, in bytes (10 MiB).
pub const MAX_OBJECT_SIZE: u64 = 10 * 1024 * 1024;

/// Deadline applied to each individual HEAD or GET request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default ceiling on concurrently live workers.
pub const DEFAULT_MAX_WORKERS: usize = 1000;

/// Main configuration structure for a probing run
///
/// Controls the worker pool size, request deadlines and the body size
/// ceiling used by the HEAD-then-GET probe.
///
/// # Examples
///
/// ```rust
/// use url_prober::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     max_workers: 50,
///     user_agent: "inventory-bot/2.1".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of workers alive at the same time (default: 1000)
    ///
    /// Tasks queue behind the shared channel once this many workers exist.
    pub max_workers: usize,

    /// Value sent in the `User-Agent` header of every probe request
    pub user_agent: String,

    /// Deadline for each HEAD or GET request (default: 5 seconds)
    ///
    /// Covers connect, headers and, for the streamed GET, the body as well.
    pub request_timeout: Duration,

    /// How long an idle worker waits for a task before retiring (default: 5 seconds)
    pub worker_idle_timeout: Duration,

    /// Largest body accepted on the streamed GET path, in bytes (default: 10 MiB)
    ///
    /// Reading `max_object_size + 1` bytes classifies the URL as "size exceeded".
    pub max_object_size: u64,

    /// Idle keep-alive connections retained per host (default: 100)
    pub max_idle_connections_per_host: usize,

    /// Ask servers for identity encoding so sizes are wire sizes (default: true)
    pub disable_compression: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            user_agent: default_user_agent(),
            request_timeout: REQUEST_TIMEOUT,
            worker_idle_timeout: WORKER_IDLE_TIMEOUT,
            max_object_size: MAX_OBJECT_SIZE,
            max_idle_connections_per_host: 100,
            disable_compression: true,
        }
    }
}

impl Config {
    /// Rejects values that would make a run meaningless or hang forever.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.max_workers == 0 {
            return Err(ProbeError::Configuration(
                "max workers must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ProbeError::Configuration(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.worker_idle_timeout.is_zero() {
            return Err(ProbeError::Configuration(
                "worker idle timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_object_size == 0 {
            return Err(ProbeError::Configuration(
                "max object size must be greater than 0".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(ProbeError::Configuration(
                "user agent must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, ProbeError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }
}

pub fn default_user_agent() -> String {
    format!("url-prober/{}", env!("CARGO_PKG_VERSION"))
}
