//! # URL Prober
//!
//! A concurrent URL prober: reads a list of URLs, asks each server how large the
//! resource is and how long it takes to answer, and tallies the results by
//! outcome label.
//!
//! ## Probing protocol
//!
//! | Step | Request | Answer taken from |
//! |------|---------|-------------------|
//! | 1 | `HEAD` | `Content-Length` header, if declared |
//! | 2 | `GET` | `Content-Length` header, if declared |
//! | 3 | `GET` body | bytes streamed, up to `max_object_size` |
//!
//! Reading more than `max_object_size` bytes yields `size exceeded`. Transport
//! failures yield `request error` or `body read error`, and lines that are not
//! absolute URIs yield `parse error`. Every input line produces exactly one
//! outcome.
//!
//! ## Worker pool
//!
//! - **Elastic**: a worker is started for each accepted URL while fewer than
//!   `max_workers` are alive
//! - **Self-retiring**: a worker with nothing to do for `worker_idle_timeout`
//!   leaves the pool
//! - **Backpressure**: tasks are handed over one at a time, so reading the
//!   input never runs ahead of the workers
//! - **Cooperative stop**: [`StopHandle::stop`] ends input scanning and idle
//!   waits; in-flight requests finish within their own deadline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use url_prober::{Config, ProbeEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ProbeEngine::new(Config::default())?;
//!
//!     let input = "https://example.com/\nhttps://example.org/big.iso\n";
//!     let tally = engine.start(input.as_bytes()).await;
//!
//!     print!("{tally}");
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! url-prober -f urls.txt -m 200 --diagnostics probe.log
//! ```

/// Configuration and settings for a probing run
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Tasks, outcome labels and per-URL diagnostic lines
pub mod outcome;

/// HEAD-then-GET probe executor
pub mod probe;

/// Workers that pull tasks from the shared queue
pub mod worker;

/// Elastic pool bookkeeping and worker spawning
pub mod pool;

/// Outcome tally and the task that owns it
pub mod aggregator;

/// Input dispatch and run lifecycle
pub mod engine;

/// Destination for per-URL diagnostic lines
pub mod diagnostics;

/// Command-line interface implementation
pub mod cli;

/// Performance metrics collection and monitoring
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod test_support;


pub use aggregator::*;
pub use cli::*;
pub use config::*;
pub use diagnostics::{DiagnosticSink, NullSink, WriterSink};
pub use engine::*;
pub use error::*;
pub use metrics::*;
pub use outcome::*;
pub use pool::*;
pub use probe::*;
pub use utils::*;
pub use worker::*;
