//! HEAD-then-GET probe executor
//!
//! A probe first asks for headers only. When the server declares a
//! `Content-Length` the answer is taken from that header; otherwise a GET is
//! issued and, if that still declares nothing, the body is streamed and
//! counted up to the configured ceiling. Every path yields exactly one
//! [`ProbeOutcome`] and drops the response before returning.

use crate::{Config, ProbeError, ProbeMethod, ProbeMetrics, ProbeOutcome, ProbeTask};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Anything that can turn a task into an outcome.
///
/// Implementations must never fail: every error becomes an outcome label.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, task: &ProbeTask) -> ProbeOutcome;
}

pub struct HttpProber {
    client: Client,
    max_object_size: u64,
    metrics: Arc<ProbeMetrics>,
}

impl HttpProber {
    pub fn new(config: &Config) -> Result<Self, ProbeError> {
        Self::with_metrics(config, Arc::new(ProbeMetrics::noop()))
    }

    pub fn with_metrics(config: &Config, metrics: Arc<ProbeMetrics>) -> Result<Self, ProbeError> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_idle_connections_per_host)
            .user_agent(config.user_agent.clone());

        if config.disable_compression {
            builder = builder.no_gzip().no_brotli().no_deflate();
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            max_object_size: config.max_object_size,
            metrics,
        })
    }

    async fn stream_body(
        &self,
        task: &ProbeTask,
        mut response: Response,
        started: Instant,
    ) -> ProbeOutcome {
        let status = status_line(response.status());
        let cap = self.max_object_size.saturating_add(1);
        let mut read: u64 = 0;

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    read = read.saturating_add(chunk.len() as u64);
                    if read >= cap {
                        return ProbeOutcome::size_exceeded(
                            task.as_str(),
                            self.max_object_size,
                            started.elapsed(),
                        );
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return ProbeOutcome::body_read_error(task.as_str(), started.elapsed(), e);
                }
            }
        }

        ProbeOutcome::status(
            task.as_str(),
            ProbeMethod::Get,
            status,
            read,
            started.elapsed(),
        )
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, task: &ProbeTask) -> ProbeOutcome {
        let started = Instant::now();

        let head = match self.client.head(task.url().clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeOutcome::request_error(
                    task.as_str(),
                    ProbeMethod::Head,
                    started.elapsed(),
                    e,
                );
            }
        };

        if let Some(length) = declared_length(&head) {
            return ProbeOutcome::status(
                task.as_str(),
                ProbeMethod::Head,
                status_line(head.status()),
                length,
                started.elapsed(),
            );
        }
        drop(head);

        debug!("HEAD declared no length for {}, falling back to GET", task.as_str());
        self.metrics.record_head_fallback();

        let get = match self.client.get(task.url().clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeOutcome::request_error(
                    task.as_str(),
                    ProbeMethod::Get,
                    started.elapsed(),
                    e,
                );
            }
        };

        if let Some(length) = declared_length(&get) {
            return ProbeOutcome::status(
                task.as_str(),
                ProbeMethod::Get,
                status_line(get.status()),
                length,
                started.elapsed(),
            );
        }

        self.stream_body(task, get, started).await
    }
}

/// `"<code> <reason>"` for registered codes, the bare code otherwise.
fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_str(), reason),
        None => status.as_str().to_string(),
    }
}

/// The `Content-Length` header as sent by the server.
///
/// Read from the header map rather than the body size hint: a HEAD response
/// has an empty body whatever the server declared.
fn declared_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
