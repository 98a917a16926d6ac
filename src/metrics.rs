use crate::{OutcomeLabel, ProbeError, ProbeOutcome};
use metrics::{Counter, Gauge, Histogram};
use std::net::SocketAddr;
use tracing::info;

pub struct ProbeMetrics {
    pub probes_total: Counter,
    pub head_fallbacks: Counter,
    pub parse_errors: Counter,
    pub request_errors: Counter,
    pub size_exceeded: Counter,
    pub probe_duration: Histogram,
    pub live_workers: Gauge,
    pub workers_spawned: Counter,
    pub workers_retired: Counter,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self {
            probes_total: metrics::register_counter!("url_prober_probes_total"),
            head_fallbacks: metrics::register_counter!("url_prober_head_fallbacks_total"),
            parse_errors: metrics::register_counter!("url_prober_parse_errors_total"),
            request_errors: metrics::register_counter!("url_prober_request_errors_total"),
            size_exceeded: metrics::register_counter!("url_prober_size_exceeded_total"),
            probe_duration: metrics::register_histogram!("url_prober_probe_duration_seconds"),
            live_workers: metrics::register_gauge!("url_prober_live_workers"),
            workers_spawned: metrics::register_counter!("url_prober_workers_spawned_total"),
            workers_retired: metrics::register_counter!("url_prober_workers_retired_total"),
        }
    }

    /// Handles that go nowhere, for tests and embedders without a recorder.
    pub fn noop() -> Self {
        Self {
            probes_total: Counter::noop(),
            head_fallbacks: Counter::noop(),
            parse_errors: Counter::noop(),
            request_errors: Counter::noop(),
            size_exceeded: Counter::noop(),
            probe_duration: Histogram::noop(),
            live_workers: Gauge::noop(),
            workers_spawned: Counter::noop(),
            workers_retired: Counter::noop(),
        }
    }

    pub fn record_outcome(&self, outcome: &ProbeOutcome) {
        match outcome.label {
            OutcomeLabel::ParseError => {
                self.parse_errors.increment(1);
                return;
            }
            OutcomeLabel::RequestError | OutcomeLabel::BodyReadError => {
                self.request_errors.increment(1)
            }
            OutcomeLabel::SizeExceeded => self.size_exceeded.increment(1),
            OutcomeLabel::Status(_) => {}
        }

        self.probes_total.increment(1);
        self.probe_duration.record(outcome.elapsed.as_secs_f64());
    }

    pub fn record_head_fallback(&self) {
        self.head_fallbacks.increment(1);
    }

    pub fn record_worker_spawned(&self, live: usize) {
        self.workers_spawned.increment(1);
        self.live_workers.set(live as f64);
    }

    pub fn record_worker_exit(&self, live: usize, idle_retired: bool) {
        if idle_retired {
            self.workers_retired.increment(1);
        }
        self.live_workers.set(live as f64);
    }
}

impl Default for ProbeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PrometheusExporter {
    addr: SocketAddr,
}

impl PrometheusExporter {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Installs the global recorder and serves `/metrics` on the configured address.
    pub fn install(&self) -> Result<(), ProbeError> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .install()
            .map_err(|e| ProbeError::Metrics(e.to_string()))?;

        info!("Prometheus metrics listening on {}", self.addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProbeMethod;
    use std::time::Duration;

    #[test]
    fn test_noop_metrics_accept_every_outcome() {
        let metrics = ProbeMetrics::noop();
        metrics.record_outcome(&ProbeOutcome::parse_error("nope", "relative URL without a base"));
        metrics.record_outcome(&ProbeOutcome::status(
            "http://host/1",
            ProbeMethod::Get,
            "200 OK",
            7,
            Duration::from_millis(4),
        ));
        metrics.record_head_fallback();
        metrics.record_worker_spawned(1);
        metrics.record_worker_exit(0, true);
    }
}
