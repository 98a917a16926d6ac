//! Result aggregation
//!
//! A single task owns the [`Tally`] for the whole run and is the only writer.
//! It stops when the outcome channel closes, i.e. once every producer has
//! dropped its sender, so no outcome can arrive after it returns.

use crate::{ProbeMetrics, ProbeOutcome};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Occurrence count per outcome label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tally {
    counts: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: impl Into<String>) {
        *self.counts.entry(label.into()).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum over all labels; equals the number of input lines consumed.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    pub fn to_json(&self) -> Result<String, crate::ProbeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (label, count) in rows {
            writeln!(f, "{label}: {count}")?;
        }
        Ok(())
    }
}

pub struct Aggregator {
    outcomes: mpsc::Receiver<ProbeOutcome>,
    metrics: Arc<ProbeMetrics>,
}

impl Aggregator {
    pub fn new(outcomes: mpsc::Receiver<ProbeOutcome>, metrics: Arc<ProbeMetrics>) -> Self {
        Self { outcomes, metrics }
    }

    /// Runs until the channel closes and returns the final tally.
    pub async fn run(mut self) -> Tally {
        let mut tally = Tally::new();
        while let Some(outcome) = self.outcomes.recv().await {
            self.metrics.record_outcome(&outcome);
            tally.record(outcome.label.to_string());
        }
        debug!("Aggregator drained {} outcomes", tally.total());
        tally
    }

    pub fn spawn(self) -> JoinHandle<Tally> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProbeMethod;
    use std::time::Duration;

    fn ok(url: &str) -> ProbeOutcome {
        ProbeOutcome::status(url, ProbeMethod::Head, "200 OK", 1, Duration::from_millis(1))
    }

    #[test]
    fn test_tally_counts_and_renders_sorted() {
        let mut tally = Tally::new();
        tally.record("request error");
        tally.record("200 OK");
        tally.record("200 OK");

        assert_eq!(tally.count("200 OK"), 2);
        assert_eq!(tally.count("size exceeded"), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.len(), 2);
        assert_eq!(tally.to_string(), "200 OK: 2\nrequest error: 1\n");
    }

    #[test]
    fn test_tally_serializes_as_plain_map() {
        let mut tally = Tally::new();
        tally.record("parse error");
        let value: serde_json::Value = serde_json::from_str(&tally.to_json().unwrap()).unwrap();
        assert_eq!(value["parse error"], 1);
    }

    #[tokio::test]
    async fn test_aggregator_drains_until_all_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let handle = Aggregator::new(rx, Arc::new(ProbeMetrics::noop())).spawn();

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    for j in 0..25 {
                        tx.send(ok(&format!("http://host/{i}/{j}"))).await.unwrap();
                    }
                })
            })
            .collect();
        tx.send(ProbeOutcome::parse_error("not a url", "relative URL without a base"))
            .await
            .unwrap();
        drop(tx);
        for producer in producers {
            producer.await.unwrap();
        }

        let tally = handle.await.unwrap();
        assert_eq!(tally.count("200 OK"), 100);
        assert_eq!(tally.count("parse error"), 1);
        assert_eq!(tally.total(), 101);
    }
}
