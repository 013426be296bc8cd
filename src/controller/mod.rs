//! Signal-quality controllers and the telemetry source they read from.
//!
//! The telemetry store itself is external; [`TelemetrySource`] is its read-only
//! boundary. [`InMemoryTelemetry`] is an in-process implementation for tests, demos and
//! single-node setups.

mod signal;

pub use signal::{SignalController, SignalKind, DEFAULT_WINDOW};

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// One observation of a node metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since epoch.
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Node-keyed time series of named metrics.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Samples of `metric` on `node`, oldest first. Empty when nothing was recorded.
    async fn get_node_resource(&self, node: &str, metric: &str) -> Result<Vec<Sample>>;
}

/// Bounded in-memory telemetry store.
pub struct InMemoryTelemetry {
    series: RwLock<HashMap<(String, String), VecDeque<Sample>>>,
    max_samples: usize,
}

impl InMemoryTelemetry {
    /// Keep at most `max_samples` per (node, metric) series.
    pub fn new(max_samples: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            max_samples: max_samples.max(1),
        }
    }

    /// Record `value` stamped with the current time.
    pub fn record(&self, node: &str, metric: &str, value: f64) -> Result<()> {
        self.record_at(node, metric, crate::request::timestamp(), value)
    }

    /// Record a sample at an explicit timestamp, keeping the series ordered.
    pub fn record_at(&self, node: &str, metric: &str, timestamp: f64, value: f64) -> Result<()> {
        let mut series = self.series.write().map_err(|_| poisoned())?;
        let samples = series
            .entry((node.to_string(), metric.to_string()))
            .or_default();
        let pos = samples.partition_point(|s| s.timestamp <= timestamp);
        samples.insert(pos, Sample::new(timestamp, value));
        while samples.len() > self.max_samples {
            samples.pop_front();
        }
        Ok(())
    }

    pub fn clear(&self) {
        if let Ok(mut series) = self.series.write() {
            series.clear();
        }
    }

    pub fn len(&self, node: &str, metric: &str) -> usize {
        self.series
            .read()
            .ok()
            .and_then(|s| s.get(&(node.to_string(), metric.to_string())).map(VecDeque::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.series.read().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Default for InMemoryTelemetry {
    fn default() -> Self {
        // three minutes of one-per-second samples
        Self::new(180)
    }
}

fn poisoned() -> Error {
    Error::telemetry_with_context(
        "InMemoryTelemetry poisoned",
        ErrorContext::new().with_source("in_memory_telemetry"),
    )
}

#[async_trait]
impl TelemetrySource for InMemoryTelemetry {
    async fn get_node_resource(&self, node: &str, metric: &str) -> Result<Vec<Sample>> {
        let series = self.series.read().map_err(|_| poisoned())?;
        Ok(series
            .get(&(node.to_string(), metric.to_string()))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_series_are_keyed_by_node_and_metric() {
        let telemetry = InMemoryTelemetry::new(10);
        telemetry.record_at("node-a", "signal", 1.0, 50.0).unwrap();
        telemetry.record_at("node-b", "signal", 1.0, 10.0).unwrap();

        let a = telemetry.get_node_resource("node-a", "signal").await.unwrap();
        assert_eq!(a, vec![Sample::new(1.0, 50.0)]);
        assert!(telemetry
            .get_node_resource("node-a", "ping_avg")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_samples_are_sorted() {
        let telemetry = InMemoryTelemetry::new(10);
        telemetry.record_at("n", "m", 3.0, 3.0).unwrap();
        telemetry.record_at("n", "m", 1.0, 1.0).unwrap();
        telemetry.record_at("n", "m", 2.0, 2.0).unwrap();
        let values: Vec<f64> = telemetry
            .get_node_resource("n", "m")
            .await
            .unwrap()
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_retention_drops_oldest() {
        let telemetry = InMemoryTelemetry::new(2);
        for i in 0..5 {
            telemetry.record_at("n", "m", i as f64, i as f64).unwrap();
        }
        assert_eq!(telemetry.len("n", "m"), 2);
        telemetry.clear();
        assert!(telemetry.is_empty());
    }
}
