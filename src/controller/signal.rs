use super::TelemetrySource;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Number of most recent samples averaged into one quality reading.
pub const DEFAULT_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Link latency (`ping_avg`).
    Ping,
    /// Radio signal strength (`signal`).
    Wifi,
}

impl SignalKind {
    pub fn default_metric(&self) -> &'static str {
        match self {
            SignalKind::Ping => "ping_avg",
            SignalKind::Wifi => "signal",
        }
    }
}

/// Smoothed signal quality for one node, read fresh from telemetry on every call.
#[derive(Clone)]
pub struct SignalController {
    source: Arc<dyn TelemetrySource>,
    kind: SignalKind,
    node: String,
    metric: String,
    window: usize,
}

impl SignalController {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        kind: SignalKind,
        node: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind,
            node: node.into(),
            metric: kind.default_metric().to_string(),
            window: DEFAULT_WINDOW,
        }
    }

    /// Latency-quality controller over `ping_avg`.
    pub fn ping(source: Arc<dyn TelemetrySource>, node: impl Into<String>) -> Self {
        Self::new(source, SignalKind::Ping, node)
    }

    /// Link-quality controller over `signal`.
    pub fn wifi(source: Arc<dyn TelemetrySource>, node: impl Into<String>) -> Self {
        Self::new(source, SignalKind::Wifi, node)
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Mean of the last `window` samples, or `0.0` when the series is empty.
    ///
    /// Errors from the telemetry source itself are propagated.
    pub async fn current_quality(&self) -> Result<f64> {
        let samples = self
            .source
            .get_node_resource(&self.node, &self.metric)
            .await?;
        if samples.is_empty() {
            debug!(
                node = self.node.as_str(),
                metric = self.metric.as_str(),
                "no telemetry yet, reporting zero quality"
            );
            return Ok(0.0);
        }

        let recent = &samples[samples.len().saturating_sub(self.window)..];
        Ok(recent.iter().map(|s| s.value).sum::<f64>() / recent.len() as f64)
    }
}

impl std::fmt::Debug for SignalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalController")
            .field("kind", &self.kind)
            .field("node", &self.node)
            .field("metric", &self.metric)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{InMemoryTelemetry, Sample};
    use crate::{Error, ErrorContext};
    use async_trait::async_trait;

    fn seeded(values: &[f64]) -> Arc<InMemoryTelemetry> {
        let telemetry = Arc::new(InMemoryTelemetry::new(100));
        for (i, v) in values.iter().enumerate() {
            telemetry.record_at("node-a", "signal", i as f64, *v).unwrap();
        }
        telemetry
    }

    #[tokio::test]
    async fn test_empty_series_yields_zero() {
        let ctrl = SignalController::wifi(Arc::new(InMemoryTelemetry::default()), "node-a");
        assert_eq!(ctrl.current_quality().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_mean_of_last_three() {
        let ctrl = SignalController::wifi(seeded(&[10.0, 20.0, 30.0, 40.0]), "node-a");
        assert_eq!(ctrl.current_quality().await.unwrap(), 30.0);
    }

    #[test]
    fn test_short_series_uses_all_samples() {
        let ctrl = SignalController::wifi(seeded(&[10.0, 20.0]), "node-a");
        let quality = tokio_test::block_on(ctrl.current_quality()).unwrap();
        assert_eq!(quality, 15.0);
    }

    #[tokio::test]
    async fn test_window_is_configurable() {
        let telemetry = seeded(&[10.0, 20.0, 30.0, 40.0]);
        let last = SignalController::wifi(telemetry.clone(), "node-a").with_window(1);
        assert_eq!(last.current_quality().await.unwrap(), 40.0);

        let all = SignalController::wifi(telemetry.clone(), "node-a").with_window(10);
        assert_eq!(all.current_quality().await.unwrap(), 25.0);

        let clamped = SignalController::wifi(telemetry, "node-a").with_window(0);
        assert_eq!(clamped.window(), 1);
    }

    #[tokio::test]
    async fn test_reads_are_not_cached() {
        let telemetry = seeded(&[10.0]);
        let ctrl = SignalController::wifi(telemetry.clone(), "node-a").with_window(1);
        assert_eq!(ctrl.current_quality().await.unwrap(), 10.0);
        telemetry.record_at("node-a", "signal", 99.0, 70.0).unwrap();
        assert_eq!(ctrl.current_quality().await.unwrap(), 70.0);
    }

    #[test]
    fn test_presets() {
        let telemetry: Arc<dyn TelemetrySource> = Arc::new(InMemoryTelemetry::default());
        let ping = SignalController::ping(telemetry.clone(), "edge-1");
        assert_eq!(ping.metric(), "ping_avg");
        assert_eq!(ping.kind(), SignalKind::Ping);
        assert_eq!(ping.window(), DEFAULT_WINDOW);

        let wifi = SignalController::wifi(telemetry, "").with_metric("rssi");
        assert_eq!(wifi.metric(), "rssi");
        assert_eq!(wifi.node(), "");
    }

    struct Unreachable;

    #[async_trait]
    impl TelemetrySource for Unreachable {
        async fn get_node_resource(&self, _node: &str, _metric: &str) -> Result<Vec<Sample>> {
            Err(Error::telemetry_with_context(
                "connection refused",
                ErrorContext::new().with_source("test"),
            ))
        }
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let ctrl = SignalController::ping(Arc::new(Unreachable), "node-a");
        assert!(matches!(
            ctrl.current_quality().await,
            Err(Error::Telemetry { .. })
        ));
    }
}
