//! Runtime configuration and factories.
//!
//! Configuration comes from `OFFLOAD_*` environment variables, from any string map with
//! the same keys, or from a YAML document with the field names of [`OffloadConfig`].
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OFFLOAD_ROUTER_TYPE` | `simulated-offload` |
//! | `OFFLOAD_STATIC_HOST` | `http://localhost` |
//! | `OFFLOAD_NODE` | `OFFLOAD_WORKER_NAME`, else empty |
//! | `OFFLOAD_SIGNAL` | `wifi` |
//! | `OFFLOAD_SIGNAL_WINDOW` | `3` |
//! | `OFFLOAD_THRESHOLD` | `30` |
//! | `OFFLOAD_TIMEOUT_MS` | `30000` |
//! | `OFFLOAD_THROUGHPUT_INTERVAL_MS` | `1000` |
//! | `OFFLOAD_SIMULATED_DELAY_MS` | `0` |
//! | `OFFLOAD_MODEL_NAME` | empty |
//! | `OFFLOAD_MODEL_ENDPOINT` | `http://127.0.0.1:8080` |
//! | `OFFLOAD_MODEL_LOAD_PATH` | `/load` |
//! | `OFFLOAD_MODEL_INVOKE_PATH` | request path |
//! | `OFFLOAD_MODEL_MAX_CONCURRENCY` | unbounded |

use crate::apps::{OffloadAppClient, ThresholdPolicy, DEFAULT_THRESHOLD};
use crate::controller::{SignalController, SignalKind, TelemetrySource, DEFAULT_WINDOW};
use crate::routing::{HostRouter, OffloadRouter, StaticRouter};
use crate::strategy::{
    DebugExecution, LocalExecutionStrategy, ModelConfig, ModelExecution, SimulatedExecution,
    Unimplemented,
};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which local strategy an offload router is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouterKind {
    /// Local calls fail with `UnimplementedStrategy`; only offloaded requests succeed.
    RemoteOnly,
    DebugOffload,
    SimulatedOffload,
    AiOffload,
}

impl FromStr for RouterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-only" | "remoteonly" | "offloadrouter" => Ok(RouterKind::RemoteOnly),
            "debug-offload" | "debugoffloadrouter" => Ok(RouterKind::DebugOffload),
            "simulated-offload" | "simulatedoffloadrouter" => Ok(RouterKind::SimulatedOffload),
            "ai-offload" | "aioffloadrouter" => Ok(RouterKind::AiOffload),
            other => Err(Error::configuration_with_context(
                format!("unknown router type '{}'", other),
                ErrorContext::new()
                    .with_field_path("OFFLOAD_ROUTER_TYPE")
                    .with_source("config"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub router_type: RouterKind,
    pub static_host: String,
    /// Node whose telemetry drives the decision.
    pub node: String,
    pub signal: SignalKind,
    pub signal_window: usize,
    pub threshold: f64,
    pub timeout_ms: u64,
    pub throughput_interval_ms: u64,
    pub simulated_delay_ms: u64,
    pub model: ModelConfig,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            router_type: RouterKind::SimulatedOffload,
            static_host: "http://localhost".to_string(),
            node: String::new(),
            signal: SignalKind::Wifi,
            signal_window: DEFAULT_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            timeout_ms: 30_000,
            throughput_interval_ms: 1_000,
            simulated_delay_ms: 0,
            model: ModelConfig::default(),
        }
    }
}

fn parse_key<T: FromStr>(map: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match map.get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("cannot parse '{}'", raw),
                ErrorContext::new().with_field_path(key).with_source("config"),
            )
        }),
    }
}

impl OffloadConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("OFFLOAD_"))
            .collect();
        Self::from_map(&vars)
    }

    /// Build from `OFFLOAD_*` keys in an arbitrary map; missing keys keep their defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(kind) = map.get("OFFLOAD_ROUTER_TYPE") {
            cfg.router_type = kind.parse()?;
        }
        if let Some(host) = map.get("OFFLOAD_STATIC_HOST") {
            cfg.static_host = host.clone();
        }
        if let Some(node) = map
            .get("OFFLOAD_NODE")
            .or_else(|| map.get("OFFLOAD_WORKER_NAME"))
        {
            cfg.node = node.clone();
        }
        if let Some(signal) = map.get("OFFLOAD_SIGNAL") {
            cfg.signal = match signal.trim().to_ascii_lowercase().as_str() {
                "ping" => SignalKind::Ping,
                "wifi" => SignalKind::Wifi,
                other => {
                    return Err(Error::configuration_with_context(
                        format!("unknown signal '{}'", other),
                        ErrorContext::new()
                            .with_field_path("OFFLOAD_SIGNAL")
                            .with_source("config"),
                    ))
                }
            };
        }
        if let Some(v) = parse_key(map, "OFFLOAD_SIGNAL_WINDOW")? {
            cfg.signal_window = v;
        }
        if let Some(v) = parse_key(map, "OFFLOAD_THRESHOLD")? {
            cfg.threshold = v;
        }
        if let Some(v) = parse_key(map, "OFFLOAD_TIMEOUT_MS")? {
            cfg.timeout_ms = v;
        }
        if let Some(v) = parse_key(map, "OFFLOAD_THROUGHPUT_INTERVAL_MS")? {
            cfg.throughput_interval_ms = v;
        }
        if let Some(v) = parse_key(map, "OFFLOAD_SIMULATED_DELAY_MS")? {
            cfg.simulated_delay_ms = v;
        }
        if let Some(name) = map.get("OFFLOAD_MODEL_NAME") {
            cfg.model.name = name.clone();
        }
        if let Some(endpoint) = map.get("OFFLOAD_MODEL_ENDPOINT") {
            cfg.model.endpoint = endpoint.clone();
        }
        if let Some(path) = map.get("OFFLOAD_MODEL_LOAD_PATH") {
            cfg.model.load_path = path.clone();
        }
        if let Some(path) = map.get("OFFLOAD_MODEL_INVOKE_PATH") {
            cfg.model.invoke_path = Some(path.clone());
        }
        if let Some(v) = parse_key(map, "OFFLOAD_MODEL_MAX_CONCURRENCY")? {
            cfg.model.max_concurrency = Some(v);
        }
        cfg.model.timeout_ms = cfg.timeout_ms;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document. As with [`from_map`](Self::from_map), the top-level
    /// `timeout_ms` also bounds the model loader.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let mut cfg: Self = serde_yaml::from_str(s)?;
        cfg.model.timeout_ms = cfg.timeout_ms;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read config: {}", e),
                ErrorContext::new()
                    .with_field_path(path.as_ref().display().to_string())
                    .with_source("config"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: &str| {
            Err(Error::configuration_with_context(
                msg.to_string(),
                ErrorContext::new().with_field_path(field).with_source("config"),
            ))
        };

        if self.signal_window == 0 {
            return invalid("signal_window", "signal window must be at least 1");
        }
        if !self.threshold.is_finite() {
            return invalid("threshold", "threshold must be a finite number");
        }
        if self.timeout_ms == 0 {
            return invalid("timeout_ms", "timeout must be greater than zero");
        }
        if self.throughput_interval_ms == 0 {
            return invalid(
                "throughput_interval_ms",
                "throughput interval must be greater than zero",
            );
        }
        if url::Url::parse(&self.static_host).is_err() {
            return invalid("static_host", "static host is not a valid URL");
        }
        if self.router_type == RouterKind::AiOffload && self.model.name.trim().is_empty() {
            return invalid("model.name", "ai-offload router requires a model name");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn throughput_interval(&self) -> Duration {
        Duration::from_millis(self.throughput_interval_ms)
    }

    pub fn static_router(&self) -> Result<StaticRouter> {
        StaticRouter::new(self.static_host.clone())
    }

    /// Signal controller for the configured node, signal and window.
    pub fn signal_controller(&self, source: Arc<dyn TelemetrySource>) -> SignalController {
        SignalController::new(source, self.signal, self.node.clone())
            .with_window(self.signal_window)
    }

    pub fn app_client(
        &self,
        source: Arc<dyn TelemetrySource>,
        parameters: Option<crate::apps::AppParameters>,
    ) -> OffloadAppClient {
        OffloadAppClient::new(self.signal_controller(source), parameters)
            .with_policy(Arc::new(ThresholdPolicy::new(self.threshold)))
    }
}

/// Build the configured local strategy. For `ai-offload` this loads the model, and a load
/// failure fails the whole build.
pub async fn build_strategy(config: &OffloadConfig) -> Result<Arc<dyn LocalExecutionStrategy>> {
    Ok(match config.router_type {
        RouterKind::RemoteOnly => Arc::new(Unimplemented),
        RouterKind::DebugOffload => Arc::new(DebugExecution::new()),
        RouterKind::SimulatedOffload => Arc::new(SimulatedExecution::new(Duration::from_millis(
            config.simulated_delay_ms,
        ))),
        RouterKind::AiOffload => Arc::new(ModelExecution::load(config.model.clone()).await?),
    })
}

/// Build an offload router around `host_router` as described by `config`.
pub async fn build_router(
    config: &OffloadConfig,
    host_router: Arc<dyn HostRouter>,
) -> Result<OffloadRouter> {
    config.validate()?;
    let strategy = build_strategy(config).await?;
    OffloadRouter::builder()
        .host_router(host_router)
        .local_strategy(strategy)
        .timeout(config.timeout())
        .throughput_interval(config.throughput_interval())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = OffloadConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg.router_type, RouterKind::SimulatedOffload);
        assert_eq!(cfg.static_host, "http://localhost");
        assert_eq!(cfg.signal_window, 3);
        assert_eq!(cfg.threshold, 30.0);
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.throughput_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_map_overrides() {
        let cfg = OffloadConfig::from_map(&map(&[
            ("OFFLOAD_ROUTER_TYPE", "debug-offload"),
            ("OFFLOAD_WORKER_NAME", "edge-7"),
            ("OFFLOAD_SIGNAL", "ping"),
            ("OFFLOAD_SIGNAL_WINDOW", "5"),
            ("OFFLOAD_THRESHOLD", "42.5"),
            ("OFFLOAD_TIMEOUT_MS", "1500"),
            ("OFFLOAD_MODEL_MAX_CONCURRENCY", "2"),
        ]))
        .unwrap();
        assert_eq!(cfg.router_type, RouterKind::DebugOffload);
        assert_eq!(cfg.node, "edge-7");
        assert_eq!(cfg.signal, SignalKind::Ping);
        assert_eq!(cfg.signal_window, 5);
        assert_eq!(cfg.threshold, 42.5);
        assert_eq!(cfg.model.timeout_ms, 1500);
        assert_eq!(cfg.model.max_concurrency, Some(2));
    }

    #[test]
    fn test_node_takes_precedence_over_worker_name() {
        let cfg = OffloadConfig::from_map(&map(&[
            ("OFFLOAD_NODE", "edge-1"),
            ("OFFLOAD_WORKER_NAME", "edge-7"),
        ]))
        .unwrap();
        assert_eq!(cfg.node, "edge-1");
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = OffloadConfig::from_map(&map(&[("OFFLOAD_SIGNAL_WINDOW", "three")])).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("OFFLOAD_SIGNAL_WINDOW")
        );

        let err = OffloadConfig::from_map(&map(&[("OFFLOAD_SIGNAL_WINDOW", "0")])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let err = OffloadConfig::from_map(&map(&[("OFFLOAD_ROUTER_TYPE", "quantum")])).unwrap_err();
        assert!(err.to_string().contains("unknown router type"));
    }

    #[test]
    fn test_router_kind_accepts_legacy_names() {
        assert_eq!(
            "SimulatedOffloadRouter".parse::<RouterKind>().unwrap(),
            RouterKind::SimulatedOffload
        );
        assert_eq!(
            "AIOffloadRouter".parse::<RouterKind>().unwrap(),
            RouterKind::AiOffload
        );
    }

    #[test]
    fn test_ai_offload_requires_model_name() {
        let err =
            OffloadConfig::from_map(&map(&[("OFFLOAD_ROUTER_TYPE", "ai-offload")])).unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("model.name")
        );
    }

    #[test]
    fn test_from_yaml() {
        let cfg = OffloadConfig::from_yaml_str(
            r#"
router_type: ai-offload
node: edge-3
signal: ping
threshold: 50
model:
  name: mobilenet
  endpoint: http://127.0.0.1:9090
  max_concurrency: 1
"#,
        )
        .unwrap();
        assert_eq!(cfg.router_type, RouterKind::AiOffload);
        assert_eq!(cfg.signal, SignalKind::Ping);
        assert_eq!(cfg.model.name, "mobilenet");
        assert_eq!(cfg.model.load_path, "/load");
        assert_eq!(cfg.model.max_concurrency, Some(1));
        assert_eq!(cfg.signal_window, 3);
    }

    #[test]
    fn test_yaml_timeout_applies_to_model_loader() {
        let cfg = OffloadConfig::from_yaml_str(
            r#"
timeout_ms: 1500
model:
  name: mobilenet
"#,
        )
        .unwrap();
        assert_eq!(cfg.timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.model.timeout_ms, 1500);
    }

    #[test]
    fn test_missing_yaml_file() {
        let err = OffloadConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_build_router_per_kind() {
        let host: Arc<dyn HostRouter> = Arc::new(StaticRouter::new("http://localhost").unwrap());
        for (kind, name) in [
            (RouterKind::RemoteOnly, "unimplemented"),
            (RouterKind::DebugOffload, "debug"),
            (RouterKind::SimulatedOffload, "simulated"),
        ] {
            let cfg = OffloadConfig {
                router_type: kind,
                ..OffloadConfig::default()
            };
            let router = build_router(&cfg, host.clone()).await.unwrap();
            assert_eq!(router.strategy_name(), name);
            assert_eq!(router.timeout(), Some(Duration::from_secs(30)));
        }
    }

    #[tokio::test]
    async fn test_ai_offload_build_fails_when_model_unreachable() {
        let cfg = OffloadConfig {
            router_type: RouterKind::AiOffload,
            model: ModelConfig::new("resnet", "http://127.0.0.1:1")
                .with_timeout(Duration::from_secs(2)),
            ..OffloadConfig::default()
        };
        let host: Arc<dyn HostRouter> = Arc::new(StaticRouter::new("http://localhost").unwrap());
        let err = build_router(&cfg, host).await.err().unwrap();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }
}
