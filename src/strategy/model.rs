use super::LocalExecutionStrategy;
use crate::request::{Kwargs, OffloadServiceRequest, ServiceResponse};
use crate::routing::join_host_path;
use crate::transport::HttpTransport;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

/// Where and how to reach the co-located model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent to the load endpoint.
    pub name: String,
    /// Loopback base address of the model server.
    pub endpoint: String,
    /// Path receiving the one-time load call.
    pub load_path: String,
    /// Fixed invocation path. `None` forwards to the request's own path.
    pub invoke_path: Option<String>,
    /// Bound on concurrent invocations. `None` lets every request through.
    pub max_concurrency: Option<usize>,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: "http://127.0.0.1:8080".to_string(),
            load_path: "/load".to_string(),
            invoke_path: None,
            max_concurrency: None,
            timeout_ms: 30_000,
        }
    }
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_load_path(mut self, path: impl Into<String>) -> Self {
        self.load_path = path.into();
        self
    }

    pub fn with_invoke_path(mut self, path: impl Into<String>) -> Self {
        self.invoke_path = Some(path.into());
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n.max(1));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// A model the server acknowledged loading.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub endpoint: Url,
    /// Whatever the load endpoint returned, `Null` for an empty or non-JSON body.
    pub metadata: serde_json::Value,
}

/// Runs local work by invoking a model loaded once when the strategy is built.
///
/// The handle is immutable after load and the HTTP client is shared, so invocations may
/// run concurrently. `max_concurrency` caps them with a semaphore when the model server
/// cannot take parallel requests.
pub struct ModelExecution {
    handle: ModelHandle,
    invoke_path: Option<String>,
    transport: HttpTransport,
    permits: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for ModelExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelExecution")
            .field("handle", &self.handle)
            .field("invoke_path", &self.invoke_path)
            .finish()
    }
}

impl ModelExecution {
    /// Load the configured model. Any failure is reported as `Error::ModelLoad`.
    pub async fn load(config: ModelConfig) -> Result<Self> {
        let load_err = |message: String| Error::ModelLoad {
            model: config.name.clone(),
            message,
        };

        if config.name.trim().is_empty() {
            return Err(load_err("model name is empty".into()));
        }
        if config.timeout_ms == 0 {
            return Err(load_err("timeout must be greater than zero".into()));
        }
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| load_err(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        let load_url = join_host_path(&config.endpoint, &config.load_path)
            .map_err(|e| load_err(format!("invalid load path '{}': {}", config.load_path, e)))?;

        let transport = HttpTransport::with_timeout(Duration::from_millis(config.timeout_ms))
            .map_err(|e| load_err(e.to_string()))?;

        let mut kwargs = Kwargs::new();
        kwargs.insert("json".into(), serde_json::json!({ "model": config.name }));
        let response = transport
            .execute("post", &load_url, &kwargs)
            .await
            .map_err(|e| load_err(e.to_string()))?;
        if !response.is_success() {
            return Err(load_err(format!(
                "load endpoint answered HTTP {}: {}",
                response.status,
                response.text()
            )));
        }

        let metadata = serde_json::from_slice(&response.body).unwrap_or(serde_json::Value::Null);
        info!(
            model = config.name.as_str(),
            endpoint = endpoint.as_str(),
            "model loaded"
        );

        Ok(Self {
            handle: ModelHandle {
                name: config.name.clone(),
                endpoint,
                metadata,
            },
            invoke_path: config.invoke_path,
            transport,
            permits: config.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        })
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// Forward the request's method and kwargs to the model's invocation endpoint.
    pub async fn invoke_model(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        let _permit = match &self.permits {
            Some(sem) => Some(sem.clone().acquire_owned().await.map_err(|_| {
                Error::runtime_with_context(
                    "model invocation semaphore closed",
                    crate::ErrorContext::new().with_source("model_execution"),
                )
            })?),
            None => None,
        };

        let path = self.invoke_path.as_deref().unwrap_or(req.path());
        let url = join_host_path(self.handle.endpoint.as_str(), path).map_err(|e| {
            Error::validation_with_context(
                format!("invalid invocation path '{}': {}", path, e),
                crate::ErrorContext::new().with_source("model_execution"),
            )
        })?;

        debug!(
            request_id = %req.request_id(),
            model = self.handle.name.as_str(),
            url = url.as_str(),
            "invoking local model"
        );

        req.mark_sent();
        let result = self.transport.execute(req.method(), &url, req.kwargs()).await;
        req.mark_done();
        result
    }
}

#[async_trait]
impl LocalExecutionStrategy for ModelExecution {
    fn name(&self) -> &str {
        "model"
    }

    async fn execute(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        self.invoke_model(req).await
    }
}
