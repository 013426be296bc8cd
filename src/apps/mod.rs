//! Per-application offload decisions.
//!
//! An [`OffloadAppClient`] reads its [`SignalController`] each time it is asked for the
//! next request and stamps the request with an offload verdict from its
//! [`OffloadPolicy`].

mod policy;

pub use policy::{OffloadPolicy, ThresholdPolicy, DEFAULT_THRESHOLD};

use crate::controller::{SignalController, TelemetrySource};
use crate::request::{Kwargs, OffloadServiceRequest};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Request template of an application (`method`, `path`, `kwargs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppParameters {
    pub method: String,
    pub path: String,
    pub kwargs: Option<Kwargs>,
}

impl Default for AppParameters {
    fn default() -> Self {
        Self {
            method: "get".to_string(),
            path: "/".to_string(),
            kwargs: None,
        }
    }
}

impl AppParameters {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// One fully-formed decision: what to call, and where to run it.
#[derive(Debug, Clone, PartialEq)]
pub struct NextRequest {
    pub method: String,
    pub path: String,
    pub offload: bool,
    pub parameters: Kwargs,
    /// The quality reading behind `offload`.
    pub quality: f64,
}

impl NextRequest {
    pub fn into_parts(self) -> (String, String, bool, Kwargs) {
        (self.method, self.path, self.offload, self.parameters)
    }

    pub fn into_service_request(self, service: impl Into<String>) -> OffloadServiceRequest {
        OffloadServiceRequest::new(service, self.path, self.method, self.offload, self.parameters)
    }
}

/// Decision policy of one application: a signal controller, a policy and a request template.
#[derive(Clone)]
pub struct OffloadAppClient {
    controller: SignalController,
    policy: Arc<dyn OffloadPolicy>,
    method: String,
    path: String,
    parameters: Kwargs,
}

impl OffloadAppClient {
    pub fn new(controller: SignalController, parameters: Option<AppParameters>) -> Self {
        let params = parameters.unwrap_or_default();
        Self {
            controller,
            policy: Arc::new(ThresholdPolicy::default()),
            method: params.method,
            path: params.path,
            parameters: params.kwargs.unwrap_or_default(),
        }
    }

    /// Client deciding on average ping latency of `node`.
    pub fn ping(
        source: Arc<dyn TelemetrySource>,
        node: impl Into<String>,
        parameters: Option<AppParameters>,
    ) -> Self {
        Self::new(SignalController::ping(source, node), parameters)
    }

    /// Client deciding on the radio signal strength of `node`.
    pub fn wifi(
        source: Arc<dyn TelemetrySource>,
        node: impl Into<String>,
        parameters: Option<AppParameters>,
    ) -> Self {
        Self::new(SignalController::wifi(source, node), parameters)
    }

    pub fn with_policy(mut self, policy: Arc<dyn OffloadPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn controller(&self) -> &SignalController {
        &self.controller
    }

    /// Read current signal quality and decide where the next request runs.
    ///
    /// Read-only on the controller; safe to call as often as the caller likes.
    pub async fn next_request(&self) -> Result<NextRequest> {
        let quality = self.controller.current_quality().await?;
        let offload = self.policy.should_offload(quality);
        debug!(
            signal = ?self.controller.kind(),
            node = self.controller.node(),
            quality,
            offload,
            policy = self.policy.name(),
            "offload decision"
        );
        Ok(NextRequest {
            method: self.method.clone(),
            path: self.path.clone(),
            offload,
            parameters: self.parameters.clone(),
            quality,
        })
    }

    /// [`next_request`](Self::next_request) wrapped into a request for `service`.
    pub async fn next_service_request(
        &self,
        service: impl Into<String>,
    ) -> Result<OffloadServiceRequest> {
        Ok(self.next_request().await?.into_service_request(service))
    }
}

impl std::fmt::Debug for OffloadAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadAppClient")
            .field("controller", &self.controller)
            .field("policy", &self.policy.name())
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}
