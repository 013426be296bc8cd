use super::LocalExecutionStrategy;
use crate::request::{OffloadServiceRequest, ServiceResponse};
use crate::routing::DEBUG_HOST;
use crate::Result;
use async_trait::async_trait;

/// Short-circuits local work to a fixed response at `<host><path>`.
#[derive(Debug, Clone)]
pub struct DebugExecution {
    host: String,
    status: u16,
}

impl DebugExecution {
    pub fn new() -> Self {
        Self {
            host: DEBUG_HOST.to_string(),
            status: 200,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl Default for DebugExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalExecutionStrategy for DebugExecution {
    fn name(&self) -> &str {
        "debug"
    }

    async fn execute(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        req.mark_sent();
        Ok(ServiceResponse::new(
            self.status,
            format!("{}{}", self.host, req.path()),
        ))
    }
}
