use super::LocalExecutionStrategy;
use crate::request::{OffloadServiceRequest, ServiceResponse};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const SIMULATED_HOST: &str = "http://localhost";

/// Stands in for local compute by sleeping a fixed delay before answering.
#[derive(Debug, Clone)]
pub struct SimulatedExecution {
    delay: Duration,
    status: u16,
}

impl SimulatedExecution {
    pub fn new(delay: Duration) -> Self {
        Self { delay, status: 200 }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl LocalExecutionStrategy for SimulatedExecution {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        req.mark_sent();
        debug!(
            request_id = %req.request_id(),
            delay_ms = self.delay.as_millis() as u64,
            "simulating local execution"
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ServiceResponse::new(
            self.status,
            format!("{}{}", SIMULATED_HOST, req.path()),
        ))
    }
}
