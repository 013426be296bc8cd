//! Local execution strategies.
//!
//! A strategy runs a request on the current node when its application client decided not
//! to offload it. Every [`OffloadRouter`](crate::routing::OffloadRouter) is built with exactly
//! one strategy:
//!
//! | Strategy | Behavior |
//! |----------|----------|
//! | [`DebugExecution`] | canned `200` response, no I/O |
//! | [`SimulatedExecution`] | sleeps for a configured delay, then answers |
//! | [`ModelExecution`] | loopback HTTP call to a model loaded once at construction |
//! | [`Unimplemented`] | fails every call with `Error::UnimplementedStrategy` |

mod debug;
mod model;
mod simulated;

pub use debug::DebugExecution;
pub use model::{ModelConfig, ModelExecution, ModelHandle};
pub use simulated::SimulatedExecution;

use crate::request::{OffloadServiceRequest, ServiceResponse};
use crate::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait LocalExecutionStrategy: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Execute `req` on this node. Implementations should mark `sent` when the actual work
    /// starts; the router records anything left unset once this returns.
    async fn execute(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse>;
}

/// Placeholder for routers that only forward. Any local call fails loudly.
#[derive(Debug, Default, Clone)]
pub struct Unimplemented;

#[async_trait]
impl LocalExecutionStrategy for Unimplemented {
    fn name(&self) -> &str {
        "unimplemented"
    }

    async fn execute(&self, _req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        Err(Error::UnimplementedStrategy {
            strategy: self.name().to_string(),
        })
    }
}
