//! Request routing: the [`Router`] contract and the offload-capable router.
//!
//! | Type | Role |
//! |------|------|
//! | [`Router`] | turns a request into a completed [`ServiceResponse`] |
//! | [`HostRouter`] | resolves a service name to a concrete URL (external routing table) |
//! | [`StaticRouter`], [`ServiceTable`] | in-process host resolvers |
//! | [`DebugRouter`] | no-I/O router answering canned responses |
//! | [`OffloadRouter`] | chooses remote forwarding or local execution per request |
//! | [`ThroughputObserver`] | coalescing requests-per-interval counter |

mod debug;
mod host;
mod offload;
pub mod throughput;

pub use debug::{DebugRouter, DEBUG_HOST};
pub use host::{join_host_path, HostRouter, ServiceTable, StaticRouter};
pub use offload::{OffloadRouter, OffloadRouterBuilder};
pub use throughput::{ThroughputObserver, ThroughputReport, ThroughputSnapshot};

use crate::request::ServiceResponse;
use crate::Result;
use async_trait::async_trait;

/// Executes one request to completion.
///
/// Implementations must record `sent` before the attempt and `done` once it resolves,
/// on success and on failure alike, so callers can always measure attempted latency.
#[async_trait]
pub trait Router: Send + Sync {
    type Request: Send;

    async fn request(&self, req: &mut Self::Request) -> Result<ServiceResponse>;
}
