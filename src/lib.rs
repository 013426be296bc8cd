//! # edge-offload
//!
//! Signal-quality driven computation offloading for edge and fog nodes.
//!
//! ## Overview
//!
//! For every service request, an application client reads the current link quality of
//! its node (latency, radio signal strength) and decides whether the work should be
//! forwarded to a remote host or executed locally. An [`OffloadRouter`] then carries out
//! that verdict: it resolves a host and performs the HTTP call, or hands the request to a
//! pluggable local execution strategy (debug stub, simulated delay, loopback model).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edge_offload::controller::{InMemoryTelemetry, SignalController};
//! use edge_offload::routing::{OffloadRouter, Router, ServiceTable};
//! use edge_offload::strategy::DebugExecution;
//! use edge_offload::OffloadAppClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> edge_offload::Result<()> {
//!     let telemetry = Arc::new(InMemoryTelemetry::default());
//!     telemetry.record("edge-1", "signal", 12.0)?;
//!
//!     let client = OffloadAppClient::new(SignalController::wifi(telemetry, "edge-1"), None);
//!     let router = OffloadRouter::builder()
//!         .host_router(Arc::new(ServiceTable::new().with_host("svcA", "http://host1:9000")))
//!         .local_strategy(Arc::new(DebugExecution::new()))
//!         .build()?;
//!
//!     let mut req = client.next_service_request("svcA").await?;
//!     let resp = router.request(&mut req).await?;
//!     println!("{} -> {} in {:?}s", resp.url, resp.status, req.timings().elapsed());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`request`] | Service requests, timing records and responses |
//! | [`routing`] | Router contract, host resolution, offload router, throughput observer |
//! | [`strategy`] | Local execution strategies |
//! | [`controller`] | Telemetry source contract and signal-quality controllers |
//! | [`apps`] | Per-application offload policy and request templates |
//! | [`transport`] | HTTP transport for remote and loopback calls |
//! | [`config`] | Environment / YAML configuration and router factory |

pub mod apps;
pub mod config;
pub mod controller;
pub mod request;
pub mod routing;
pub mod strategy;
pub mod transport;

pub use apps::{AppParameters, NextRequest, OffloadAppClient, OffloadPolicy, ThresholdPolicy};
pub use config::OffloadConfig;
pub use request::{OffloadServiceRequest, ServiceRequest, ServiceResponse};
pub use routing::{HostRouter, OffloadRouter, Router};
pub use strategy::LocalExecutionStrategy;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
