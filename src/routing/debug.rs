use super::Router;
use crate::request::{ServiceRequest, ServiceResponse};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

pub const DEBUG_HOST: &str = "http://debughost";

/// Router that never touches the network: every request answers `200` from
/// `http://debughost<path>`.
#[derive(Debug, Default, Clone)]
pub struct DebugRouter;

impl DebugRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn url_for(req: &ServiceRequest) -> String {
        format!("{}{}", DEBUG_HOST, req.path())
    }
}

#[async_trait]
impl Router for DebugRouter {
    type Request = ServiceRequest;

    async fn request(&self, req: &mut ServiceRequest) -> Result<ServiceResponse> {
        debug!(
            request_id = %req.request_id(),
            service = req.service(),
            path = req.path(),
            "DebugRouter received service request"
        );
        req.mark_sent();
        let response = ServiceResponse::new(200, Self::url_for(req));
        req.mark_done();
        Ok(response)
    }
}
