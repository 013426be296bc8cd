//! Service requests and their timing record.
//!
//! A [`ServiceRequest`] is fixed at creation (service, path, method, kwargs). Only its
//! [`RequestTimings`] change afterwards, and each of `sent` / `done` is written at most once.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::Result;

/// Per-call keyword parameters (`params`, `json`, `data`, `headers`, `timeout`, ...).
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

pub(crate) fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Wall-clock timestamps (seconds since epoch) bracketing one request.
///
/// Writes are clamped so that `created <= sent <= done` holds even if the system clock
/// steps backwards between two readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTimings {
    created: f64,
    sent: Option<f64>,
    done: Option<f64>,
}

impl RequestTimings {
    pub fn new() -> Self {
        Self {
            created: timestamp(),
            sent: None,
            done: None,
        }
    }

    pub fn created(&self) -> f64 {
        self.created
    }

    pub fn sent(&self) -> Option<f64> {
        self.sent
    }

    pub fn done(&self) -> Option<f64> {
        self.done
    }

    /// Record dispatch start. Returns `false` if `sent` was already recorded.
    pub fn record_sent(&mut self) -> bool {
        if self.sent.is_some() {
            return false;
        }
        self.sent = Some(timestamp().max(self.created));
        true
    }

    /// Record completion. Records `sent` first if the dispatch start was never marked.
    /// Returns `false` if `done` was already recorded.
    pub fn record_done(&mut self) -> bool {
        if self.done.is_some() {
            return false;
        }
        self.record_sent();
        let floor = self.sent.unwrap_or(self.created);
        self.done = Some(timestamp().max(floor));
        true
    }

    pub fn is_complete(&self) -> bool {
        self.sent.is_some() && self.done.is_some()
    }

    /// Seconds between dispatch and completion, as seen by the caller.
    pub fn elapsed(&self) -> Option<f64> {
        Some(self.done? - self.sent?)
    }
}

impl Default for RequestTimings {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of work addressed to a logical service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    request_id: Uuid,
    service: String,
    path: String,
    method: String,
    kwargs: Kwargs,
    timings: RequestTimings,
}

impl ServiceRequest {
    pub fn new(
        service: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self::with_kwargs(service, path, method, Kwargs::new())
    }

    pub fn with_kwargs(
        service: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
        kwargs: Kwargs,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            service: service.into(),
            path: path.into(),
            method: method.into(),
            kwargs,
            timings: RequestTimings::new(),
        }
    }

    /// `GET /` against `service`.
    pub fn get(service: impl Into<String>) -> Self {
        Self::new(service, "/", "get")
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn timings(&self) -> &RequestTimings {
        &self.timings
    }

    pub fn created(&self) -> f64 {
        self.timings.created()
    }

    pub fn sent(&self) -> Option<f64> {
        self.timings.sent()
    }

    pub fn done(&self) -> Option<f64> {
        self.timings.done()
    }

    pub fn mark_sent(&mut self) -> bool {
        self.timings.record_sent()
    }

    pub fn mark_done(&mut self) -> bool {
        self.timings.record_done()
    }
}

/// A [`ServiceRequest`] carrying the offload verdict made by its application client.
///
/// `offload == true` forwards the request to a remote host, `false` runs it locally.
/// The verdict is fixed at construction; routers read it but never change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadServiceRequest {
    #[serde(flatten)]
    request: ServiceRequest,
    offload: bool,
}

impl OffloadServiceRequest {
    pub fn new(
        service: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
        offload: bool,
        kwargs: Kwargs,
    ) -> Self {
        Self {
            request: ServiceRequest::with_kwargs(service, path, method, kwargs),
            offload,
        }
    }

    pub fn from_request(request: ServiceRequest, offload: bool) -> Self {
        Self { request, offload }
    }

    pub fn offload(&self) -> bool {
        self.offload
    }

    pub fn into_inner(self) -> ServiceRequest {
        self.request
    }
}

impl Deref for OffloadServiceRequest {
    type Target = ServiceRequest;

    fn deref(&self) -> &ServiceRequest {
        &self.request
    }
}

impl DerefMut for OffloadServiceRequest {
    fn deref_mut(&mut self) -> &mut ServiceRequest {
        &mut self.request
    }
}

impl AsRef<ServiceRequest> for OffloadServiceRequest {
    fn as_ref(&self) -> &ServiceRequest {
        &self.request
    }
}

/// Completed response, whether it came from a remote host, a loopback model, or a stub.
#[derive(Debug, Clone, Default)]
pub struct ServiceResponse {
    pub status: u16,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl ServiceResponse {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_are_ordered_and_written_once() {
        let mut t = RequestTimings::new();
        assert!(t.sent().is_none());
        assert!(t.done().is_none());

        assert!(t.record_sent());
        let sent = t.sent().unwrap();
        assert!(!t.record_sent());
        assert_eq!(t.sent(), Some(sent));

        assert!(t.record_done());
        let done = t.done().unwrap();
        assert!(!t.record_done());
        assert_eq!(t.done(), Some(done));

        assert!(t.created() <= sent);
        assert!(sent <= done);
        assert!(t.elapsed().unwrap() >= 0.0);
    }

    #[test]
    fn test_done_without_sent_backfills_sent() {
        let mut t = RequestTimings::new();
        assert!(t.record_done());
        assert!(t.is_complete());
        assert!(t.created() <= t.sent().unwrap());
        assert!(t.sent().unwrap() <= t.done().unwrap());
    }

    #[test]
    fn test_offload_request_derefs_to_service_request() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("params".into(), serde_json::json!({"q": "1"}));
        let mut req = OffloadServiceRequest::new("svcA", "/infer", "post", true, kwargs);

        assert!(req.offload());
        assert_eq!(req.service(), "svcA");
        assert_eq!(req.path(), "/infer");
        assert_eq!(req.method(), "post");
        assert!(req.kwargs().contains_key("params"));

        assert!(req.mark_sent());
        assert!(req.sent().is_some());
    }

    #[test]
    fn test_get_defaults() {
        let req = ServiceRequest::get("svcA");
        assert_eq!(req.path(), "/");
        assert_eq!(req.method(), "get");
        assert!(req.kwargs().is_empty());
    }

    #[test]
    fn test_response_helpers() {
        let resp = ServiceResponse::new(200, "http://debughost/")
            .with_body(r#"{"ok":true}"#)
            .with_header("content-type", "application/json");
        assert!(resp.is_success());
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(resp.headers.get("content-type").map(String::as_str), Some("application/json"));
        assert!(!ServiceResponse::new(503, "x").is_success());
    }
}
