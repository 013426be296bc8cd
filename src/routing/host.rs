use crate::request::ServiceRequest;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Resolves a request's logical service to a concrete address.
///
/// Implementations may block (e.g. on a shared routing table); the offload router treats
/// the lookup as opaque.
#[async_trait]
pub trait HostRouter: Send + Sync {
    async fn resolve(&self, req: &ServiceRequest) -> Result<Url>;
}

/// Concatenate `host` and `path` into a URL, tolerating a missing or doubled slash.
pub fn join_host_path(host: &str, path: &str) -> std::result::Result<Url, url::ParseError> {
    let host = host.trim_end_matches('/');
    if path.starts_with('/') {
        Url::parse(&format!("{}{}", host, path))
    } else {
        Url::parse(&format!("{}/{}", host, path))
    }
}

/// Sends every request to one fixed host, regardless of its service.
#[derive(Debug, Clone)]
pub struct StaticRouter {
    host: String,
}

impl StaticRouter {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        Url::parse(&host).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid static host '{}': {}", host, e),
                ErrorContext::new()
                    .with_field_path("static_host")
                    .with_source("static_router"),
            )
        })?;
        Ok(Self { host })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl HostRouter for StaticRouter {
    async fn resolve(&self, req: &ServiceRequest) -> Result<Url> {
        join_host_path(&self.host, req.path()).map_err(|e| {
            Error::resolution(
                req.service(),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("static_router"),
            )
        })
    }
}

/// In-memory service → hosts table, rotating over a service's hosts round-robin.
///
/// Stands in for the external routing table; hosts carry no weights.
#[derive(Default)]
pub struct ServiceTable {
    hosts: RwLock<HashMap<String, Vec<String>>>,
    cursor: AtomicUsize,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, service: impl Into<String>, host: impl Into<String>) -> Self {
        self.hosts
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(service.into())
            .or_default()
            .push(host.into());
        self
    }

    pub fn add_host(&self, service: impl Into<String>, host: impl Into<String>) -> Result<()> {
        self.write()?
            .entry(service.into())
            .or_default()
            .push(host.into());
        Ok(())
    }

    pub fn remove_service(&self, service: &str) -> Result<Option<Vec<String>>> {
        Ok(self.write()?.remove(service))
    }

    pub fn hosts(&self, service: &str) -> Result<Vec<String>> {
        Ok(self.read()?.get(service).cloned().unwrap_or_default())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<String>>>> {
        self.hosts.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<String>>>> {
        self.hosts.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::runtime_with_context(
        "ServiceTable poisoned",
        ErrorContext::new().with_source("service_table"),
    )
}

#[async_trait]
impl HostRouter for ServiceTable {
    async fn resolve(&self, req: &ServiceRequest) -> Result<Url> {
        let host = {
            let hosts = self.read()?;
            let candidates = hosts
                .get(req.service())
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    Error::resolution(
                        req.service(),
                        ErrorContext::new()
                            .with_details("no hosts registered")
                            .with_source("service_table"),
                    )
                })?;
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
            candidates[idx].clone()
        };

        join_host_path(&host, req.path()).map_err(|e| {
            Error::resolution(
                req.service(),
                ErrorContext::new()
                    .with_details(format!("invalid host '{}': {}", host, e))
                    .with_source("service_table"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_join_host_path() {
        assert_eq!(
            join_host_path("http://host1:9000", "/").unwrap().as_str(),
            "http://host1:9000/"
        );
        assert_eq!(
            join_host_path("http://host1:9000/", "/api").unwrap().as_str(),
            "http://host1:9000/api"
        );
        assert_eq!(
            join_host_path("http://host1:9000", "api").unwrap().as_str(),
            "http://host1:9000/api"
        );
    }

    #[tokio::test]
    async fn test_static_router_ignores_service() {
        let router = StaticRouter::new("http://localhost").unwrap();
        let url = router
            .resolve(&ServiceRequest::new("anything", "/x", "get"))
            .await
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost/x");
    }

    #[test]
    fn test_static_router_rejects_bad_host() {
        assert!(matches!(
            StaticRouter::new("not a url"),
            Err(Error::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_service_table_round_robin() {
        let table = ServiceTable::new()
            .with_host("svcA", "http://host1:9000")
            .with_host("svcA", "http://host2:9000");
        let req = ServiceRequest::get("svcA");

        let first = table.resolve(&req).await.unwrap();
        let second = table.resolve(&req).await.unwrap();
        let third = table.resolve(&req).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(table.hosts("svcA").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_service_table_unknown_service() {
        let table = ServiceTable::new().with_host("svcA", "http://host1:9000");
        let err = table.resolve(&ServiceRequest::get("svcB")).await.unwrap_err();
        match err {
            Error::Resolution { service, .. } => assert_eq!(service, "svcB"),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(table.remove_service("svcA").unwrap().map(|h| h.len()), Some(1));
        assert!(table.resolve(&ServiceRequest::get("svcA")).await.is_err());
    }

    #[test]
    fn test_poisoned_table_reports_runtime_error() {
        let table = Arc::new(ServiceTable::new().with_host("svcA", "http://host1:9000"));
        let clone = table.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.hosts.write().unwrap();
            panic!("poison the table");
        })
        .join();

        assert!(matches!(
            table.add_host("svcB", "http://host2:9000"),
            Err(Error::Runtime { .. })
        ));
        assert!(matches!(table.hosts("svcA"), Err(Error::Runtime { .. })));
        assert!(matches!(table.remove_service("svcA"), Err(Error::Runtime { .. })));
    }
}
