use super::throughput::ThroughputObserver;
use super::{HostRouter, Router};
use crate::request::{OffloadServiceRequest, ServiceResponse};
use crate::strategy::LocalExecutionStrategy;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Router that either forwards a request over HTTP or runs it through a local strategy,
/// following the request's own `offload` flag.
///
/// Both paths share the same bookkeeping: `sent`/`done` are always recorded, and every
/// attempt (successful or not) counts towards the throughput observation.
pub struct OffloadRouter {
    host_router: Arc<dyn HostRouter>,
    transport: HttpTransport,
    strategy: Arc<dyn LocalExecutionStrategy>,
    throughput: Arc<ThroughputObserver>,
    timeout: Option<Duration>,
}

impl OffloadRouter {
    pub fn builder() -> OffloadRouterBuilder {
        OffloadRouterBuilder::new()
    }

    pub fn new(
        host_router: Arc<dyn HostRouter>,
        strategy: Arc<dyn LocalExecutionStrategy>,
    ) -> Result<Self> {
        OffloadRouterBuilder::new()
            .host_router(host_router)
            .local_strategy(strategy)
            .build()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn throughput(&self) -> &Arc<ThroughputObserver> {
        &self.throughput
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve the target host and forward the request there.
    pub async fn remote_execution(
        &self,
        req: &mut OffloadServiceRequest,
    ) -> Result<ServiceResponse> {
        let result = self.bounded("remote execution", self.forward(req)).await;
        self.complete(req, "remote", result)
    }

    /// Run the request through the configured local strategy.
    pub async fn local_execution(
        &self,
        req: &mut OffloadServiceRequest,
    ) -> Result<ServiceResponse> {
        let result = self
            .bounded("local execution", self.strategy.execute(req))
            .await;
        self.complete(req, "local", result)
    }

    async fn forward(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        let url = self.host_router.resolve(req).await?;
        debug!(
            request_id = %req.request_id(),
            method = req.method(),
            url = url.as_str(),
            "forwarding request"
        );

        req.mark_sent();
        let response = self.transport.execute(req.method(), &url, req.kwargs()).await;
        req.mark_done();
        response
    }

    async fn bounded<F>(&self, operation: &str, fut: F) -> Result<ServiceResponse>
    where
        F: Future<Output = Result<ServiceResponse>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::timeout(operation, limit))?,
            None => fut.await,
        }
    }

    fn complete(
        &self,
        req: &mut OffloadServiceRequest,
        path: &'static str,
        result: Result<ServiceResponse>,
    ) -> Result<ServiceResponse> {
        req.mark_done();
        let elapsed_ms = req.timings().elapsed().map(|s| (s * 1000.0) as u64).unwrap_or(0);

        match &result {
            Ok(resp) => debug!(
                request_id = %req.request_id(),
                path,
                method = req.method(),
                url = resp.url.as_str(),
                status = resp.status,
                duration_ms = elapsed_ms,
                "request completed"
            ),
            Err(e) => warn!(
                request_id = %req.request_id(),
                path,
                service = req.service(),
                duration_ms = elapsed_ms,
                error = %e,
                "request failed"
            ),
        }

        match self.throughput.record() {
            Ok(Some(report)) => info!(
                requests = report.count,
                window_ms = report.window.as_millis() as u64,
                rps = report.per_second(),
                "Sent {} requests in the last {:.1}s",
                report.count,
                report.window.as_secs_f64()
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "throughput observation skipped"),
        }

        result
    }
}

#[async_trait]
impl Router for OffloadRouter {
    type Request = OffloadServiceRequest;

    async fn request(&self, req: &mut OffloadServiceRequest) -> Result<ServiceResponse> {
        if req.offload() {
            self.remote_execution(req).await
        } else {
            self.local_execution(req).await
        }
    }
}

/// Builder for [`OffloadRouter`]. A host router and a local strategy are both required.
pub struct OffloadRouterBuilder {
    host_router: Option<Arc<dyn HostRouter>>,
    strategy: Option<Arc<dyn LocalExecutionStrategy>>,
    transport: Option<HttpTransport>,
    throughput: Option<Arc<ThroughputObserver>>,
    timeout: Option<Duration>,
}

impl OffloadRouterBuilder {
    pub fn new() -> Self {
        Self {
            host_router: None,
            strategy: None,
            transport: None,
            throughput: None,
            timeout: None,
        }
    }

    pub fn host_router(mut self, host_router: Arc<dyn HostRouter>) -> Self {
        self.host_router = Some(host_router);
        self
    }

    pub fn local_strategy(mut self, strategy: Arc<dyn LocalExecutionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Reuse an existing transport (and its connection pool).
    pub fn transport(mut self, transport: HttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share a throughput observer, e.g. across several routers or with a metrics reader.
    pub fn throughput_observer(mut self, observer: Arc<ThroughputObserver>) -> Self {
        self.throughput = Some(observer);
        self
    }

    pub fn throughput_interval(mut self, interval: Duration) -> Self {
        self.throughput = Some(Arc::new(ThroughputObserver::new(interval)));
        self
    }

    /// Upper bound on one execution attempt, remote or local.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<OffloadRouter> {
        let host_router = self.host_router.ok_or_else(|| {
            Error::configuration_with_context(
                "offload router requires a host router",
                ErrorContext::new()
                    .with_field_path("host_router")
                    .with_source("offload_router"),
            )
        })?;
        let strategy = self.strategy.ok_or_else(|| {
            Error::configuration_with_context(
                "offload router requires a local execution strategy",
                ErrorContext::new()
                    .with_field_path("local_strategy")
                    .with_source("offload_router"),
            )
        })?;
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration_with_context(
                "timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("timeout")
                    .with_source("offload_router"),
            ));
        }

        let transport = match (self.transport, self.timeout) {
            (Some(t), _) => t,
            (None, Some(timeout)) => HttpTransport::with_timeout(timeout)?,
            (None, None) => HttpTransport::new()?,
        };
        let throughput = self.throughput.unwrap_or_default();

        info!(
            strategy = strategy.name(),
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            throughput_interval_ms = throughput.interval().as_millis() as u64,
            "offload router ready"
        );

        Ok(OffloadRouter {
            host_router,
            transport,
            strategy,
            throughput,
            timeout: self.timeout,
        })
    }
}

impl Default for OffloadRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
