use crate::request::{Kwargs, ServiceResponse};
use crate::transport::TransportError;
use crate::{Error, Result};
use reqwest::Method;
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin reqwest wrapper issuing one call per request.
///
/// Clones share the underlying connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with env-overridable defaults:
    /// - `OFFLOAD_HTTP_TIMEOUT_SECS` (default 30)
    /// - `OFFLOAD_HTTP_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `OFFLOAD_HTTP_POOL_IDLE_TIMEOUT_SECS` (default 90)
    pub fn new() -> Result<Self> {
        let timeout_secs = env::var("OFFLOAD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("OFFLOAD_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("OFFLOAD_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue `method url` with the given kwargs and buffer the full response.
    ///
    /// Recognised kwargs: `params` (query), `json` (JSON body), `data` (raw string or
    /// form-encoded object), `headers`, `timeout` (seconds). Anything else is ignored.
    pub async fn execute(
        &self,
        method: &str,
        url: &Url,
        kwargs: &Kwargs,
    ) -> Result<ServiceResponse> {
        let method = parse_method(method)?;
        let mut request = self.client.request(method, url.clone());
        let mut call_timeout = self.timeout;

        for (key, value) in kwargs {
            match key.as_str() {
                "params" => {
                    request = request.query(&string_pairs(key, value)?);
                }
                "json" => {
                    request = request.json(value);
                }
                "data" => {
                    request = match value {
                        serde_json::Value::String(s) => request.body(s.clone()),
                        serde_json::Value::Object(_) => request.form(&string_pairs(key, value)?),
                        other => request.body(other.to_string()),
                    };
                }
                "headers" => {
                    for (name, v) in string_pairs(key, value)? {
                        request = request.header(name, v);
                    }
                }
                "timeout" => {
                    call_timeout = timeout_kwarg(key, value)?;
                    request = request.timeout(call_timeout);
                }
                _ => {
                    debug!(kwarg = key.as_str(), "ignoring unsupported request kwarg");
                }
            }
        }

        let response = request.send().await.map_err(|e| classify(e, url, call_timeout))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(|e| classify(e, url, call_timeout))?;

        Ok(ServiceResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| Error::Transport(TransportError::InvalidMethod(method.to_string())))
}

fn classify(e: reqwest::Error, url: &Url, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::timeout(format!("HTTP call to {}", url), timeout)
    } else {
        Error::Transport(TransportError::Http(e))
    }
}

fn timeout_kwarg(key: &str, value: &serde_json::Value) -> Result<Duration> {
    let invalid = |reason: &str| TransportError::InvalidKwargs {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let secs = value
        .as_f64()
        .filter(|s| s.is_finite() && *s > 0.0)
        .ok_or_else(|| invalid("expected a positive number of seconds"))?;
    Ok(Duration::try_from_secs_f64(secs).map_err(|_| invalid("out of range"))?)
}

fn string_pairs(key: &str, value: &serde_json::Value) -> Result<Vec<(String, String)>> {
    let obj = value.as_object().ok_or_else(|| TransportError::InvalidKwargs {
        key: key.to_string(),
        reason: "expected an object".into(),
    })?;
    Ok(obj
        .iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect())
}
