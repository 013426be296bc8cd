//! HTTP transport used for both the remote (offloaded) path and loopback model calls.

mod http;

pub use http::HttpTransport;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Invalid kwarg '{key}': {reason}")]
    InvalidKwargs { key: String, reason: String },

    #[error("Transport error: {0}")]
    Other(String),
}
