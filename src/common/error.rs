//! Error types for proxypool

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Dispatch Errors ===
    #[error("no proxies available")]
    NoProxies,

    #[error("no available proxies")]
    NoAvailableProxies,

    #[error("dispatch failed: {detail}")]
    DispatchFailed { detail: String },

    // === Attempt Errors ===
    #[error("proxy {proxy} answered {status}: {body}")]
    Upstream {
        proxy: String,
        status: u16,
        body: String,
    },

    #[error("proxy {proxy} unreachable: {reason}")]
    Transport { proxy: String, reason: String },

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Request Errors ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration source error: {0}")]
    Config(#[from] config::ConfigError),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a single-attempt failure that another candidate may not share?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. } | Error::Transport { .. } | Error::Timeout(_) | Error::Http(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NoProxies | Error::NoAvailableProxies => StatusCode::SERVICE_UNAVAILABLE,
            Error::DispatchFailed { .. } | Error::Upstream { .. } | Error::Transport { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::InvalidConfig(_) | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for an error response: `{error[, detail]}`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Error::DispatchFailed { detail } => {
                serde_json::json!({ "error": "dispatch failed", "detail": detail })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}
