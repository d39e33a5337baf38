//! Configuration for proxypool components
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables named after the fields in upper case
//! (`ELECTION_INTERVAL`, `MANAGER_HOST`, ...). The binaries apply CLI
//! overrides on top. Durations are expressed in seconds.

use crate::common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Interface the HTTP API binds to
    pub bind_host: String,

    /// Port the HTTP API listens on
    pub manager_port: u16,

    /// Seconds between proxy elections
    pub election_interval: f64,

    /// Maximum number of elected proxies
    pub election_k: usize,

    /// Seconds a worker may stay silent before eviction
    pub worker_ttl: f64,

    /// Seconds between staleness sweeps
    pub cleanup_interval: f64,

    /// Seconds a proxy stays blacklisted after its last failure
    pub proxy_blacklist_ttl: f64,

    /// Consecutive failures before a proxy is blacklisted
    pub max_fails: u32,

    /// Per-attempt timeout for forwarded tasks
    pub request_timeout: f64,

    /// Attempts per dispatch, each against a distinct proxy
    pub dispatch_retries: usize,

    /// Base of the exponential backoff between dispatch attempts
    pub backoff_base: f64,

    /// Task port used when a worker did not declare one
    pub worker_port: u16,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            manager_port: 8888,
            election_interval: 10.0,
            election_k: 1,
            worker_ttl: 30.0,
            cleanup_interval: 10.0,
            proxy_blacklist_ttl: 60.0,
            max_fails: 3,
            request_timeout: 5.0,
            dispatch_retries: 3,
            backoff_base: 0.2,
            worker_port: 9999,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ManagerConfig {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = load_layered(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.election_k == 0 {
            return Err(Error::InvalidConfig("election_k must be at least 1".into()));
        }
        if self.dispatch_retries == 0 {
            return Err(Error::InvalidConfig(
                "dispatch_retries must be at least 1".into(),
            ));
        }
        if self.max_fails == 0 {
            return Err(Error::InvalidConfig("max_fails must be at least 1".into()));
        }
        positive("election_interval", self.election_interval)?;
        positive("worker_ttl", self.worker_ttl)?;
        positive("cleanup_interval", self.cleanup_interval)?;
        positive("proxy_blacklist_ttl", self.proxy_blacklist_ttl)?;
        positive("request_timeout", self.request_timeout)?;
        non_negative("backoff_base", self.backoff_base)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.bind_host, self.manager_port)
    }

    pub fn election_interval(&self) -> Duration {
        secs(self.election_interval)
    }

    pub fn cleanup_interval(&self) -> Duration {
        secs(self.cleanup_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout)
    }

    pub fn backoff_base(&self) -> Duration {
        secs(self.backoff_base)
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Interface the worker's task API binds to
    pub bind_host: String,

    /// Port the worker's task API listens on (declared to the manager)
    pub worker_port: u16,

    /// Manager host for registration
    pub manager_host: String,

    /// Manager port for registration
    pub manager_port: u16,

    /// Seconds between registration rounds
    pub register_interval: f64,

    /// Attempts per registration round
    pub register_retries: usize,

    /// Base of the exponential backoff between registration attempts
    pub register_backoff_base: f64,

    /// Timeout of a single registration call
    pub register_timeout: f64,

    /// Role announced in registration metadata
    pub role: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            worker_port: 9999,
            manager_host: "manager".to_string(),
            manager_port: 8888,
            register_interval: 5.0,
            register_retries: 3,
            register_backoff_base: 0.5,
            register_timeout: 2.0,
            role: "worker".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = load_layered(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.register_retries == 0 {
            return Err(Error::InvalidConfig(
                "register_retries must be at least 1".into(),
            ));
        }
        if self.manager_host.is_empty() {
            return Err(Error::InvalidConfig("manager_host cannot be empty".into()));
        }
        positive("register_interval", self.register_interval)?;
        positive("register_timeout", self.register_timeout)?;
        non_negative("register_backoff_base", self.register_backoff_base)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.bind_host, self.worker_port)
    }

    pub fn register_url(&self) -> String {
        format!(
            "http://{}:{}/register",
            self.manager_host, self.manager_port
        )
    }

    pub fn register_interval(&self) -> Duration {
        secs(self.register_interval)
    }

    pub fn register_backoff_base(&self) -> Duration {
        secs(self.register_backoff_base)
    }

    pub fn register_timeout(&self) -> Duration {
        secs(self.register_timeout)
    }
}

fn load_layered<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let config = builder
        .add_source(config::Environment::default().try_parsing(true))
        .build()?;
    Ok(config.try_deserialize()?)
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| {
            Error::InvalidConfig(format!("invalid bind address {}:{}: {}", host, port, e))
        })
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be a positive number of seconds, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} cannot be negative, got {}",
            name, value
        )))
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
