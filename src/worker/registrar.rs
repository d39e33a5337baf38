//! Registration client: the worker's heartbeat to the manager
//!
//! Each round tries up to `register_retries` times with jittered exponential
//! backoff. A failed round is only logged; the manager notices persistent
//! failure as staleness and evicts the worker.

use crate::common::{retry_with_backoff, Result, WorkerConfig};
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Manager's answer to a registration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterAck {
    pub status: String,
    /// Address the manager recorded for this worker
    pub ip: String,
    /// Manager clock reading, seconds
    pub now: f64,
}

pub struct Registrar {
    client: reqwest::Client,
    url: String,
    metadata: serde_json::Value,
    retries: usize,
    backoff_base: Duration,
    timeout: Duration,
}

impl Registrar {
    /// `port` is the task port announced to the manager
    pub fn new(client: reqwest::Client, config: &WorkerConfig, port: u16) -> Self {
        Self {
            client,
            url: config.register_url(),
            metadata: serde_json::json!({ "role": config.role, "port": port }),
            retries: config.register_retries,
            backoff_base: config.register_backoff_base(),
            timeout: config.register_timeout(),
        }
    }

    /// A single registration call
    pub async fn register_once(&self) -> Result<RegisterAck> {
        let ack = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&self.metadata)
            .send()
            .await?
            .error_for_status()?
            .json::<RegisterAck>()
            .await?;
        Ok(ack)
    }

    /// One registration round, retried with backoff
    pub async fn register(&self) -> Result<RegisterAck> {
        retry_with_backoff(|| self.register_once(), self.retries, self.backoff_base).await
    }

    /// Register immediately, then every `interval`, until cancelled
    pub fn start(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = self.register() => match res {
                        Ok(ack) => tracing::debug!(
                            ip = %ack.ip,
                            manager_now = ack.now,
                            "Registered with manager"
                        ),
                        Err(e) => tracing::warn!("Registration with {} failed: {}", self.url, e),
                    }
                }
            }

            tracing::info!("Registration loop stopped");
        })
    }
}
