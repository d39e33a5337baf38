//! Outbound delivery of a task to a worker's task endpoint

use crate::common::{Error, Result};
use crate::manager::election::ProxyTarget;
use async_trait::async_trait;

/// What a worker answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReply {
    pub status: u16,
    pub body: String,
}

impl TaskReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a task payload to one proxy.
///
/// Implementations return `Ok` for any HTTP answer (the dispatcher decides
/// what counts as success) and `Err` only when no answer was obtained.
#[async_trait]
pub trait TaskForwarder: Send + Sync {
    async fn forward(&self, target: &ProxyTarget, payload: &serde_json::Value)
        -> Result<TaskReply>;
}

/// Forwards over HTTP with a shared, pooled client
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Forwarder with its own pooled client. Redirects are not followed:
    /// a 3xx from a worker is that worker's answer and counts as a failure.
    pub fn build() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl TaskForwarder for HttpForwarder {
    async fn forward(
        &self,
        target: &ProxyTarget,
        payload: &serde_json::Value,
    ) -> Result<TaskReply> {
        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::Timeout(format!("proxy {}: {}", target.address, e))
            } else {
                Error::Transport {
                    proxy: target.address.clone(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .post(target.task_url())
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        Ok(TaskReply { status, body })
    }
}
