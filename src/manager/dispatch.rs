//! Task dispatch with retries across proxies
//!
//! Each call scans the elected proxies from a rotating offset, skips
//! blacklisted ones and tries up to `retries` distinct candidates in
//! sequence, sleeping `backoff_base * 2^attempt` (jittered by 0.8–1.2x)
//! between failed attempts.

use crate::common::{backoff_with_jitter, Clock, Error, Result};
use crate::manager::election::{ProxySet, ProxyTarget};
use crate::manager::failure::FailureTracker;
use crate::manager::forward::{TaskForwarder, TaskReply};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Maximum attempts per dispatch
    pub retries: usize,
    pub backoff_base: Duration,
    /// Bound on a single forwarded call
    pub request_timeout: Duration,
}

/// A successful dispatch: the worker's answer, verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub proxy: String,
    pub status: u16,
    pub body: String,
}

pub struct Dispatcher {
    proxies: Arc<ProxySet>,
    failures: Arc<FailureTracker>,
    forwarder: Arc<dyn TaskForwarder>,
    clock: Clock,
    policy: DispatchPolicy,
    cursor: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        proxies: Arc<ProxySet>,
        failures: Arc<FailureTracker>,
        forwarder: Arc<dyn TaskForwarder>,
        clock: Clock,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            proxies,
            failures,
            forwarder,
            clock,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub async fn dispatch(&self, payload: &serde_json::Value) -> Result<DispatchOutcome> {
        let proxies = self.proxies.snapshot();
        if proxies.is_empty() {
            return Err(Error::NoProxies);
        }

        let now = self.clock.now();
        let mut candidates: Vec<&ProxyTarget> = proxies
            .iter()
            .filter(|p| !self.failures.is_blacklisted(&p.address, now))
            .collect();
        if candidates.is_empty() {
            return Err(Error::NoAvailableProxies);
        }

        // Offset wraps on the full set so rotation is stable while availability changes
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % proxies.len();
        let attempts = self.policy.retries.min(candidates.len());
        let mut last_error = None;

        for attempt in 0..attempts {
            let target = candidates.remove((start + attempt) % candidates.len());

            match self.attempt(target, payload).await {
                Ok(reply) => {
                    self.failures.record_success(&target.address);
                    tracing::debug!(
                        proxy = %target.address,
                        status = reply.status,
                        attempt = attempt + 1,
                        "Task dispatched"
                    );
                    return Ok(DispatchOutcome {
                        proxy: target.address.clone(),
                        status: reply.status,
                        body: reply.body,
                    });
                }
                Err(e) => {
                    let failures = self.failures.record_failure(&target.address, self.clock.now());
                    tracing::warn!(
                        proxy = %target.address,
                        attempt = attempt + 1,
                        failures,
                        "Dispatch attempt failed: {}",
                        e
                    );
                    last_error = Some(e);

                    if attempt + 1 < attempts {
                        let delay = backoff_with_jitter(self.policy.backoff_base, attempt as u32);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(Error::DispatchFailed {
            detail: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    /// One bounded call; non-2xx answers are failures
    async fn attempt(
        &self,
        target: &ProxyTarget,
        payload: &serde_json::Value,
    ) -> Result<TaskReply> {
        let reply = tokio::time::timeout(
            self.policy.request_timeout,
            self.forwarder.forward(target, payload),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "proxy {} did not answer within {:?}",
                target.address, self.policy.request_timeout
            ))
        })??;

        if reply.is_success() {
            Ok(reply)
        } else {
            Err(Error::Upstream {
                proxy: target.address.clone(),
                status: reply.status,
                body: reply.body,
            })
        }
    }
}
