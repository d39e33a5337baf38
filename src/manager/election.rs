//! Proxy election
//!
//! A freshness heuristic, not consensus: every tick the `k` most recently
//! seen workers become the proxy set. Equal `last_seen` values rank by
//! address ascending so the outcome is deterministic. Nothing carries over
//! from the previous election.

use crate::common::run_periodic;
use crate::manager::registry::{Registry, WorkerRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// An elected dispatch target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyTarget {
    pub address: String,
    pub port: u16,
}

impl ProxyTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// URL of the worker's task endpoint
    pub fn task_url(&self) -> String {
        if self.address.contains(':') {
            format!("http://[{}]:{}/task", self.address, self.port)
        } else {
            format!("http://{}:{}/task", self.address, self.port)
        }
    }
}

/// The current proxy set, replaced wholesale on every election.
///
/// Readers get an `Arc` snapshot, so a concurrent election never exposes a
/// partially built set.
#[derive(Debug)]
pub struct ProxySet {
    current: RwLock<Arc<[ProxyTarget]>>,
}

impl Default for ProxySet {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::from(Vec::new())),
        }
    }
}

impl ProxySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, proxies: Vec<ProxyTarget>) {
        let next: Arc<[ProxyTarget]> = Arc::from(proxies);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn snapshot(&self) -> Arc<[ProxyTarget]> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.snapshot().iter().map(|p| p.address.clone()).collect()
    }
}

/// Rank workers by freshness and keep the first `k`.
///
/// Workers that did not declare a usable port are dispatched to on
/// `default_port`.
pub fn rank_proxies(
    workers: &BTreeMap<String, WorkerRecord>,
    k: usize,
    default_port: u16,
) -> Vec<ProxyTarget> {
    let mut ranked: Vec<(&String, &WorkerRecord)> = workers.iter().collect();
    ranked.sort_by(|(addr_a, a), (addr_b, b)| {
        match b.last_seen.total_cmp(&a.last_seen) {
            Ordering::Equal => addr_a.cmp(addr_b),
            other => other,
        }
    });

    ranked
        .into_iter()
        .take(k)
        .map(|(addr, record)| {
            ProxyTarget::new(addr.clone(), record.declared_port().unwrap_or(default_port))
        })
        .collect()
}

/// Periodically recomputes the proxy set from the registry
pub struct Elector {
    registry: Arc<Registry>,
    proxies: Arc<ProxySet>,
    k: usize,
    default_port: u16,
}

impl Elector {
    pub fn new(
        registry: Arc<Registry>,
        proxies: Arc<ProxySet>,
        k: usize,
        default_port: u16,
    ) -> Self {
        Self {
            registry,
            proxies,
            k,
            default_port,
        }
    }

    /// Run one election and publish the result
    pub fn elect(&self) -> Arc<[ProxyTarget]> {
        let elected = rank_proxies(&self.registry.list(), self.k, self.default_port);
        let addresses: Vec<&str> = elected.iter().map(|p| p.address.as_str()).collect();
        if elected.is_empty() {
            tracing::warn!("Elected proxies: [] (no registered workers)");
        } else {
            tracing::info!("Elected proxies: {:?}", addresses);
        }
        self.proxies.replace(elected);
        self.proxies.snapshot()
    }

    pub fn start(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            run_periodic("elector", interval, cancel, || {
                self.elect();
            })
            .await
        })
    }
}
