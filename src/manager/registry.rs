//! Membership registry
//!
//! Worker address → last-seen time + registration metadata. Registration is
//! an idempotent upsert (last write wins); the reaper is the only component
//! that removes records.

use crate::common::lock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// Opaque registration metadata as sent by the worker
pub type WorkerMetadata = serde_json::Map<String, serde_json::Value>;

/// A registered worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Metadata from the most recent registration
    pub info: WorkerMetadata,
    /// Manager clock reading (seconds) at the most recent registration
    pub last_seen: f64,
}

impl WorkerRecord {
    /// Task port the worker declared, if it is a valid port number
    pub fn declared_port(&self) -> Option<u16> {
        self.info
            .get("port")
            .and_then(|v| v.as_u64())
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
    }

    /// Seconds since the last registration
    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    workers: Mutex<HashMap<String, WorkerRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `address` with `last_seen = now`. Returns `now`.
    pub fn register(&self, address: impl Into<String>, info: WorkerMetadata, now: f64) -> f64 {
        let address = address.into();
        let previous = lock(&self.workers).insert(
            address.clone(),
            WorkerRecord {
                info,
                last_seen: now,
            },
        );
        if previous.is_none() {
            tracing::info!(worker = %address, "Worker joined");
        } else {
            tracing::debug!(worker = %address, "Worker refreshed");
        }
        now
    }

    /// Snapshot of every registered worker, ordered by address
    pub fn list(&self) -> BTreeMap<String, WorkerRecord> {
        lock(&self.workers)
            .iter()
            .map(|(addr, record)| (addr.clone(), record.clone()))
            .collect()
    }

    pub fn get(&self, address: &str) -> Option<WorkerRecord> {
        lock(&self.workers).get(address).cloned()
    }

    /// Addresses currently registered
    pub fn addresses(&self) -> HashSet<String> {
        lock(&self.workers).keys().cloned().collect()
    }

    /// Remove every worker silent for longer than `ttl` seconds.
    /// Returns the evicted addresses.
    pub fn evict_stale(&self, now: f64, ttl: f64) -> Vec<String> {
        let mut workers = lock(&self.workers);
        let stale: Vec<String> = workers
            .iter()
            .filter(|(_, record)| record.age(now) > ttl)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &stale {
            workers.remove(addr);
        }
        stale
    }

    pub fn len(&self) -> usize {
        lock(&self.workers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
