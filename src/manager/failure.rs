//! Per-proxy failure tracking and blacklist policy
//!
//! A proxy is blacklisted while it has at least `max_fails` consecutive
//! failures AND its last failure is younger than `blacklist_ttl`. Expiry of
//! the TTL makes it eligible again without resetting the count; only a
//! success does that.

use crate::common::lock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FailureRecord {
    /// Consecutive failed attempts
    pub count: u32,
    /// Clock reading (seconds) of the most recent failure
    pub last_failure: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BlacklistPolicy {
    pub max_fails: u32,
    /// Seconds
    pub blacklist_ttl: f64,
}

impl BlacklistPolicy {
    pub fn is_blacklisted(&self, record: &FailureRecord, now: f64) -> bool {
        record.count >= self.max_fails && now - record.last_failure < self.blacklist_ttl
    }
}

#[derive(Debug)]
pub struct FailureTracker {
    policy: BlacklistPolicy,
    records: Mutex<HashMap<String, FailureRecord>>,
}

impl FailureTracker {
    pub fn new(policy: BlacklistPolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> BlacklistPolicy {
        self.policy
    }

    pub fn is_blacklisted(&self, address: &str, now: f64) -> bool {
        lock(&self.records)
            .get(address)
            .is_some_and(|record| self.policy.is_blacklisted(record, now))
    }

    pub fn record_success(&self, address: &str) {
        if let Some(record) = lock(&self.records).get_mut(address) {
            if record.count >= self.policy.max_fails {
                tracing::info!(proxy = %address, "Proxy recovered, failure count cleared");
            }
            record.count = 0;
        }
    }

    /// Count a failed attempt. Returns the new consecutive-failure count.
    pub fn record_failure(&self, address: &str, now: f64) -> u32 {
        let mut records = lock(&self.records);
        let record = records
            .entry(address.to_string())
            .or_insert(FailureRecord {
                count: 0,
                last_failure: now,
            });
        record.count = record.count.saturating_add(1);
        record.last_failure = now;

        if record.count == self.policy.max_fails {
            tracing::warn!(
                proxy = %address,
                failures = record.count,
                ttl_secs = self.policy.blacklist_ttl,
                "Proxy blacklisted"
            );
        }
        record.count
    }

    pub fn get(&self, address: &str) -> Option<FailureRecord> {
        lock(&self.records).get(address).copied()
    }

    /// Keep only the records whose address satisfies `keep`.
    /// Returns the number of records dropped.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|addr, _| keep(addr));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
