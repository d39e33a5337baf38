//! Staleness reaper: evicts workers that stopped registering.
//!
//! Failure records of workers no longer registered are dropped on every
//! sweep, so the failure table stays bounded by the live membership.

use crate::common::{run_periodic, Clock};
use crate::manager::failure::FailureTracker;
use crate::manager::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Reaper {
    registry: Arc<Registry>,
    failures: Arc<FailureTracker>,
    clock: Clock,
    /// Seconds
    worker_ttl: f64,
}

impl Reaper {
    pub fn new(
        registry: Arc<Registry>,
        failures: Arc<FailureTracker>,
        clock: Clock,
        worker_ttl: f64,
    ) -> Self {
        Self {
            registry,
            failures,
            clock,
            worker_ttl,
        }
    }

    /// Evict stale workers as of the current clock reading
    pub fn sweep(&self) -> Vec<String> {
        self.sweep_at(self.clock.now())
    }

    pub fn sweep_at(&self, now: f64) -> Vec<String> {
        let evicted = self.registry.evict_stale(now, self.worker_ttl);
        if !evicted.is_empty() {
            tracing::info!(
                ttl_secs = self.worker_ttl,
                remaining = self.registry.len(),
                "Evicted stale workers: {:?}",
                evicted
            );
        }

        // A dispatch holding an older proxy snapshot can charge an address
        // after its eviction, so orphans are collected on every sweep.
        let live = self.registry.addresses();
        let dropped = self.failures.retain(|addr| live.contains(addr));
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped failure records of unregistered workers");
        }
        evicted
    }

    pub fn start(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            run_periodic("reaper", interval, cancel, || {
                self.sweep();
            })
            .await
        })
    }
}
