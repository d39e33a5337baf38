//! Utility functions for proxypool

use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lower bound of the multiplicative backoff jitter
pub const JITTER_MIN: f64 = 0.8;
/// Upper bound of the multiplicative backoff jitter
pub const JITTER_MAX: f64 = 1.2;

/// Largest exponent applied to a backoff base; keeps `2^attempt` finite.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Monotonic clock reporting seconds since the owning process started.
///
/// Backed by tokio's clock so a paused test runtime controls it.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock was created
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate completes its update before
/// releasing, so the guarded state stays consistent across a poisoning panic.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `base * 2^attempt`, without jitter (attempt is 0-indexed)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(MAX_BACKOFF_EXPONENT));
    base.saturating_mul(factor)
}

/// Draw a jitter factor uniformly from `[JITTER_MIN, JITTER_MAX]`
pub fn jitter_factor() -> f64 {
    rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX)
}

/// Exponential backoff for `attempt`, scaled by a random jitter factor.
/// Saturates at `Duration::MAX`.
pub fn backoff_with_jitter(base: Duration, attempt: u32) -> Duration {
    let delay = backoff_delay(base, attempt);
    Duration::try_from_secs_f64(delay.as_secs_f64() * jitter_factor()).unwrap_or(Duration::MAX)
}

/// Run `tick` every `period` until `cancel` fires.
///
/// The first tick happens one full period after start. A panicking tick is
/// logged and the loop keeps going; cancellation is observed at the next
/// timer wait, never in the middle of a tick.
pub async fn run_periodic<F>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) where
    F: FnMut(),
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(task = name, "Periodic tick failed: {}", reason);
                }
            }
        }
    }

    tracing::info!(task = name, "Periodic task stopped");
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Retry with exponential backoff and jitter.
///
/// Only errors reporting `is_retryable()` are retried; the last error is
/// returned once `max_attempts` are used up.
pub async fn retry_with_backoff<F, Fut, T>(
    mut f: F,
    max_attempts: usize,
    base_delay: Duration,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::Result<T>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = backoff_with_jitter(base_delay, attempt as u32);
                tracing::warn!(
                    "Retry attempt {} failed: {}, retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
