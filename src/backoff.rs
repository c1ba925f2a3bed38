//! # Backoff Strategy
//!
//! Decides how long the poll loop idles after a cycle that found no work.
//! The strategy is pluggable; [`ExponentialBackoff`] is the provided default.
//! A poller without a strategy re-enters the loop immediately after an empty
//! cycle.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Idle policy consumed by the poller.
///
/// `start_waiting` is called once per cycle that returned zero work items and
/// is expected to block the worker for the current interval. `reset` is
/// called once per cycle that returned work. `stop_waiting` is called exactly
/// once during shutdown and must unblock a strategy currently sleeping in
/// `start_waiting`. The poller additionally races every wait against its own
/// shutdown signal, so a strategy that misses the wakeup cannot delay stop.
#[async_trait]
pub trait BackoffStrategy: Send + Sync {
    async fn start_waiting(&self);
    fn stop_waiting(&self);
    fn reset(&self);
}

/// Exponentially growing idle intervals with an upper cap.
///
/// Starts over from the initial interval after every non-empty cycle.
#[derive(Debug)]
pub struct ExponentialBackoff {
    init: Duration,
    factor: f64,
    max: Duration,
    level: AtomicU32,
    interrupt: Notify,
}

impl ExponentialBackoff {
    pub fn new(init: Duration, factor: f64, max: Duration) -> Self {
        Self {
            init,
            factor,
            max,
            level: AtomicU32::new(0),
            interrupt: Notify::new(),
        }
    }

    /// The waiting interval for a given escalation level.
    fn delay_for_level(&self, level: u32) -> Duration {
        let millis = self.init.as_millis() as f64 * self.factor.powi(level as i32);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 2.0, Duration::from_secs(60))
    }
}

#[async_trait]
impl BackoffStrategy for ExponentialBackoff {
    async fn start_waiting(&self) {
        let level = self.level.fetch_add(1, Ordering::AcqRel);
        let delay = self.delay_for_level(level);
        trace!(level, delay_ms = delay.as_millis() as u64, "backing off");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.interrupt.notified() => {
                debug!("backoff wait interrupted");
            }
        }
    }

    fn stop_waiting(&self) {
        self.interrupt.notify_waiters();
    }

    fn reset(&self) {
        self.level.store(0, Ordering::Release);
    }
}
