//! Clock abstraction used by the poller
//!
//! Production code sleeps on the tokio timer. Tests inject a [`ManualClock`]
//! whose sleeps return immediately and only move virtual time forward, so a
//! three hour create timeout can be exercised without waiting.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);

    /// Resolves once `now()` has reached `deadline`
    async fn wait_until(&self, deadline: Instant);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn wait_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// Virtual clock for deterministic tests
///
/// Clones share the same timeline. Virtual time only moves on `sleep` and
/// `advance`, so `wait_until` stays pending until one of them crosses the
/// deadline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    elapsed: Arc<watch::Sender<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        let (elapsed, _) = watch::channel(Duration::ZERO);
        Self {
            start: Instant::now(),
            elapsed: Arc::new(elapsed),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Moves virtual time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.elapsed
            .send_modify(|elapsed| *elapsed = elapsed.saturating_add(duration));
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.borrow()
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.lock().iter().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Duration>> {
        // plain values, a poisoned lock still holds valid data
        self.sleeps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reached(&self, elapsed: Duration, deadline: Instant) -> bool {
        self.start.checked_add(elapsed).map_or(true, |now| now >= deadline)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.lock().push(duration);
        self.advance(duration);
    }

    async fn wait_until(&self, deadline: Instant) {
        let mut elapsed = self.elapsed.subscribe();
        // the sender lives in self, the wait can only end by reaching the deadline
        let _ = elapsed
            .wait_for(|elapsed| self.reached(*elapsed, deadline))
            .await;
    }
}
