//! Context implementation for request-scoped cancellation
//!
//! A Context carries the cancellation signal and deadline of one CRUD
//! operation down into the poller. It runs on tokio's clock so a paused test
//! runtime drives deadlines deterministically.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Context carries the cancellation signal and optional deadline of a request
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Derives a child context that is cancelled when `timeout` elapses or
    /// when this context is cancelled, whichever comes first.
    ///
    /// A timeout too large to represent as an instant adds no deadline of
    /// its own.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (Instant::now().checked_add(timeout), self.inner.deadline) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        };

        let (done_tx, done_rx) = watch::channel(*self.inner.done.borrow());

        let parent = self.clone();
        let child_tx = done_tx.clone();
        tokio::spawn(async move {
            let expired = async {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = expired => {}
                _ = parent.cancelled() => {}
                // every child handle was dropped
                _ = child_tx.closed() => return,
            }
            child_tx.send_replace(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline,
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left until the deadline, if there is one
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Completes once work done on behalf of this context should stop
    pub async fn cancelled(&self) {
        let mut done = self.inner.done.clone();
        if done.wait_for(|cancelled| *cancelled).await.is_err() {
            // the sender lives in `inner`, so this branch is unreachable while
            // `self` is alive
            std::future::pending::<()>().await;
        }
    }

    pub fn cancel(&self) {
        self.inner.done_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
