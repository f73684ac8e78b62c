//! Reconciliation poller
//!
//! Blocks a CRUD operation until a long-running remote operation reaches one
//! of its target states. A [`StateChangeConf`] describes one wait; a
//! [`Poller`] is the state machine that runs it:
//!
//! ```text
//! NotStarted -> Pending -> Pending ... -> Target
//!                                     \-> Fatal (remote error, unexpected state, timeout, cancel)
//! ```
//!
//! Nothing leaves `Target` or `Fatal`.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::context::Context;
use crate::error::{PollError, RefreshError, Result};
use crate::state::{LifecycleState, Observation};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Stand-in deadline for timeouts too large to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

enum Interrupt {
    Cancelled,
    Deadline,
}

/// Description of one wait for a remote state transition
#[derive(Debug, Clone)]
pub struct StateChangeConf<S> {
    pub pending: HashSet<S>,
    pub target: HashSet<S>,
    /// Total wall time budget, initial delay included
    pub timeout: Duration,
    /// Lower bound for the interval between two refresh calls
    pub min_timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Fixed interval replacing the exponential backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive "not found" refreshes tolerated while absence is not a target
    pub not_found_checks: Option<u32>,
}

impl<S: LifecycleState> StateChangeConf<S> {
    pub fn new(
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            pending: pending.into_iter().collect(),
            target: target.into_iter().collect(),
            timeout: DEFAULT_TIMEOUT,
            min_timeout: Duration::ZERO,
            delay: Duration::ZERO,
            poll_interval: None,
            not_found_checks: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = Some(checks);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(PollError::InvalidConf(
                "at least one target state is required".to_string(),
            ));
        }

        if let Some(state) = self.pending.intersection(&self.target).next() {
            return Err(PollError::InvalidConf(format!(
                "state '{}' is both pending and target",
                state
            )));
        }

        if self.timeout.is_zero() {
            return Err(PollError::InvalidConf("timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Interval to wait after the `pending_polls`-th pending refresh
    pub fn next_interval(&self, pending_polls: u32) -> Duration {
        let interval = match self.poll_interval {
            Some(interval) => interval,
            None => {
                let exponent = pending_polls.saturating_sub(1).min(16);
                INITIAL_BACKOFF.saturating_mul(1 << exponent).min(MAX_BACKOFF)
            }
        };

        interval.max(self.min_timeout)
    }

    /// Runs a [`Poller`] for this configuration to completion
    pub async fn wait_for_state<T, F, Fut>(
        self,
        ctx: &Context,
        clock: &dyn Clock,
        refresh: F,
    ) -> Result<PollResult<T, S>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<Observation<T, S>, RefreshError>>,
    {
        Poller::new(self, refresh).wait(ctx, clock).await
    }

    fn state_names(states: &HashSet<S>) -> Vec<String> {
        let mut names: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        names.sort();
        names
    }
}

/// Returned once a target state is observed
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult<T, S> {
    /// Last payload produced by the refresh function; `None` when the target
    /// was reached because the object disappeared
    pub payload: Option<T>,
    pub final_state: S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    NotStarted,
    Pending,
    Target,
    Fatal,
}

/// Classification of one refresh call
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, S> {
    Pending { state: Option<S> },
    Reached(PollResult<T, S>),
}

/// Explicit polling state machine for one wait
///
/// [`Poller::poll`] performs a single refresh and never sleeps;
/// [`Poller::wait`] adds the initial delay, backoff, timeout and
/// cancellation around it.
pub struct Poller<T, S, F> {
    conf: StateChangeConf<S>,
    refresh: F,
    phase: PollPhase,
    refreshes: u32,
    pending_polls: u32,
    not_found: u32,
    last_state: Option<S>,
    last_error: Option<String>,
    _payload: std::marker::PhantomData<fn() -> T>,
}

impl<T, S, F, Fut> Poller<T, S, F>
where
    S: LifecycleState,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Observation<T, S>, RefreshError>>,
{
    pub fn new(conf: StateChangeConf<S>, refresh: F) -> Self {
        Self {
            conf,
            refresh,
            phase: PollPhase::NotStarted,
            refreshes: 0,
            pending_polls: 0,
            not_found: 0,
            last_state: None,
            last_error: None,
            _payload: std::marker::PhantomData,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Number of refresh calls made so far
    pub fn refresh_count(&self) -> u32 {
        self.refreshes
    }

    pub fn last_state(&self) -> Option<&S> {
        self.last_state.as_ref()
    }

    /// Calls the refresh function once and classifies the result
    pub async fn poll(&mut self) -> Result<PollOutcome<T, S>> {
        match self.phase {
            PollPhase::Target | PollPhase::Fatal => return Err(PollError::Finished),
            PollPhase::NotStarted => {
                if let Err(e) = self.conf.validate() {
                    self.phase = PollPhase::Fatal;
                    return Err(e);
                }
            }
            PollPhase::Pending => {}
        }

        self.refreshes += 1;
        let result = (self.refresh)().await;

        match self.classify(result) {
            Ok(outcome) => {
                self.phase = match outcome {
                    PollOutcome::Pending { .. } => PollPhase::Pending,
                    PollOutcome::Reached(_) => PollPhase::Target,
                };
                Ok(outcome)
            }
            Err(e) => {
                self.phase = PollPhase::Fatal;
                Err(e)
            }
        }
    }

    /// Polls until a target state, a fatal error, the timeout, or
    /// cancellation of `ctx`
    pub async fn wait(mut self, ctx: &Context, clock: &dyn Clock) -> Result<PollResult<T, S>> {
        if let Err(e) = self.conf.validate() {
            self.phase = PollPhase::Fatal;
            return Err(e);
        }

        let deadline = deadline_after(clock.now(), self.conf.timeout);
        tracing::info!(
            "Waiting for state to become: [{}] (timeout {:?})",
            StateChangeConf::state_names(&self.conf.target).join(", "),
            self.conf.timeout
        );

        if !self.conf.delay.is_zero() {
            let delay = self
                .conf
                .delay
                .min(deadline.saturating_duration_since(clock.now()));
            tracing::debug!("Waiting {:?} before first refresh", delay);
            self.sleep(ctx, clock, delay).await?;
        }

        loop {
            if ctx.is_cancelled() {
                return Err(self.cancelled(ctx));
            }
            if clock.now() >= deadline {
                return Err(self.timed_out());
            }

            // a refresh that hangs must not outlive the timeout
            let polled = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(Interrupt::Cancelled),
                outcome = self.poll() => Ok(outcome),
                _ = clock.wait_until(deadline) => Err(Interrupt::Deadline),
            };
            let outcome = match polled {
                Ok(outcome) => outcome,
                Err(Interrupt::Cancelled) => return Err(self.cancelled(ctx)),
                Err(Interrupt::Deadline) => {
                    tracing::debug!("Refresh still in flight at the deadline");
                    return Err(self.timed_out());
                }
            };

            match outcome? {
                PollOutcome::Reached(result) => {
                    tracing::info!(
                        "Reached target state {} after {} refresh(es)",
                        result.final_state,
                        self.refreshes
                    );
                    return Ok(result);
                }
                PollOutcome::Pending { state } => {
                    let remaining = deadline.saturating_duration_since(clock.now());
                    if remaining.is_zero() {
                        return Err(self.timed_out());
                    }

                    let interval = self.conf.next_interval(self.pending_polls).min(remaining);
                    tracing::debug!(
                        "State is {}, next refresh in {:?}",
                        state.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                        interval
                    );
                    self.sleep(ctx, clock, interval).await?;
                }
            }
        }
    }

    fn classify(
        &mut self,
        result: std::result::Result<Observation<T, S>, RefreshError>,
    ) -> Result<PollOutcome<T, S>> {
        match result {
            Ok(Observation {
                payload,
                state: Some(state),
            }) => {
                self.not_found = 0;
                if self.conf.target.contains(&state) {
                    self.last_state = Some(state.clone());
                    return Ok(PollOutcome::Reached(PollResult {
                        payload: Some(payload),
                        final_state: state,
                    }));
                }
                if self.conf.pending.contains(&state) {
                    return Ok(self.pending(Some(state)));
                }
                Err(PollError::UnexpectedState {
                    state: state.to_string(),
                    expected: StateChangeConf::state_names(&self.conf.target),
                })
            }
            Ok(Observation { state: None, .. }) => {
                self.not_found = 0;
                Ok(self.pending(None))
            }
            Err(RefreshError::NotFound) => {
                if let Some(absent) = S::absent().filter(|s| self.conf.target.contains(s)) {
                    self.last_state = Some(absent.clone());
                    return Ok(PollOutcome::Reached(PollResult {
                        payload: None,
                        final_state: absent,
                    }));
                }

                self.not_found += 1;
                if let Some(limit) = self.conf.not_found_checks {
                    if self.not_found > limit {
                        return Err(PollError::NotFound {
                            checks: self.not_found,
                        });
                    }
                }
                self.last_error = Some(RefreshError::NotFound.to_string());
                Ok(self.pending(None))
            }
            Err(RefreshError::Unavailable) => Ok(self.pending(S::unavailable())),
            Err(RefreshError::ConnectionReset) => {
                self.last_error = Some(RefreshError::ConnectionReset.to_string());
                Ok(self.pending(S::repeating()))
            }
            Err(RefreshError::Transient(message)) => {
                tracing::debug!("Retrying after refresh error: {}", message);
                self.last_error = Some(message);
                Ok(self.pending(None))
            }
            Err(RefreshError::Remote(err)) => Err(PollError::Remote(err)),
        }
    }

    fn pending(&mut self, state: Option<S>) -> PollOutcome<T, S> {
        if let Some(state) = &state {
            self.last_state = Some(state.clone());
        }
        self.pending_polls += 1;
        PollOutcome::Pending { state }
    }

    async fn sleep(&mut self, ctx: &Context, clock: &dyn Clock, duration: Duration) -> Result<()> {
        let cancelled = tokio::select! {
            biased;
            _ = ctx.cancelled() => true,
            _ = clock.sleep(duration) => false,
        };

        if cancelled {
            return Err(self.cancelled(ctx));
        }
        Ok(())
    }

    fn cancelled(&mut self, ctx: &Context) -> PollError {
        self.phase = PollPhase::Fatal;
        PollError::Cancelled {
            deadline_exceeded: ctx.deadline_exceeded(),
        }
    }

    fn timed_out(&mut self) -> PollError {
        self.phase = PollPhase::Fatal;
        PollError::Timeout {
            timeout: self.conf.timeout,
            last_state: self.last_state.as_ref().map(|s| s.to_string()),
            last_error: self.last_error.clone(),
        }
    }
}
