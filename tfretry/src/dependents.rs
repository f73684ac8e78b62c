//! Dependent-set gate
//!
//! Before a parent object is deleted, its dependents must not be in the middle
//! of their own deletion. The gate lists the dependents on every refresh and
//! reports the aggregate as `DELETING` while any of them is deleting and
//! `IDLE` otherwise. One deleting dependent blocks as much as many.
//!
//! Listing failures are never retried: whatever the lister returns as an
//! error is surfaced as a [`PollError::Remote`](crate::PollError::Remote).

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::clock::Clock;
use crate::context::Context;
use crate::error::{RefreshError, Result};
use crate::poller::StateChangeConf;
use crate::state::{LifecycleState, Observation};

/// A remote object that must settle before its parent is deleted
pub trait Dependent {
    fn is_deleting(&self) -> bool;
}

/// Aggregate state of a dependent set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    Idle,
    Deleting,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Idle => f.write_str("IDLE"),
            GateState::Deleting => f.write_str("DELETING"),
        }
    }
}

impl LifecycleState for GateState {}

pub fn classify<D: Dependent>(dependents: &[D]) -> GateState {
    if dependents.iter().any(Dependent::is_deleting) {
        GateState::Deleting
    } else {
        GateState::Idle
    }
}

/// Wait configuration for the gate: pending `DELETING`, target `IDLE`, no delay
pub fn gate_conf(timeout: Duration, min_timeout: Duration) -> StateChangeConf<GateState> {
    StateChangeConf::new([GateState::Deleting], [GateState::Idle])
        .timeout(timeout)
        .min_timeout(min_timeout)
}

/// Gate over the dependents of one parent object
pub struct DependentsGate<L> {
    parent_id: String,
    lister: L,
}

impl<D, L, Fut> DependentsGate<L>
where
    D: Dependent,
    L: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Vec<D>, RefreshError>>,
{
    pub fn new(parent_id: impl Into<String>, lister: L) -> Self {
        Self {
            parent_id: parent_id.into(),
            lister,
        }
    }

    /// Lists the dependents once and classifies them
    pub async fn refresh(
        &mut self,
    ) -> std::result::Result<Observation<Vec<D>, GateState>, RefreshError> {
        let listed = (self.lister)().await;
        observe(&self.parent_id, listed)
    }

    /// Blocks until no dependent is deleting and returns the last listing
    pub async fn wait(
        self,
        ctx: &Context,
        clock: &dyn Clock,
        conf: StateChangeConf<GateState>,
    ) -> Result<Vec<D>> {
        let DependentsGate {
            parent_id,
            mut lister,
        } = self;

        let refresh = || {
            let listed = lister();
            let parent_id = parent_id.clone();
            async move { observe(&parent_id, listed.await) }
        };

        let result = conf.wait_for_state(ctx, clock, refresh).await?;
        Ok(result.payload.unwrap_or_default())
    }
}

fn observe<D: Dependent>(
    parent_id: &str,
    listed: std::result::Result<Vec<D>, RefreshError>,
) -> std::result::Result<Observation<Vec<D>, GateState>, RefreshError> {
    let dependents = listed.map_err(|e| RefreshError::Remote(e.into_fatal()))?;
    let state = classify(&dependents);

    if state == GateState::Deleting {
        tracing::debug!("status for {} dependents: {}", parent_id, state);
    }

    Ok(Observation::new(dependents, state))
}
