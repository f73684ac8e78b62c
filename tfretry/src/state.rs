//! Lifecycle states and refresh observations

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Closed set of lifecycle states for one kind of remote object
///
/// Implementors are usually an enum with one variant per known state name and
/// an `Other` variant for names the provider does not know about. The poller
/// fails on `Other` rather than waiting on it.
///
/// The three hooks name the synthetic states the poller reports when a
/// refresh fails in a well-known way. A state kind that never disappears or
/// never sees transport resets can leave them unset.
pub trait LifecycleState: Clone + Eq + Hash + Debug + Display + Send + Sync {
    /// State reported when the remote object no longer exists
    fn absent() -> Option<Self> {
        None
    }

    /// State reported while the transport keeps resetting the connection
    fn repeating() -> Option<Self> {
        None
    }

    /// State reported while the remote service answers 503
    fn unavailable() -> Option<Self> {
        None
    }
}

/// Result of one successful refresh call
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T, S> {
    pub payload: T,
    /// `None` means the remote system reported no state yet
    pub state: Option<S>,
}

impl<T, S> Observation<T, S> {
    pub fn new(payload: T, state: S) -> Self {
        Self {
            payload,
            state: Some(state),
        }
    }

    pub fn unknown(payload: T) -> Self {
        Self {
            payload,
            state: None,
        }
    }
}
