//! tfretry - long-running operation polling for Terraform providers
//!
//! Turns an eventually-consistent remote state transition into a bounded,
//! cancellable wait. Providers hand the poller a refresh function and the
//! sets of pending and target states for one CRUD operation.

// Core modules
pub mod clock;
pub mod context;
pub mod error;
pub mod state;

// Polling
pub mod dependents;
pub mod poller;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, TokioClock};
pub use context::Context;
pub use dependents::{classify, gate_conf, Dependent, DependentsGate, GateState};
pub use error::{PollError, RefreshError, RemoteError, Result};
pub use poller::{PollOutcome, PollPhase, PollResult, Poller, StateChangeConf};
pub use state::{LifecycleState, Observation};
