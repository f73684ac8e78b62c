//! Cluster lifecycle states as reported in Atlas's `stateName` field

use serde::{Deserialize, Serialize};
use std::fmt;
use tfretry::LifecycleState;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClusterState {
    Idle,
    Creating,
    Updating,
    Repairing,
    Deleting,
    /// The cluster no longer exists
    Deleted,
    /// The connection was reset while reading the cluster
    Repeating,
    /// Atlas answered 503 while reading the cluster
    Pending,
    /// A state name this provider does not know about
    Other(String),
}

impl ClusterState {
    pub fn as_str(&self) -> &str {
        match self {
            ClusterState::Idle => "IDLE",
            ClusterState::Creating => "CREATING",
            ClusterState::Updating => "UPDATING",
            ClusterState::Repairing => "REPAIRING",
            ClusterState::Deleting => "DELETING",
            ClusterState::Deleted => "DELETED",
            ClusterState::Repeating => "REPEATING",
            ClusterState::Pending => "PENDING",
            ClusterState::Other(name) => name,
        }
    }
}

impl From<String> for ClusterState {
    fn from(name: String) -> Self {
        match name.as_str() {
            "IDLE" => ClusterState::Idle,
            "CREATING" => ClusterState::Creating,
            "UPDATING" => ClusterState::Updating,
            "REPAIRING" => ClusterState::Repairing,
            "DELETING" => ClusterState::Deleting,
            "DELETED" => ClusterState::Deleted,
            "REPEATING" => ClusterState::Repeating,
            "PENDING" => ClusterState::Pending,
            _ => ClusterState::Other(name),
        }
    }
}

impl From<&str> for ClusterState {
    fn from(name: &str) -> Self {
        ClusterState::from(name.to_string())
    }
}

impl From<ClusterState> for String {
    fn from(state: ClusterState) -> Self {
        match state {
            ClusterState::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LifecycleState for ClusterState {
    fn absent() -> Option<Self> {
        Some(ClusterState::Deleted)
    }

    fn repeating() -> Option<Self> {
        Some(ClusterState::Repeating)
    }

    fn unavailable() -> Option<Self> {
        Some(ClusterState::Pending)
    }
}
