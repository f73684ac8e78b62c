//! Resource implementations

pub mod cluster;
pub mod project;

pub use cluster::{ClusterResource, ClusterUpdate};
pub use project::ProjectResource;

use std::time::Duration;
use thiserror::Error;
use tfretry::PollError;

use crate::api::ApiError;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Per-operation wait budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_OPERATION_TIMEOUT,
            update: DEFAULT_OPERATION_TIMEOUT,
            delete: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("error {operation} MongoDB {name}: {source}")]
    Poll {
        operation: &'static str,
        name: String,
        source: PollError,
    },
}

impl ResourceError {
    pub(crate) fn poll(operation: &'static str, name: impl Into<String>, source: PollError) -> Self {
        ResourceError::Poll {
            operation,
            name: name.into(),
            source,
        }
    }

    /// Remote error code of the underlying failure, if any
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ResourceError::Api(e) => e.error_code(),
            ResourceError::Poll { source, .. } => source.error_code(),
            ResourceError::InvalidRequest(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResourceError::Poll { source, .. } if source.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResourceError::Poll { source, .. } if source.is_cancelled())
    }
}
