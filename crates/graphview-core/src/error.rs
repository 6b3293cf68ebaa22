use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// External collaborator that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collaborator {
    Measurer,
    LayoutEngine,
    Renderer,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measurer => write!(f, "text measurer"),
            Self::LayoutEngine => write!(f, "layout engine"),
            Self::Renderer => write!(f, "scene renderer"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// The operation exists in the contract but this backend does not implement it.
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: &'static str },
    #[error("Invalid state for {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },
    #[error("The {collaborator} failed: {message}")]
    CollaboratorFailure {
        collaborator: Collaborator,
        message: String,
    },
}

impl ViewerError {
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    pub fn invalid_state(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            reason: reason.into(),
        }
    }

    pub fn collaborator(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self::CollaboratorFailure {
            collaborator,
            message: message.into(),
        }
    }

    pub fn no_graph(operation: &'static str) -> Self {
        Self::invalid_state(operation, "no graph is bound to the viewer")
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}
