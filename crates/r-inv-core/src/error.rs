//! ---
//! inv_section: "04-property-collector"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Property retrieval, ancestry and change waiting."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
use r_inv_transport::CallError;
use r_inv_types::{ObjectReference, SelectionError};
use thiserror::Error;

use crate::collector::CollectorState;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, PropertyError>;

/// Failures of property retrieval, ancestry resolution and change waiting.
#[derive(Debug, Error)]
pub enum PropertyError {
    /// A batch mixed references of different kinds. Raised before any call.
    #[error("object references must have the same type: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// A batch was requested without any reference.
    #[error("a property batch needs at least one object reference")]
    EmptyBatch,
    /// Failure reported by the call primitive, passed through unchanged.
    #[error(transparent)]
    Call(#[from] CallError),
    /// The service answered with a payload that does not belong to the request.
    #[error("unexpected {found} response to {method}")]
    UnexpectedResponse {
        method: &'static str,
        found: &'static str,
    },
    /// A collector operation was attempted in the wrong lifecycle state.
    #[error("{operation} is not valid while the collector is {state}")]
    InvalidState {
        operation: &'static str,
        state: CollectorState,
    },
    /// A selection rule table failed validation.
    #[error(transparent)]
    Selection(#[from] SelectionError),
    /// A record could not be mapped onto the requested shape.
    #[error("failed to decode {obj} at '{path}': {source}")]
    Decode {
        obj: ObjectReference,
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// Fetched records do not form one chain from a root down to the object.
    #[error("inconsistent ancestry for {obj}: {reason}")]
    InconsistentAncestry { obj: ObjectReference, reason: String },
    /// Metric registration failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl PropertyError {
    /// Returns `true` for transport failures from the call primitive.
    pub fn is_transport(&self) -> bool {
        matches!(self, PropertyError::Call(CallError::Transport(_)))
    }

    /// Returns `true` when the remote service rejected the request.
    pub fn is_fault(&self) -> bool {
        matches!(self, PropertyError::Call(CallError::Fault(_)))
    }

    /// Returns `true` when the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PropertyError::Call(CallError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_inv_types::ServerFault;

    #[test]
    fn call_errors_display_unchanged() {
        let fault = CallError::Fault(ServerFault::new("NotAuthenticated", "session expired"));
        let expected = fault.to_string();
        let err = PropertyError::from(fault);
        assert_eq!(err.to_string(), expected);
        assert!(err.is_fault());
        assert!(!err.is_transport());
    }

    #[test]
    fn type_mismatch_names_both_kinds() {
        let err = PropertyError::TypeMismatch {
            expected: "VirtualMachine".into(),
            found: "HostSystem".into(),
        };
        assert_eq!(
            err.to_string(),
            "object references must have the same type: expected VirtualMachine, found HostSystem"
        );
    }
}
