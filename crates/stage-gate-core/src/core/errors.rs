// crates/stage-gate-core/src/core/errors.rs
// ============================================================================
// Module: Orchestrator Errors
// Description: The typed error taxonomy surfaced by every public scheduler
// and attribution operation.
// Purpose: Give callers a closed, wire-stable set of error codes instead of
// ad hoc strings.
// Dependencies: thiserror, crate::interfaces::StoreError
// ============================================================================

//! ## Overview
//! Every public operation in this crate returns either a success value or an
//! [`OrchestratorError`]; no panics or unchecked exceptions cross the crate
//! boundary. Variants map one-to-one onto the five wire error codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Orchestrator Error
// ============================================================================

/// Errors returned by scheduler and attribution engine operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A caller-supplied value was malformed (wire code `INVALID_INPUT`).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced pipeline, stage, or attribution does not exist (wire
    /// code `NOT_FOUND`).
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not valid for the entity's current status (wire code
    /// `INVALID_STATE`).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A conditional write lost a race or its precondition did not hold
    /// (wire code `PRECONDITION_FAILED`).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An unexpected or transient failure occurred beneath the public API
    /// (wire code `INTERNAL`).
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Returns the stable wire error code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::PreconditionFailed(message) => Self::PreconditionFailed(message),
            StoreError::Conflict(message) => Self::PreconditionFailed(message),
            StoreError::Io(message) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestratorError;

    #[test]
    fn codes_match_wire_taxonomy() {
        assert_eq!(OrchestratorError::InvalidInput(String::new()).code(), "INVALID_INPUT");
        assert_eq!(OrchestratorError::NotFound(String::new()).code(), "NOT_FOUND");
        assert_eq!(OrchestratorError::InvalidState(String::new()).code(), "INVALID_STATE");
        assert_eq!(OrchestratorError::PreconditionFailed(String::new()).code(), "PRECONDITION_FAILED");
        assert_eq!(OrchestratorError::Internal(String::new()).code(), "INTERNAL");
    }
}
