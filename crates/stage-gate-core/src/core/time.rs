// crates/stage-gate-core/src/core/time.rs
// ============================================================================
// Module: Stage Gate Time Model
// Description: Canonical timestamp representations for pipeline and stage
// records.
// Purpose: Provide deterministic, replayable time values across Stage Gate
// records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Stage Gate uses explicit time values supplied by the caller to keep the
//! scheduler deterministic and testable. The core never reads wall-clock time
//! directly; hosts must supply timestamps via operation arguments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in Stage Gate pipeline and stage records.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads
///   wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value, for deterministic tests.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }

    /// Returns a comparable `i64` instant for ordering timestamps of the same
    /// variant. Mixed-variant comparisons are a caller error; hosts are
    /// expected to pick one `Timestamp` kind per deployment.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "logical clocks used in tests never approach i64::MAX"
    )]
    #[allow(
        clippy::cast_possible_wrap,
        reason = "logical clocks used in tests never approach i64::MAX"
    )]
    pub const fn as_comparable(&self) -> i64 {
        match self {
            Self::UnixMillis(value) => *value,
            Self::Logical(value) => *value as i64,
        }
    }
}
