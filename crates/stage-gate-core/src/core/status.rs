// crates/stage-gate-core/src/core/status.rs
// ============================================================================
// Module: Pipeline and Stage Status
// Description: Lifecycle status enums and their transition tables.
// Purpose: Encode the state machines from the pipeline and stage lifecycle
// as pure, testable helpers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Pipeline status and stage status are closed enums. Transition validity is
//! expressed as pure predicates so the scheduler can check a proposed
//! transition before touching the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Pipeline Status
// ============================================================================

/// Pipeline lifecycle status.
///
/// # Invariants
/// - `Complete` and `Failed` are terminal: no further stage transitions are
///   permitted once a pipeline reaches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    /// Created, not yet started.
    Draft,
    /// Started; stages may be claimed and completed.
    Running,
    /// Terminal stage completed successfully.
    Complete,
    /// A stage failed; the pipeline will not progress further.
    Failed,
}

impl PipelineStatus {
    /// Returns true when no further stage transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

// ============================================================================
// SECTION: Stage Status
// ============================================================================

/// Stage lifecycle status.
///
/// # Invariants
/// - `Complete`, `Failed`, and `Skipped` are terminal and immutable.
/// - Only one agent may hold a stage in `Claimed` or `Running` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// Awaiting claim; predecessor may or may not have completed yet.
    Pending,
    /// Exclusively claimed by one agent, not yet started.
    Claimed,
    /// Execution underway by the claiming agent.
    Running,
    /// Completed successfully with output recorded.
    Complete,
    /// Failed; the owning pipeline also transitions to `Failed`.
    Failed,
    /// Administratively bypassed. Never produced by normal claim/complete/fail
    /// flow; reserved for out-of-band operator action.
    Skipped,
}

impl StageStatus {
    /// Returns true when the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Skipped)
    }

    /// Returns true when the status counts as "cleared" for the purpose of a
    /// successor stage's predecessor check (§3 invariant (b)).
    #[must_use]
    pub const fn clears_predecessor_gate(self) -> bool {
        matches!(self, Self::Complete | Self::Skipped)
    }

    /// Returns true when a single agent may hold exclusive ownership in this
    /// status.
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, Self::Claimed | Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineStatus;
    use super::StageStatus;

    #[test]
    fn pipeline_terminal_statuses() {
        assert!(PipelineStatus::Complete.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(!PipelineStatus::Draft.is_terminal());
        assert!(!PipelineStatus::Running.is_terminal());
    }

    #[test]
    fn stage_terminal_statuses() {
        assert!(StageStatus::Complete.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Claimed.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn predecessor_gate_clears_on_complete_or_skipped() {
        assert!(StageStatus::Complete.clears_predecessor_gate());
        assert!(StageStatus::Skipped.clears_predecessor_gate());
        assert!(!StageStatus::Pending.clears_predecessor_gate());
        assert!(!StageStatus::Failed.clears_predecessor_gate());
    }
}
