// crates/stage-gate-core/src/core/stage.rs
// ============================================================================
// Module: Stage Record
// Description: One slot within a pipeline, identified by (pipeline, name).
// Purpose: Represent the data the scheduler and store exchange for a single
// stage occupying a pipeline.
// Dependencies: serde, crate::core::identifiers, crate::core::output,
// crate::core::registry, crate::core::status, crate::core::time
// ============================================================================

//! ## Overview
//! A [`Stage`] is identified by the composite key `(pipeline_id, stage_name)`
//! but also carries a surrogate [`StageId`] for stores that prefer a single
//! primary key. Ownership fields (`agent_id`, `agent_name`) are populated on
//! claim and cleared only by the reaper reclaiming a stalled stage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::AgentId;
use super::identifiers::AgentName;
use super::identifiers::PipelineId;
use super::identifiers::StageId;
use super::output::StageOutput;
use super::registry::StageName;
use super::status::StageStatus;
use super::time::Timestamp;

// ============================================================================
// SECTION: Stage
// ============================================================================

/// One stage slot within a pipeline run.
///
/// # Invariants
/// - `agent_id`/`agent_name` are `Some` only while `status.is_owned()` or
///   after a successful claim/completion; they are `None` while `Pending`.
/// - `output` is `Some` only once `status == Complete`.
/// - `error` is `Some` only once `status == Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Surrogate identifier, distinct from the composite key below.
    pub id: StageId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Fixed stage name; part of the composite key with `pipeline_id`.
    pub stage_name: StageName,
    /// Current lifecycle status.
    pub status: StageStatus,
    /// Identifier of the agent currently or most recently holding this stage.
    pub agent_id: Option<AgentId>,
    /// Display name of the agent currently or most recently holding this
    /// stage.
    pub agent_name: Option<AgentName>,
    /// Typed output recorded on successful completion.
    pub output: Option<StageOutput>,
    /// Opaque handles to artifacts produced while executing this stage.
    pub artifacts: Vec<String>,
    /// Human-readable failure reason recorded on failure.
    pub error: Option<String>,
    /// Time this stage was claimed, if ever.
    pub claimed_at: Option<Timestamp>,
    /// Time execution started, if ever.
    pub started_at: Option<Timestamp>,
    /// Time this stage reached a terminal status, if ever.
    pub completed_at: Option<Timestamp>,
}

impl Stage {
    /// Builds a freshly created, unclaimed stage in `Pending` status.
    #[must_use]
    pub fn pending(id: StageId, pipeline_id: PipelineId, stage_name: StageName) -> Self {
        Self {
            id,
            pipeline_id,
            stage_name,
            status: StageStatus::Pending,
            agent_id: None,
            agent_name: None,
            output: None,
            artifacts: Vec::new(),
            error: None,
            claimed_at: None,
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Stage;
    use super::StageId;
    use super::PipelineId;
    use super::StageName;
    use super::StageStatus;

    #[test]
    fn pending_stage_has_no_owner_or_output() {
        let stage = Stage::pending(StageId::new("s1"), PipelineId::new("p1"), StageName::Research);
        assert_eq!(stage.status, StageStatus::Pending);
        assert_eq!(stage.agent_id, None);
        assert_eq!(stage.output, None);
        assert_eq!(stage.error, None);
    }
}
