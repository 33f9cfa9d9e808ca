// crates/stage-gate-core/src/core/attribution.rs
// ============================================================================
// Module: Attribution Record
// Description: An immutable fact recording which agent completed which
// stage.
// Purpose: Provide the durable unit the attribution engine reasons over and
// the store persists.
// Dependencies: serde, crate::core::identifiers, crate::core::registry,
// crate::core::time
// ============================================================================

//! ## Overview
//! An [`Attribution`] is written once, at stage completion, and never
//! modified afterward. `(pipeline_id, stage_name)` is the natural key that
//! makes `record` idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::AgentId;
use super::identifiers::AgentName;
use super::identifiers::AttributionId;
use super::identifiers::PipelineId;
use super::identifiers::StageId;
use super::registry::StageName;
use super::time::Timestamp;

// ============================================================================
// SECTION: Attribution
// ============================================================================

/// An immutable record of one agent's contribution to one stage.
///
/// # Invariants
/// - `(pipeline_id, stage_name)` is unique within a pipeline's attribution
///   set; `record` is idempotent on this key.
/// - `weight` mirrors [`StageName::weight`] at the time of recording, so a
///   future registry change cannot retroactively alter a past attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Surrogate identifier for this attribution record.
    pub id: AttributionId,
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Surrogate identifier of the stage this attribution is for.
    pub stage_id: StageId,
    /// Stage name this attribution is for.
    pub stage_name: StageName,
    /// Agent credited with completing the stage.
    pub agent_id: AgentId,
    /// Display name of the credited agent.
    pub agent_name: AgentName,
    /// Attribution weight, a whole percent, copied from the stage registry.
    pub weight: u8,
    /// Time this attribution was recorded.
    pub created_at: Timestamp,
}

impl Attribution {
    /// Builds a new attribution record, copying the stage's registry weight.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the store's flat row shape")]
    pub fn new(
        id: AttributionId,
        pipeline_id: PipelineId,
        stage_id: StageId,
        stage_name: StageName,
        agent_id: AgentId,
        agent_name: AgentName,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            pipeline_id,
            stage_id,
            stage_name,
            agent_id,
            agent_name,
            weight: stage_name.weight(),
            created_at,
        }
    }
}
