// crates/stage-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Persistent Store Port
// Description: The abstract storage interface the scheduler and attribution
// engine depend on.
// Purpose: Let the scheduler stay backend-agnostic; concrete stores live in
// separate crates.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! [`PipelineStore`] is the single seam between the scheduler and durable
//! storage. Implementations must provide atomicity for
//! [`PipelineStore::compare_and_update_stage`] and for
//! [`PipelineStore::complete_stage_transaction`], typically via a
//! serializable transaction or an equivalent conditional multi-write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::attribution::Attribution;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::StageId;
use crate::core::output::StageOutput;
use crate::core::pipeline::Pipeline;
use crate::core::registry::StageName;
use crate::core::stage::Stage;
use crate::core::status::PipelineStatus;
use crate::core::status::StageStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Store Error
// ============================================================================

/// Errors a [`PipelineStore`] implementation may surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write's precondition did not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A uniqueness constraint was violated (e.g. duplicate attribution).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An underlying I/O or driver failure occurred.
    #[error("store io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Field Patches
// ============================================================================

/// New values to apply to a [`Stage`] in a conditional write.
///
/// Only `status` is mandatory; the remaining fields are set when `Some` and
/// left untouched when `None`. Stage fields are write-once in normal flow, so
/// this representation never needs to express "clear this field".
#[derive(Debug, Clone)]
pub struct StageFields {
    /// The status to transition the stage to.
    pub status: StageStatus,
    /// Claiming agent identifier, set on claim.
    pub agent_id: Option<crate::core::identifiers::AgentId>,
    /// Claiming agent display name, set on claim.
    pub agent_name: Option<crate::core::identifiers::AgentName>,
    /// Typed output, set on completion.
    pub output: Option<StageOutput>,
    /// Artifact handles, set on completion.
    pub artifacts: Option<Vec<String>>,
    /// Failure reason, set on failure.
    pub error: Option<String>,
    /// Claim timestamp, set on claim.
    pub claimed_at: Option<Timestamp>,
    /// Execution start timestamp, set on start.
    pub started_at: Option<Timestamp>,
    /// Terminal timestamp, set on completion or failure.
    pub completed_at: Option<Timestamp>,
}

impl StageFields {
    /// Builds a fields patch carrying only the mandatory new status.
    #[must_use]
    pub const fn status_only(status: StageStatus) -> Self {
        Self {
            status,
            agent_id: None,
            agent_name: None,
            output: None,
            artifacts: None,
            error: None,
            claimed_at: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// New values to apply to a [`Pipeline`] via [`PipelineStore::update_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineFields {
    /// The status to transition the pipeline to, if changing.
    pub status: Option<PipelineStatus>,
    /// The stage to advance `current_stage` to, if changing.
    pub current_stage: Option<StageName>,
    /// The new `updated_at` timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Field Patch Application
// ============================================================================

/// Applies a [`StageFields`] patch to `stage` in place. Shared by every
/// [`PipelineStore`] implementation so the "only touch `Some` fields" rule
/// lives in one place.
pub fn apply_stage_fields(stage: &mut Stage, fields: StageFields) {
    stage.status = fields.status;
    if let Some(agent_id) = fields.agent_id {
        stage.agent_id = Some(agent_id);
    }
    if let Some(agent_name) = fields.agent_name {
        stage.agent_name = Some(agent_name);
    }
    if let Some(output) = fields.output {
        stage.output = Some(output);
    }
    if let Some(artifacts) = fields.artifacts {
        stage.artifacts = artifacts;
    }
    if let Some(error) = fields.error {
        stage.error = Some(error);
    }
    if let Some(claimed_at) = fields.claimed_at {
        stage.claimed_at = Some(claimed_at);
    }
    if let Some(started_at) = fields.started_at {
        stage.started_at = Some(started_at);
    }
    if let Some(completed_at) = fields.completed_at {
        stage.completed_at = Some(completed_at);
    }
}

/// Applies a [`PipelineFields`] patch to `pipeline` in place.
pub fn apply_pipeline_fields(pipeline: &mut Pipeline, fields: PipelineFields) {
    if let Some(status) = fields.status {
        pipeline.status = status;
    }
    if let Some(current_stage) = fields.current_stage {
        pipeline.current_stage = Some(current_stage);
    }
    pipeline.updated_at = fields.updated_at;
}

// ============================================================================
// SECTION: Pipeline Store Trait
// ============================================================================

/// The persistence port depended on by the scheduler and attribution engine.
pub trait PipelineStore {
    /// Atomically inserts a pipeline and its full set of stages.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if a pipeline with the same id
    /// already exists.
    fn create_pipeline_with_stages(&self, pipeline: Pipeline, stages: Vec<Stage>) -> Result<(), StoreError>;

    /// Looks up a pipeline by id.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn find_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, StoreError>;

    /// Looks up a stage by its composite key.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn find_stage(&self, pipeline_id: &PipelineId, stage_name: StageName) -> Result<Option<Stage>, StoreError>;

    /// Looks up a stage by its surrogate id.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn find_stage_by_id(&self, stage_id: &StageId) -> Result<Option<Stage>, StoreError>;

    /// Returns every stage belonging to a pipeline, in fixed registry order.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the pipeline does not exist.
    fn list_stages(&self, pipeline_id: &PipelineId) -> Result<Vec<Stage>, StoreError>;

    /// Returns every `RUNNING` pipeline together with its ordered stages.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn list_running_pipelines_with_stages(&self) -> Result<Vec<(Pipeline, Vec<Stage>)>, StoreError>;

    /// Returns pipelines matching an optional status filter, most recently
    /// created first, capped at `limit`.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn list_pipelines(&self, filter: Option<PipelineStatus>, limit: u32) -> Result<Vec<Pipeline>, StoreError>;

    /// Conditionally writes new stage fields, succeeding only if the stage's
    /// current status equals `expected_status`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the stage does not exist, or
    /// [`StoreError::PreconditionFailed`] if its current status does not
    /// match `expected_status`.
    fn compare_and_update_stage(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        fields: StageFields,
    ) -> Result<Stage, StoreError>;

    /// Atomically applies a stage completion: the conditional stage update,
    /// the attribution insert, and the pipeline update all land together or
    /// not at all.
    ///
    /// # Errors
    /// Returns [`StoreError::PreconditionFailed`] if the stage's current
    /// status does not match `expected_status`, or [`StoreError::Conflict`]
    /// if an attribution already exists for this stage.
    fn complete_stage_transaction(
        &self,
        stage_id: &StageId,
        expected_status: StageStatus,
        stage_fields: StageFields,
        attribution: Attribution,
        pipeline_fields: PipelineFields,
    ) -> Result<(Stage, Pipeline), StoreError>;

    /// Appends an attribution record.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if an attribution already exists for
    /// `(pipeline_id, stage_name)`.
    fn append_attribution(&self, attribution: Attribution) -> Result<(), StoreError>;

    /// Returns every attribution recorded for a pipeline.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on an underlying storage failure.
    fn list_attributions(&self, pipeline_id: &PipelineId) -> Result<Vec<Attribution>, StoreError>;

    /// Unconditionally updates a pipeline's mutable fields.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the pipeline does not exist.
    fn update_pipeline(&self, id: &PipelineId, fields: PipelineFields) -> Result<Pipeline, StoreError>;
}
