// crates/stage-gate-core/src/runtime/scheduler.rs
// ============================================================================
// Module: Pipeline Scheduler
// Description: The stage-gate state machine driving pipelines through their
// seven fixed stages.
// Purpose: Implement every scheduler operation from the stage contract,
// backed by any PipelineStore implementation.
// Dependencies: crate::core, crate::interfaces, crate::runtime::config,
// crate::runtime::telemetry
// ============================================================================

//! ## Overview
//! [`PipelineScheduler`] holds no mutable state of its own beyond a store
//! handle, a validated [`SchedulerConfig`], and telemetry counters. Every
//! operation is a bounded number of store round-trips; conditional writes in
//! the store are what provide the exclusivity and atomicity guarantees.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::attribution::Attribution;
use crate::core::errors::OrchestratorError;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::AgentName;
use crate::core::identifiers::AttributionId;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::StageId;
use crate::core::output::StageOutput;
use crate::core::pipeline::Pipeline;
use crate::core::registry::StageName;
use crate::core::stage::Stage;
use crate::core::status::PipelineStatus;
use crate::core::status::StageStatus;
use crate::core::time::Timestamp;
use crate::interfaces::PipelineFields;
use crate::interfaces::PipelineStore;
use crate::interfaces::StageFields;
use crate::runtime::config::SchedulerConfig;
use crate::runtime::telemetry::OperationCounters;
use crate::runtime::telemetry::SchedulerOperation;
use crate::runtime::telemetry::SchedulerOutcome;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn derive_stage_id(pipeline_id: &PipelineId, stage_name: StageName) -> StageId {
    StageId::new(format!("{pipeline_id}:{stage_name}"))
}

fn derive_attribution_id(pipeline_id: &PipelineId, stage_name: StageName) -> AttributionId {
    AttributionId::new(format!("{pipeline_id}:{stage_name}:attribution"))
}

// ============================================================================
// SECTION: Pipeline Scheduler
// ============================================================================

/// One ready stage surfaced by [`PipelineScheduler::ready_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyEntry {
    /// The pipeline the ready stage belongs to.
    pub pipeline: Pipeline,
    /// The earliest pending, unblocked stage for that pipeline.
    pub stage: Stage,
}

/// The stage-gate scheduler: every public operation from the stage contract.
pub struct PipelineScheduler<S: PipelineStore> {
    store: S,
    config: SchedulerConfig,
    counters: OperationCounters,
}

impl<S: PipelineStore> PipelineScheduler<S> {
    /// Builds a scheduler over `store` using `config`, which must already
    /// have passed [`SchedulerConfig::validate`].
    #[must_use]
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config, counters: OperationCounters::new() }
    }

    /// Returns a read-only handle to this scheduler's telemetry counters.
    #[must_use]
    pub const fn counters(&self) -> &OperationCounters {
        &self.counters
    }

    fn record<T>(&self, operation: SchedulerOperation, result: &Result<T, OrchestratorError>) {
        let outcome = if result.is_ok() { SchedulerOutcome::Success } else { SchedulerOutcome::Error };
        self.counters.record(operation, outcome);
    }

    /// Creates a pipeline in `DRAFT` with all seven stages in `PENDING`.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if `topic` is empty, or
    /// [`OrchestratorError::Internal`] if `pipeline_id` is already in use.
    pub fn create_pipeline(
        &self,
        pipeline_id: PipelineId,
        topic: impl Into<String>,
        description: impl Into<String>,
        created_at: Timestamp,
    ) -> Result<Pipeline, OrchestratorError> {
        let result = (|| {
            let topic = topic.into();
            if topic.trim().is_empty() {
                return Err(OrchestratorError::InvalidInput("topic must not be empty".to_owned()));
            }
            let pipeline = Pipeline::new(pipeline_id.clone(), topic, description, created_at);
            let stages = StageName::ORDER
                .into_iter()
                .map(|stage_name| Stage::pending(derive_stage_id(&pipeline_id, stage_name), pipeline_id.clone(), stage_name))
                .collect();
            self.store.create_pipeline_with_stages(pipeline.clone(), stages)?;
            Ok(pipeline)
        })();
        self.record(SchedulerOperation::CreatePipeline, &result);
        result
    }

    /// Transitions a pipeline `DRAFT -> RUNNING`.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the pipeline does not
    /// exist, or [`OrchestratorError::InvalidState`] if it is not `DRAFT`.
    pub fn start_pipeline(&self, pipeline_id: &PipelineId, now: Timestamp) -> Result<Pipeline, OrchestratorError> {
        let result = (|| {
            let pipeline = self
                .store
                .find_pipeline(pipeline_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("pipeline {pipeline_id} not found")))?;
            if pipeline.status != PipelineStatus::Draft {
                return Err(OrchestratorError::InvalidState(format!("pipeline {pipeline_id} is not DRAFT")));
            }
            let first_stage = StageName::ORDER[0];
            let fields = PipelineFields { status: Some(PipelineStatus::Running), current_stage: Some(first_stage), updated_at: now };
            Ok(self.store.update_pipeline(pipeline_id, fields)?)
        })();
        self.record(SchedulerOperation::StartPipeline, &result);
        result
    }

    /// Returns the earliest ready stage of every `RUNNING` pipeline, sorted
    /// by stage order ascending, then pipeline creation time ascending.
    ///
    /// `stage_name_filter` excludes pipelines whose ready stage is not that
    /// stage name.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Internal`] on an underlying store
    /// failure.
    pub fn ready_set(&self, stage_name_filter: Option<StageName>) -> Result<Vec<ReadyEntry>, OrchestratorError> {
        let result = (|| {
            let running = self.store.list_running_pipelines_with_stages()?;
            let mut entries = Vec::new();
            for (pipeline, stages) in running {
                let Some(stage) = Self::earliest_ready_stage(&stages) else {
                    continue;
                };
                if stage_name_filter.is_some_and(|filter| filter != stage.stage_name) {
                    continue;
                }
                entries.push(ReadyEntry { pipeline, stage });
            }
            entries.sort_by(|a, b| {
                a.stage
                    .stage_name
                    .position()
                    .cmp(&b.stage.stage_name.position())
                    .then_with(|| a.pipeline.created_at.as_comparable().cmp(&b.pipeline.created_at.as_comparable()))
            });
            Ok(entries)
        })();
        self.record(SchedulerOperation::ReadySet, &result);
        result
    }

    fn earliest_ready_stage(stages: &[Stage]) -> Option<Stage> {
        stages
            .iter()
            .find(|stage| {
                stage.status == StageStatus::Pending
                    && stage.stage_name.predecessor().is_none_or(|predecessor_name| {
                        stages
                            .iter()
                            .find(|candidate| candidate.stage_name == predecessor_name)
                            .is_some_and(|predecessor| predecessor.status.clears_predecessor_gate())
                    })
            })
            .cloned()
    }

    /// Performs an exclusive `PENDING -> CLAIMED` transition.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the pipeline or stage does
    /// not exist, or [`OrchestratorError::PreconditionFailed`] if the
    /// pipeline is not `RUNNING`, the stage is not `PENDING`, or its
    /// predecessor has not cleared.
    pub fn claim_stage(
        &self,
        pipeline_id: &PipelineId,
        stage_name: StageName,
        agent_id: AgentId,
        agent_name: AgentName,
        now: Timestamp,
    ) -> Result<Stage, OrchestratorError> {
        let result = (|| {
            let pipeline = self
                .store
                .find_pipeline(pipeline_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("pipeline {pipeline_id} not found")))?;
            if pipeline.status != PipelineStatus::Running {
                return Err(OrchestratorError::PreconditionFailed(format!("pipeline {pipeline_id} is not RUNNING")));
            }
            let stage = self
                .store
                .find_stage(pipeline_id, stage_name)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("stage {pipeline_id}/{stage_name} not found")))?;
            if let Some(predecessor_name) = stage_name.predecessor() {
                let predecessor = self
                    .store
                    .find_stage(pipeline_id, predecessor_name)?
                    .ok_or_else(|| OrchestratorError::NotFound(format!("stage {pipeline_id}/{predecessor_name} not found")))?;
                if !predecessor.status.clears_predecessor_gate() {
                    return Err(OrchestratorError::PreconditionFailed(format!(
                        "predecessor stage {predecessor_name} has not completed"
                    )));
                }
            }
            let fields = StageFields {
                agent_id: Some(agent_id),
                agent_name: Some(agent_name),
                claimed_at: Some(now),
                ..StageFields::status_only(StageStatus::Claimed)
            };
            Ok(self.store.compare_and_update_stage(&stage.id, StageStatus::Pending, fields)?)
        })();
        self.record(SchedulerOperation::ClaimStage, &result);
        result
    }

    /// Performs a `CLAIMED -> RUNNING` transition.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the stage does not exist,
    /// or [`OrchestratorError::PreconditionFailed`] if it is not `CLAIMED`.
    pub fn start_stage(&self, stage_id: &StageId, now: Timestamp) -> Result<Stage, OrchestratorError> {
        let result = (|| {
            let fields = StageFields { started_at: Some(now), ..StageFields::status_only(StageStatus::Running) };
            Ok(self.store.compare_and_update_stage(stage_id, StageStatus::Claimed, fields)?)
        })();
        self.record(SchedulerOperation::StartStage, &result);
        result
    }

    /// Completes a stage: records its output, appends its attribution, and
    /// advances the owning pipeline.
    ///
    /// A pipeline that has already transitioned to `FAILED` is not moved
    /// back out of `FAILED`, but the stage transition and attribution still
    /// land.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the stage does not exist,
    /// [`OrchestratorError::InvalidState`] if it is not `CLAIMED`/`RUNNING`,
    /// [`OrchestratorError::InvalidInput`] if `output`'s variant does not
    /// match the stage being completed, or
    /// [`OrchestratorError::PreconditionFailed`] if a concurrent writer won
    /// the race.
    pub fn complete_stage(
        &self,
        stage_id: &StageId,
        output: StageOutput,
        artifacts: Vec<String>,
        now: Timestamp,
    ) -> Result<(Stage, Pipeline), OrchestratorError> {
        let result = (|| {
            let stage = self
                .store
                .find_stage_by_id(stage_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("stage {stage_id} not found")))?;
            if !stage.status.is_owned() {
                return Err(OrchestratorError::InvalidState(format!("stage {stage_id} is not CLAIMED or RUNNING")));
            }
            if output.stage_name() != stage.stage_name {
                return Err(OrchestratorError::InvalidInput(format!(
                    "output stage {} does not match stage {} being completed",
                    output.stage_name(),
                    stage.stage_name
                )));
            }
            let agent_id = stage
                .agent_id
                .clone()
                .ok_or_else(|| OrchestratorError::Internal(format!("stage {stage_id} has no owning agent")))?;
            let agent_name = stage
                .agent_name
                .clone()
                .ok_or_else(|| OrchestratorError::Internal(format!("stage {stage_id} has no owning agent name")))?;
            let pipeline = self
                .store
                .find_pipeline(&stage.pipeline_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("pipeline {} not found", stage.pipeline_id)))?;

            let stage_fields = StageFields {
                output: Some(output),
                artifacts: Some(artifacts),
                completed_at: Some(now),
                ..StageFields::status_only(StageStatus::Complete)
            };
            let attribution =
                Attribution::new(derive_attribution_id(&stage.pipeline_id, stage.stage_name), stage.pipeline_id.clone(), stage.id.clone(), stage.stage_name, agent_id, agent_name, now);
            let pipeline_fields = if pipeline.status == PipelineStatus::Failed {
                PipelineFields { status: None, current_stage: None, updated_at: pipeline.updated_at }
            } else if stage.stage_name.is_terminal() {
                PipelineFields { status: Some(PipelineStatus::Complete), current_stage: None, updated_at: now }
            } else {
                PipelineFields { status: None, current_stage: stage.stage_name.next_stage(), updated_at: now }
            };

            Ok(self.store.complete_stage_transaction(stage_id, stage.status, stage_fields, attribution, pipeline_fields)?)
        })();
        self.record(SchedulerOperation::CompleteStage, &result);
        result
    }

    /// Fails a stage and its owning pipeline. No attribution is recorded.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the stage does not exist,
    /// or [`OrchestratorError::InvalidState`] if it is not
    /// `CLAIMED`/`RUNNING`.
    pub fn fail_stage(&self, stage_id: &StageId, error: impl Into<String>, now: Timestamp) -> Result<(Stage, Pipeline), OrchestratorError> {
        let result = (|| {
            let stage = self
                .store
                .find_stage_by_id(stage_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("stage {stage_id} not found")))?;
            if !stage.status.is_owned() {
                return Err(OrchestratorError::InvalidState(format!("stage {stage_id} is not CLAIMED or RUNNING")));
            }
            let stage_fields = StageFields {
                error: Some(error.into()),
                completed_at: Some(now),
                ..StageFields::status_only(StageStatus::Failed)
            };
            let updated_stage = self.store.compare_and_update_stage(stage_id, stage.status, stage_fields)?;
            let pipeline_fields = PipelineFields { status: Some(PipelineStatus::Failed), current_stage: None, updated_at: now };
            let updated_pipeline = self.store.update_pipeline(&stage.pipeline_id, pipeline_fields)?;
            Ok((updated_stage, updated_pipeline))
        })();
        self.record(SchedulerOperation::FailStage, &result);
        result
    }

    /// Returns a pipeline together with its ordered stages.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::NotFound`] if the pipeline does not
    /// exist.
    pub fn get_pipeline(&self, pipeline_id: &PipelineId) -> Result<(Pipeline, Vec<Stage>), OrchestratorError> {
        let result = (|| {
            let pipeline = self
                .store
                .find_pipeline(pipeline_id)?
                .ok_or_else(|| OrchestratorError::NotFound(format!("pipeline {pipeline_id} not found")))?;
            let stages = self.store.list_stages(pipeline_id)?;
            Ok((pipeline, stages))
        })();
        self.record(SchedulerOperation::GetPipeline, &result);
        result
    }

    /// Lists pipelines, most recently created first, optionally filtered by
    /// status and capped at `limit` (also capped by
    /// [`SchedulerConfig::max_list_limit`]).
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if `limit` is zero.
    pub fn list_pipelines(&self, filter: Option<PipelineStatus>, limit: u32) -> Result<Vec<Pipeline>, OrchestratorError> {
        let result = (|| {
            if limit == 0 {
                return Err(OrchestratorError::InvalidInput("limit must be greater than zero".to_owned()));
            }
            let effective_limit = limit.min(self.config.max_list_limit);
            Ok(self.store.list_pipelines(filter, effective_limit)?)
        })();
        self.record(SchedulerOperation::ListPipelines, &result);
        result
    }

    /// Scans every `RUNNING` pipeline's owned stage and transitions it to
    /// `FAILED` if it has held `CLAIMED`/`RUNNING` for longer than
    /// [`SchedulerConfig::reaper_timeout_ms`].
    ///
    /// A stage only appears in the returned vec once both its own write and
    /// its owning pipeline's `FAILED` write have succeeded; if the
    /// pipeline-side write fails after the stage-side one lands, the
    /// mismatch is recorded as a [`SchedulerOutcome::Error`] against
    /// [`SchedulerOperation::ReapStalled`] and the stage is left out, rather
    /// than reported as reaped.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Internal`] on an underlying store
    /// failure.
    pub fn reap_stalled(&self, now: Timestamp) -> Result<Vec<Stage>, OrchestratorError> {
        let result = (|| {
            let timeout = i64::try_from(self.config.reaper_timeout_ms).unwrap_or(i64::MAX);
            let running = self.store.list_running_pipelines_with_stages()?;
            let mut reaped = Vec::new();
            for (pipeline, stages) in running {
                let Some(stage) = stages.into_iter().find(|stage| stage.status.is_owned()) else {
                    continue;
                };
                let reference = match stage.status {
                    StageStatus::Claimed => stage.claimed_at,
                    _ => stage.started_at.or(stage.claimed_at),
                };
                let Some(reference) = reference else {
                    continue;
                };
                let elapsed = now.as_comparable().saturating_sub(reference.as_comparable());
                if elapsed < timeout {
                    continue;
                }
                let stage_fields = StageFields {
                    error: Some("reaper: stage exceeded claim/run timeout".to_owned()),
                    completed_at: Some(now),
                    ..StageFields::status_only(StageStatus::Failed)
                };
                let Ok(updated_stage) = self.store.compare_and_update_stage(&stage.id, stage.status, stage_fields) else {
                    continue;
                };
                let pipeline_fields = PipelineFields { status: Some(PipelineStatus::Failed), current_stage: None, updated_at: now };
                if self.store.update_pipeline(&pipeline.id, pipeline_fields).is_err() {
                    self.counters.record(SchedulerOperation::ReapStalled, SchedulerOutcome::Error);
                    continue;
                }
                reaped.push(updated_stage);
            }
            Ok(reaped)
        })();
        self.record(SchedulerOperation::ReapStalled, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions are permitted to use expect for clarity")]

    use crate::core::identifiers::AgentId;
    use crate::core::identifiers::AgentName;
    use crate::core::output::ResearchOutput;
    use crate::core::output::StageOutput;
    use crate::core::status::PipelineStatus;
    use crate::core::time::Timestamp;
    use crate::interfaces::PipelineFields;
    use crate::interfaces::PipelineStore;
    use crate::runtime::config::SchedulerConfig;
    use crate::runtime::memory_store::InMemoryPipelineStore;

    use super::PipelineId;
    use super::PipelineScheduler;
    use super::StageName;

    fn research_output() -> StageOutput {
        StageOutput::Research(ResearchOutput {
            topic: "t".to_owned(),
            facts: vec![],
            sources: vec![],
            hooks: vec![],
            target_audience: "a".to_owned(),
            estimated_duration: 1,
        })
    }

    #[test]
    fn completing_a_stage_after_its_pipeline_already_failed_out_of_band_does_not_bump_updated_at() {
        let scheduler = PipelineScheduler::new(InMemoryPipelineStore::new(), SchedulerConfig::default());
        let pipeline_id = PipelineId::new("p1");
        scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
        scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(1)).expect("start succeeds");
        let stage = scheduler
            .claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(2))
            .expect("claim succeeds");
        scheduler.start_stage(&stage.id, Timestamp::Logical(2)).expect("start succeeds");

        // A concurrent writer (a reaper, or a failure elsewhere) can drive the
        // pipeline to FAILED without touching this stage's own status.
        scheduler
            .store
            .update_pipeline(&pipeline_id, PipelineFields { status: Some(PipelineStatus::Failed), current_stage: None, updated_at: Timestamp::Logical(3) })
            .expect("pipeline fails out of band");

        let (_stage, pipeline) =
            scheduler.complete_stage(&stage.id, research_output(), vec![], Timestamp::Logical(9)).expect("complete still lands the stage write");
        assert_eq!(pipeline.status, PipelineStatus::Failed);
        assert_eq!(pipeline.updated_at, Timestamp::Logical(3), "a terminal pipeline's updated_at must not move");
    }
}
