// crates/stage-gate-core/src/runtime/memory_store.rs
// ============================================================================
// Module: In-Memory Pipeline Store
// Description: A Mutex-guarded, process-local PipelineStore implementation.
// Purpose: Back the scheduler's own tests and embedders that do not need
// durability, mirroring a single-mutex in-memory store over a keyed map.
// Dependencies: std::collections::BTreeMap, std::sync::Mutex, crate::core,
// crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryPipelineStore`] holds all pipeline, stage, and attribution state
//! behind one [`std::sync::Mutex`]. This grants the single-ownership and
//! atomic-transaction guarantees trivially: every operation, including the
//! composite `complete_stage_transaction`, runs while holding the one lock.
//! It is not durable across process restarts; see `stage-gate-store-sqlite`
//! for a persistent backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::attribution::Attribution;
use crate::core::identifiers::PipelineId;
use crate::core::identifiers::StageId;
use crate::core::pipeline::Pipeline;
use crate::core::registry::StageName;
use crate::core::stage::Stage;
use crate::core::status::PipelineStatus;
use crate::interfaces::PipelineFields;
use crate::interfaces::PipelineStore;
use crate::interfaces::StageFields;
use crate::interfaces::StoreError;
use crate::interfaces::apply_pipeline_fields;
use crate::interfaces::apply_stage_fields;

// ============================================================================
// SECTION: Internal State
// ============================================================================

#[derive(Default)]
struct Inner {
    pipelines: BTreeMap<PipelineId, Pipeline>,
    stages: BTreeMap<(PipelineId, StageName), Stage>,
    stage_index: BTreeMap<StageId, (PipelineId, StageName)>,
    attributions: BTreeMap<(PipelineId, StageName), Attribution>,
}

// ============================================================================
// SECTION: In-Memory Pipeline Store
// ============================================================================

/// A process-local, non-durable [`PipelineStore`] guarded by a single mutex.
pub struct InMemoryPipelineStore {
    inner: Mutex<Inner>,
}

impl InMemoryPipelineStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for InMemoryPipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStore for InMemoryPipelineStore {
    fn create_pipeline_with_stages(&self, pipeline: Pipeline, stages: Vec<Stage>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.pipelines.contains_key(&pipeline.id) {
            return Err(StoreError::Conflict(format!("pipeline {} already exists", pipeline.id)));
        }
        let pipeline_id = pipeline.id.clone();
        inner.pipelines.insert(pipeline_id.clone(), pipeline);
        for stage in stages {
            inner.stage_index.insert(stage.id.clone(), (pipeline_id.clone(), stage.stage_name));
            inner.stages.insert((pipeline_id.clone(), stage.stage_name), stage);
        }
        Ok(())
    }

    fn find_pipeline(&self, id: &PipelineId) -> Result<Option<Pipeline>, StoreError> {
        Ok(self.lock().pipelines.get(id).cloned())
    }

    fn find_stage(&self, pipeline_id: &PipelineId, stage_name: StageName) -> Result<Option<Stage>, StoreError> {
        Ok(self.lock().stages.get(&(pipeline_id.clone(), stage_name)).cloned())
    }

    fn find_stage_by_id(&self, stage_id: &StageId) -> Result<Option<Stage>, StoreError> {
        let inner = self.lock();
        let Some(key) = inner.stage_index.get(stage_id) else {
            return Ok(None);
        };
        Ok(inner.stages.get(key).cloned())
    }

    fn list_stages(&self, pipeline_id: &PipelineId) -> Result<Vec<Stage>, StoreError> {
        let inner = self.lock();
        if !inner.pipelines.contains_key(pipeline_id) {
            return Err(StoreError::NotFound(format!("pipeline {pipeline_id} not found")));
        }
        Ok(StageName::ORDER
            .into_iter()
            .filter_map(|stage_name| inner.stages.get(&(pipeline_id.clone(), stage_name)).cloned())
            .collect())
    }

    fn list_running_pipelines_with_stages(&self) -> Result<Vec<(Pipeline, Vec<Stage>)>, StoreError> {
        let inner = self.lock();
        let mut result = Vec::new();
        for pipeline in inner.pipelines.values().filter(|pipeline| pipeline.status == PipelineStatus::Running) {
            let stages = StageName::ORDER
                .into_iter()
                .filter_map(|stage_name| inner.stages.get(&(pipeline.id.clone(), stage_name)).cloned())
                .collect();
            result.push((pipeline.clone(), stages));
        }
        Ok(result)
    }

    fn list_pipelines(&self, filter: Option<PipelineStatus>, limit: u32) -> Result<Vec<Pipeline>, StoreError> {
        let inner = self.lock();
        let mut pipelines: Vec<Pipeline> = inner
            .pipelines
            .values()
            .filter(|pipeline| filter.is_none_or(|status| pipeline.status == status))
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.created_at.as_comparable().cmp(&a.created_at.as_comparable()));
        pipelines.truncate(limit as usize);
        Ok(pipelines)
    }

    fn compare_and_update_stage(
        &self,
        stage_id: &StageId,
        expected_status: crate::core::status::StageStatus,
        fields: StageFields,
    ) -> Result<Stage, StoreError> {
        let mut inner = self.lock();
        let Some(key) = inner.stage_index.get(stage_id).cloned() else {
            return Err(StoreError::NotFound(format!("stage {stage_id} not found")));
        };
        let Some(stage) = inner.stages.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("stage {stage_id} not found")));
        };
        if stage.status != expected_status {
            return Err(StoreError::PreconditionFailed(format!(
                "stage {stage_id} expected status {expected_status:?} but was {:?}",
                stage.status
            )));
        }
        apply_stage_fields(stage, fields);
        Ok(stage.clone())
    }

    fn complete_stage_transaction(
        &self,
        stage_id: &StageId,
        expected_status: crate::core::status::StageStatus,
        stage_fields: StageFields,
        attribution: Attribution,
        pipeline_fields: PipelineFields,
    ) -> Result<(Stage, Pipeline), StoreError> {
        let mut inner = self.lock();
        let Some(key) = inner.stage_index.get(stage_id).cloned() else {
            return Err(StoreError::NotFound(format!("stage {stage_id} not found")));
        };
        {
            let Some(stage) = inner.stages.get(&key) else {
                return Err(StoreError::NotFound(format!("stage {stage_id} not found")));
            };
            if stage.status != expected_status {
                return Err(StoreError::PreconditionFailed(format!(
                    "stage {stage_id} expected status {expected_status:?} but was {:?}",
                    stage.status
                )));
            }
        }
        let attribution_key = (attribution.pipeline_id.clone(), attribution.stage_name);
        if inner.attributions.contains_key(&attribution_key) {
            return Err(StoreError::Conflict(format!(
                "attribution already recorded for pipeline {} stage {:?}",
                attribution_key.0, attribution_key.1
            )));
        }
        let pipeline_id = key.0.clone();
        let Some(stage) = inner.stages.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("stage {stage_id} not found")));
        };
        apply_stage_fields(stage, stage_fields);
        let updated_stage = stage.clone();
        inner.attributions.insert(attribution_key, attribution);
        let Some(pipeline) = inner.pipelines.get_mut(&pipeline_id) else {
            return Err(StoreError::NotFound(format!("pipeline {pipeline_id} not found")));
        };
        apply_pipeline_fields(pipeline, pipeline_fields);
        let updated_pipeline = pipeline.clone();
        Ok((updated_stage, updated_pipeline))
    }

    fn append_attribution(&self, attribution: Attribution) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = (attribution.pipeline_id.clone(), attribution.stage_name);
        if inner.attributions.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "attribution already recorded for pipeline {} stage {:?}",
                key.0, key.1
            )));
        }
        inner.attributions.insert(key, attribution);
        Ok(())
    }

    fn list_attributions(&self, pipeline_id: &PipelineId) -> Result<Vec<Attribution>, StoreError> {
        let inner = self.lock();
        Ok(StageName::ORDER
            .into_iter()
            .filter_map(|stage_name| inner.attributions.get(&(pipeline_id.clone(), stage_name)).cloned())
            .collect())
    }

    fn update_pipeline(&self, id: &PipelineId, fields: PipelineFields) -> Result<Pipeline, StoreError> {
        let mut inner = self.lock();
        let Some(pipeline) = inner.pipelines.get_mut(id) else {
            return Err(StoreError::NotFound(format!("pipeline {id} not found")));
        };
        apply_pipeline_fields(pipeline, fields);
        Ok(pipeline.clone())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use super::InMemoryPipelineStore;
    use crate::core::identifiers::PipelineId;
    use crate::core::identifiers::StageId;
    use crate::core::pipeline::Pipeline;
    use crate::core::registry::StageName;
    use crate::core::stage::Stage;
    use crate::core::status::StageStatus;
    use crate::core::time::Timestamp;
    use crate::interfaces::PipelineStore;
    use crate::interfaces::StageFields;
    use crate::interfaces::StoreError;

    fn seeded_store() -> InMemoryPipelineStore {
        let store = InMemoryPipelineStore::new();
        let pipeline = Pipeline::new(PipelineId::new("p1"), "topic", "desc", Timestamp::Logical(0));
        let stages = StageName::ORDER
            .into_iter()
            .map(|stage_name| Stage::pending(StageId::new(format!("p1-{stage_name}")), PipelineId::new("p1"), stage_name))
            .collect();
        store.create_pipeline_with_stages(pipeline, stages).expect("seed succeeds");
        store
    }

    #[test]
    fn duplicate_pipeline_creation_conflicts() {
        let store = seeded_store();
        let pipeline = Pipeline::new(PipelineId::new("p1"), "topic", "desc", Timestamp::Logical(0));
        let result = store.create_pipeline_with_stages(pipeline, vec![]);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn compare_and_update_stage_rejects_wrong_expected_status() {
        let store = seeded_store();
        let result = store.compare_and_update_stage(
            &StageId::new("p1-RESEARCH"),
            StageStatus::Claimed,
            StageFields::status_only(StageStatus::Running),
        );
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
    }

    #[test]
    fn compare_and_update_stage_succeeds_on_matching_status() {
        let store = seeded_store();
        let stage = store
            .compare_and_update_stage(
                &StageId::new("p1-RESEARCH"),
                StageStatus::Pending,
                StageFields::status_only(StageStatus::Claimed),
            )
            .expect("claim succeeds");
        assert_eq!(stage.status, StageStatus::Claimed);
    }

    #[test]
    fn list_stages_on_unknown_pipeline_is_not_found() {
        let store = InMemoryPipelineStore::new();
        let result = store.list_stages(&PipelineId::new("missing"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
