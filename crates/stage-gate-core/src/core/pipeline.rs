// crates/stage-gate-core/src/core/pipeline.rs
// ============================================================================
// Module: Pipeline Record
// Description: The top-level run instance for one piece of content.
// Purpose: Represent the data the scheduler and store exchange for a single
// pipeline run.
// Dependencies: serde, crate::core::identifiers, crate::core::registry,
// crate::core::status, crate::core::time
// ============================================================================

//! ## Overview
//! A [`Pipeline`] is one run through the seven fixed stages, tracking its
//! current position and terminal status. The scheduler is the only writer;
//! stores persist whatever the scheduler hands them without interpreting
//! field semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use super::identifiers::PipelineId;
use super::registry::StageName;
use super::status::PipelineStatus;
use super::time::Timestamp;

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// A single pipeline run through the fixed stage order.
///
/// # Invariants
/// - `current_stage` is `None` only while `status` is `Draft`.
/// - Once `status` is `Complete` or `Failed`, no further field but `status`
///   itself changes (see [`PipelineStatus::is_terminal`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Unique identifier for this run.
    pub id: PipelineId,
    /// Short topic string supplied at creation.
    pub topic: String,
    /// Longer free-form description supplied at creation.
    pub description: String,
    /// Current lifecycle status.
    pub status: PipelineStatus,
    /// The stage currently occupying this pipeline's attention, if started.
    pub current_stage: Option<StageName>,
    /// Creation time, as supplied by the caller.
    pub created_at: Timestamp,
    /// Last modification time, as supplied by the caller.
    pub updated_at: Timestamp,
}

impl Pipeline {
    /// Builds a freshly created pipeline in `Draft` status.
    #[must_use]
    pub fn new(id: PipelineId, topic: impl Into<String>, description: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id,
            topic: topic.into(),
            description: description.into(),
            status: PipelineStatus::Draft,
            current_stage: None,
            created_at,
            updated_at: created_at,
        }
    }
}
