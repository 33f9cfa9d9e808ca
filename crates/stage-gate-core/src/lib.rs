// crates/stage-gate-core/src/lib.rs
// ============================================================================
// Crate: stage-gate-core
// Description: Backend-agnostic pipeline scheduler, stage registry, and
// attribution engine for the content-generation stage gate.
// Purpose: Own the state machine and business rules; storage and stage
// execution are pluggable via traits implemented in sibling crates.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! # stage-gate-core
//!
//! The control plane for a multi-stage content pipeline: a fixed seven-stage
//! registry (`RESEARCH` through `PUBLISH`), a scheduler enforcing the
//! claim/start/complete/fail state machine, an attribution engine splitting
//! rewards by stage weight, and a storage port concrete stores implement.
//!
//! This crate has no knowledge of how a stage's work is actually performed,
//! what durable storage looks like, or how results reach end users — see
//! `stage-gate-store-sqlite` and `stage-gate-handlers` for those concerns.

pub mod core;
pub mod dispatch;
pub mod interfaces;
pub mod runtime;

pub use core::attribution::Attribution;
pub use core::errors::OrchestratorError;
pub use core::identifiers::AgentId;
pub use core::identifiers::AgentName;
pub use core::identifiers::AttributionId;
pub use core::identifiers::PipelineId;
pub use core::identifiers::StageId;
pub use core::output::StageOutput;
pub use core::pipeline::Pipeline;
pub use core::registry::StageName;
pub use core::stage::Stage;
pub use core::status::PipelineStatus;
pub use core::status::StageStatus;
pub use core::time::Timestamp;
pub use dispatch::HandlerRegistry;
pub use dispatch::StageHandler;
pub use interfaces::PipelineStore;
pub use interfaces::StoreError;
pub use runtime::attribution_engine::AttributionEngine;
pub use runtime::config::SchedulerConfig;
pub use runtime::memory_store::InMemoryPipelineStore;
pub use runtime::scheduler::PipelineScheduler;
pub use runtime::scheduler::ReadyEntry;
