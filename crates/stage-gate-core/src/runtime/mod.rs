// crates/stage-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Runtime
// Description: The scheduler, attribution engine, in-memory store, config,
// and telemetry that drive pipelines end to end.
// Purpose: Group the stateful, I/O-adjacent parts of the crate separately
// from the pure domain types in `core`.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Everything in `runtime` either holds state (the in-memory store,
//! telemetry counters) or orchestrates calls to a [`crate::interfaces::PipelineStore`]
//! (the scheduler, the attribution engine).

pub mod attribution_engine;
pub mod config;
pub mod memory_store;
pub mod scheduler;
pub mod telemetry;
