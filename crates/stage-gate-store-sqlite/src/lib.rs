// crates/stage-gate-store-sqlite/src/lib.rs
// ============================================================================
// Crate: stage-gate-store-sqlite
// Description: SQLite-backed implementation of the stage-gate-core
// PipelineStore port.
// Purpose: Give Stage Gate a durable, single-file store suitable for a
// single-process deployment, without pulling in an external database.
// Dependencies: rusqlite, serde, serde_json, stage-gate-core, thiserror
// ============================================================================

//! # stage-gate-store-sqlite
//!
//! A [`stage_gate_core::PipelineStore`] backed by `SQLite` in WAL mode. All
//! access is serialized through a single connection guarded by a mutex; the
//! composite writes the port requires (`compare_and_update_stage`,
//! `complete_stage_transaction`) are each wrapped in one `SQLite` transaction.

pub mod store;

pub use store::SqlitePipelineStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
