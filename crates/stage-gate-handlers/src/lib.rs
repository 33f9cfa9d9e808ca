// crates/stage-gate-handlers/src/lib.rs
// ============================================================================
// Crate: stage-gate-handlers
// Description: Built-in, deterministic stage handlers for all seven stages.
// Purpose: Give Stage Gate a zero-config handler set so a pipeline can be
// driven end to end without wiring up real generation backends.
// Dependencies: serde, serde_json, stage-gate-core
// ============================================================================

//! ## Overview
//! This crate ships one [`stage_gate_core::StageHandler`] per stage name and a
//! registry constructor that wires them all up. Every handler is
//! deterministic with respect to its input and the previous stage's output;
//! none perform network or filesystem side effects, so they are safe to run
//! in `dry_run` or in tests without a real content-generation backend behind
//! them.
//!
//! Invariants:
//! - A handler never inspects fields from a stage other than its own and the
//!   one immediately preceding it in fixed order.
//! - `execute` fails closed: malformed previous output produces
//!   [`stage_gate_core::StageResult::Failure`], never a panic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod editor;
pub mod music;
pub mod publish;
pub mod registry;
pub mod research;
pub mod script;
pub mod visual;
pub mod voice;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use editor::EditorHandler;
pub use editor::EditorHandlerConfig;
pub use music::MusicHandler;
pub use music::MusicHandlerConfig;
pub use publish::PublishHandler;
pub use publish::PublishHandlerConfig;
pub use registry::BuiltinHandlerConfigs;
pub use registry::register_builtin_handlers;
pub use registry::with_builtin_handlers;
pub use research::ResearchHandler;
pub use research::ResearchHandlerConfig;
pub use script::ScriptHandler;
pub use script::ScriptHandlerConfig;
pub use visual::VisualHandler;
pub use visual::VisualHandlerConfig;
pub use voice::VoiceHandler;
pub use voice::VoiceHandlerConfig;
