// crates/stage-gate-core/src/dispatch/mod.rs
// ============================================================================
// Module: Stage Handler Dispatch
// Description: The pluggable handler interface and its keyed registry.
// Purpose: Realize polymorphism over stage handlers without inheritance, by
// a registry keyed on stage name.
// Dependencies: serde_json, std::collections::BTreeMap,
// std::collections::BTreeSet, crate::core
// ============================================================================

//! ## Overview
//! A [`StageHandler`] implements the stage contract's `validate`/`execute`
//! pair for one stage. [`HandlerRegistry`] resolves a [`StageName`] to its
//! handler. Handlers are registered at startup; an absent handler does not
//! block `claim_stage`, only `dispatch::execute`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::identifiers::PipelineId;
use crate::core::identifiers::StageId;
use crate::core::output::StageOutput;
use crate::core::registry::StageName;

// ============================================================================
// SECTION: Validation
// ============================================================================

/// The outcome of validating a stage's input before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The input satisfies the stage's schema.
    Valid,
    /// The input is malformed; each entry is a human-readable reason.
    Invalid(Vec<String>),
}

impl ValidationResult {
    /// Returns true when the input was accepted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

// ============================================================================
// SECTION: Execution Context and Result
// ============================================================================

/// Everything a handler needs to execute a stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Owning pipeline.
    pub pipeline_id: PipelineId,
    /// Surrogate id of the stage being executed.
    pub stage_id: StageId,
    /// The stage being executed.
    pub stage_name: StageName,
    /// Caller-supplied input for this stage.
    pub input: serde_json::Value,
    /// The previous stage's typed output, absent for the first stage.
    pub previous_output: Option<StageOutput>,
    /// When true, the handler must not perform external side effects.
    pub dry_run: bool,
}

/// The outcome of executing a stage.
#[derive(Debug, Clone)]
pub enum StageResult {
    /// Execution succeeded.
    Success {
        /// Typed output handed to the next stage.
        output: StageOutput,
        /// Opaque handles to artifacts produced during execution.
        artifacts: Vec<String>,
        /// Opaque handler-specific metadata.
        metadata: serde_json::Value,
    },
    /// Execution failed; no external mutation the handler does not own may
    /// be left outstanding.
    Failure {
        /// Human-readable failure reason.
        error: String,
    },
}

// ============================================================================
// SECTION: Stage Handler Trait
// ============================================================================

/// A pluggable implementation of the stage contract for one stage name.
///
/// Implementations must be retry-safe: rerunning `execute` after a transient
/// failure must produce a functionally equivalent output.
pub trait StageHandler {
    /// Synchronously and purely validates a stage's input.
    fn validate(&self, input: &serde_json::Value) -> ValidationResult;

    /// Performs the stage's work.
    fn execute(&self, context: &StageContext) -> StageResult;
}

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Controls which stage names a [`HandlerRegistry`] will dispatch to.
#[derive(Debug, Clone)]
pub enum HandlerAccessPolicy {
    /// Any registered handler may be dispatched to.
    AllowAll,
    /// Only the listed stage names may be dispatched to, even if a handler
    /// is registered for others.
    Restricted(BTreeSet<StageName>),
}

impl HandlerAccessPolicy {
    /// Returns true when dispatch to `stage_name` is permitted by policy.
    #[must_use]
    pub fn allows(&self, stage_name: StageName) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Restricted(allowed) => allowed.contains(&stage_name),
        }
    }
}

// ============================================================================
// SECTION: Handler Registry
// ============================================================================

/// A keyed collection resolving a stage name to its handler implementation.
pub struct HandlerRegistry {
    handlers: BTreeMap<StageName, Box<dyn StageHandler + Send + Sync>>,
    policy: HandlerAccessPolicy,
}

impl HandlerRegistry {
    /// Builds an empty registry that allows dispatch to any registered
    /// handler.
    #[must_use]
    pub fn new() -> Self {
        Self { handlers: BTreeMap::new(), policy: HandlerAccessPolicy::AllowAll }
    }

    /// Builds an empty registry restricted to the given access policy.
    #[must_use]
    pub fn with_policy(policy: HandlerAccessPolicy) -> Self {
        Self { handlers: BTreeMap::new(), policy }
    }

    /// Registers a handler for `stage_name`, replacing any prior handler.
    pub fn register(&mut self, stage_name: StageName, handler: Box<dyn StageHandler + Send + Sync>) {
        self.handlers.insert(stage_name, handler);
    }

    /// Returns the handler for `stage_name`, if one is registered and
    /// permitted by policy.
    #[must_use]
    pub fn get(&self, stage_name: StageName) -> Option<&(dyn StageHandler + Send + Sync)> {
        if !self.policy.allows(stage_name) {
            return None;
        }
        self.handlers.get(&stage_name).map(AsRef::as_ref)
    }

    /// Returns true when a dispatchable handler is registered for
    /// `stage_name`.
    #[must_use]
    pub fn contains(&self, stage_name: StageName) -> bool {
        self.get(stage_name).is_some()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::HandlerAccessPolicy;
    use super::HandlerRegistry;
    use super::StageContext;
    use super::StageHandler;
    use super::StageResult;
    use super::ValidationResult;
    use crate::core::output::ResearchOutput;
    use crate::core::output::StageOutput;
    use crate::core::registry::StageName;

    struct AlwaysSucceeds;

    impl StageHandler for AlwaysSucceeds {
        fn validate(&self, _input: &serde_json::Value) -> ValidationResult {
            ValidationResult::Valid
        }

        fn execute(&self, _context: &StageContext) -> StageResult {
            StageResult::Success {
                output: StageOutput::Research(ResearchOutput {
                    topic: "t".to_owned(),
                    facts: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
                    sources: vec![],
                    hooks: vec!["h1".to_owned(), "h2".to_owned()],
                    target_audience: "all".to_owned(),
                    estimated_duration: 30,
                }),
                artifacts: vec![],
                metadata: serde_json::Value::Null,
            }
        }
    }

    #[test]
    fn registry_resolves_registered_handler() {
        let mut registry = HandlerRegistry::new();
        assert!(!registry.contains(StageName::Research));
        registry.register(StageName::Research, Box::new(AlwaysSucceeds));
        assert!(registry.contains(StageName::Research));
        assert!(!registry.contains(StageName::Script));
    }

    #[test]
    fn restricted_policy_blocks_dispatch_even_if_registered() {
        let mut registry = HandlerRegistry::with_policy(HandlerAccessPolicy::Restricted(BTreeSet::new()));
        registry.register(StageName::Research, Box::new(AlwaysSucceeds));
        assert!(!registry.contains(StageName::Research));
    }
}
