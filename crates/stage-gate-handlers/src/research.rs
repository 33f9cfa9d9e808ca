// crates/stage-gate-handlers/src/research.rs
// ============================================================================
// Module: Research Stage Handler
// Description: Deterministic handler for the RESEARCH stage.
// Purpose: Produce a structurally valid ResearchOutput from a topic without
// calling out to a real research backend.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The research handler requires only a topic in its input. It fabricates
//! facts and hooks deterministically from the topic string so that repeated
//! runs with the same input produce the same output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::ResearchOutput;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the research handler.
///
/// # Invariants
/// - `fact_count` and `hook_count` are clamped to the ranges documented on
///   [`ResearchOutput::facts`] and [`ResearchOutput::hooks`] before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchHandlerConfig {
    /// Audience used when the input omits `target_audience`.
    pub default_target_audience: String,
    /// Number of facts to fabricate, clamped to `[3, 10]`.
    pub fact_count: usize,
    /// Number of hooks to fabricate, clamped to `[2, 5]`.
    pub hook_count: usize,
    /// Duration used when the input omits `estimated_duration`, clamped to
    /// `[15, 180]`.
    pub default_duration_s: u32,
}

impl Default for ResearchHandlerConfig {
    fn default() -> Self {
        Self {
            default_target_audience: "general audience".to_owned(),
            fact_count: 5,
            hook_count: 3,
            default_duration_s: 60,
        }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the RESEARCH stage.
///
/// # Invariants
/// - `validate` accepts only an object input carrying a non-empty `topic`
///   string.
pub struct ResearchHandler {
    /// Handler configuration.
    config: ResearchHandlerConfig,
}

impl ResearchHandler {
    /// Creates a new research handler with the given configuration.
    #[must_use]
    pub const fn new(config: ResearchHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for ResearchHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        match extract_topic(input) {
            Some(topic) if !topic.is_empty() => ValidationResult::Valid,
            Some(_) => ValidationResult::Invalid(vec!["topic must not be empty".to_owned()]),
            None => ValidationResult::Invalid(vec!["input requires a string \"topic\" field".to_owned()]),
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(topic) = extract_topic(&context.input) else {
            return StageResult::Failure { error: "input requires a string \"topic\" field".to_owned() };
        };

        let facts = build_facts(topic, self.config.fact_count.clamp(3, 10));
        let hooks = build_hooks(topic, self.config.hook_count.clamp(2, 5));
        let sources = extract_sources(&context.input);
        let target_audience =
            string_field(&context.input, "target_audience").unwrap_or_else(|| self.config.default_target_audience.clone());
        let estimated_duration =
            u32_field(&context.input, "estimated_duration").unwrap_or(self.config.default_duration_s).clamp(15, 180);

        StageResult::Success {
            output: StageOutput::Research(ResearchOutput {
                topic: topic.to_owned(),
                facts,
                sources,
                hooks,
                target_audience,
                estimated_duration,
            }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the `topic` string field from the input, if present.
fn extract_topic(input: &Value) -> Option<&str> {
    input.as_object()?.get("topic")?.as_str()
}

/// Extracts the optional `sources` array of strings from the input.
fn extract_sources(input: &Value) -> Vec<String> {
    let Some(Value::Array(sources)) = input.as_object().and_then(|object| object.get("sources")) else {
        return vec![];
    };
    sources.iter().filter_map(|entry| entry.as_str()).map(ToOwned::to_owned).collect()
}

/// Extracts an optional string field from an object input.
fn string_field(input: &Value, key: &str) -> Option<String> {
    input.as_object()?.get(key)?.as_str().map(ToOwned::to_owned)
}

/// Extracts an optional `u32` field from an object input.
fn u32_field(input: &Value, key: &str) -> Option<u32> {
    let number = input.as_object()?.get(key)?.as_u64()?;
    u32::try_from(number).ok()
}

/// Fabricates `count` deterministic facts about `topic`.
fn build_facts(topic: &str, count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("{topic} fact {index}")).collect()
}

/// Fabricates `count` deterministic audience hooks about `topic`.
fn build_hooks(topic: &str, count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("Did you know this about {topic}? (hook {index})")).collect()
}
