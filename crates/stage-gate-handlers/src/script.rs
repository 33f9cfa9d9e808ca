// crates/stage-gate-handlers/src/script.rs
// ============================================================================
// Module: Script Stage Handler
// Description: Deterministic handler for the SCRIPT stage.
// Purpose: Turn a RESEARCH output into a structurally valid ScriptOutput.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The script handler consumes the preceding RESEARCH output and drafts one
//! script section per researched fact. It fails closed when the previous
//! output is absent or is not a research output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::ResearchOutput;
use stage_gate_core::core::output::ScriptOutput;
use stage_gate_core::core::output::ScriptSection;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the script handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptHandlerConfig {
    /// Call to action used when the input omits `cta`.
    pub default_cta: String,
    /// Seconds of narration budgeted per script section.
    pub section_duration_s: u32,
}

impl Default for ScriptHandlerConfig {
    fn default() -> Self {
        Self { default_cta: "Like and subscribe for more.".to_owned(), section_duration_s: 12 }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the SCRIPT stage.
///
/// # Invariants
/// - `validate` accepts any object input; the hard requirement is the
///   previous research output, checked in `execute`.
pub struct ScriptHandler {
    /// Handler configuration.
    config: ScriptHandlerConfig,
}

impl ScriptHandler {
    /// Creates a new script handler with the given configuration.
    #[must_use]
    pub const fn new(config: ScriptHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for ScriptHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        if input.is_object() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()])
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Research(research)) = &context.previous_output else {
            return StageResult::Failure { error: "script stage requires a research output".to_owned() };
        };

        let hook = research.hooks.first().cloned().unwrap_or_else(|| format!("Let's talk about {}.", research.topic));
        let cta = string_field(&context.input, "cta").unwrap_or_else(|| self.config.default_cta.clone());
        let body = build_sections(research, self.config.section_duration_s);
        let full_script = assemble_full_script(&hook, &body, &cta);
        let estimated_duration = body.iter().map(|section| section.duration_s).sum::<u32>().max(15);
        let speaker_notes =
            vec![format!("Target audience: {}", research.target_audience), "Maintain an upbeat pace.".to_owned()];

        StageResult::Success {
            output: StageOutput::Script(ScriptOutput { hook, body, cta, full_script, estimated_duration, speaker_notes }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts an optional string field from an object input.
fn string_field(input: &Value, key: &str) -> Option<String> {
    input.as_object()?.get(key)?.as_str().map(ToOwned::to_owned)
}

/// Builds one script section per researched fact.
fn build_sections(research: &ResearchOutput, section_duration_s: u32) -> Vec<ScriptSection> {
    research
        .facts
        .iter()
        .enumerate()
        .map(|(index, fact)| ScriptSection {
            heading: format!("Section {}", index + 1),
            content: fact.clone(),
            visual_cue: format!("cue-{}", index + 1),
            duration_s: section_duration_s,
        })
        .collect()
}

/// Joins the hook, body sections, and call to action into narration text.
fn assemble_full_script(hook: &str, body: &[ScriptSection], cta: &str) -> String {
    let mut parts = Vec::with_capacity(body.len() + 2);
    parts.push(hook.to_owned());
    parts.extend(body.iter().map(|section| section.content.clone()));
    parts.push(cta.to_owned());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use serde_json::json;
    use stage_gate_core::PipelineId;
    use stage_gate_core::StageId;
    use stage_gate_core::StageName;
    use stage_gate_core::StageOutput;
    use stage_gate_core::core::output::ResearchOutput;
    use stage_gate_core::dispatch::StageContext;
    use stage_gate_core::dispatch::StageResult;

    use super::ScriptHandler;
    use super::ScriptHandlerConfig;
    use crate::StageHandler;

    fn research_output() -> ResearchOutput {
        ResearchOutput {
            topic: "cats".to_owned(),
            facts: vec!["fact one".to_owned(), "fact two".to_owned()],
            sources: vec![],
            hooks: vec!["hook one".to_owned()],
            target_audience: "cat lovers".to_owned(),
            estimated_duration: 60,
        }
    }

    fn context(previous_output: Option<StageOutput>) -> StageContext {
        StageContext {
            pipeline_id: PipelineId::new("p1"),
            stage_id: StageId::new("p1-SCRIPT"),
            stage_name: StageName::Script,
            input: json!({}),
            previous_output,
            dry_run: false,
        }
    }

    #[test]
    fn execute_fails_without_research_output() {
        let handler = ScriptHandler::new(ScriptHandlerConfig::default());
        let result = handler.execute(&context(None));
        assert!(matches!(result, StageResult::Failure { .. }));
    }

    #[test]
    fn execute_builds_one_section_per_fact() {
        let handler = ScriptHandler::new(ScriptHandlerConfig::default());
        let result = handler.execute(&context(Some(StageOutput::Research(research_output()))));
        let StageResult::Success { output: StageOutput::Script(script), .. } = result else {
            panic!("expected script success");
        };
        assert_eq!(script.body.len(), 2);
        assert_eq!(script.hook, "hook one");
    }
}
