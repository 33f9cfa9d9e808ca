// crates/stage-gate-handlers/src/voice.rs
// ============================================================================
// Module: Voice Stage Handler
// Description: Deterministic handler for the VOICE stage.
// Purpose: Turn a SCRIPT output into a structurally valid VoiceOutput.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The voice handler narrates the preceding SCRIPT output verbatim into a
//! stub audio location, generating one transcript timestamp per section.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::ScriptOutput;
use stage_gate_core::core::output::TranscriptTimestamp;
use stage_gate_core::core::output::VoiceOutput;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the voice handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceHandlerConfig {
    /// URL scheme and host prefix used to fabricate the rendered audio
    /// location.
    pub audio_url_prefix: String,
}

impl Default for VoiceHandlerConfig {
    fn default() -> Self {
        Self { audio_url_prefix: "stub://voice".to_owned() }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the VOICE stage.
pub struct VoiceHandler {
    /// Handler configuration.
    config: VoiceHandlerConfig,
}

impl VoiceHandler {
    /// Creates a new voice handler with the given configuration.
    #[must_use]
    pub const fn new(config: VoiceHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for VoiceHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        if input.is_object() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()])
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Script(script)) = &context.previous_output else {
            return StageResult::Failure { error: "voice stage requires a script output".to_owned() };
        };

        let audio_url = format!("{}/{}/{}", self.config.audio_url_prefix, context.pipeline_id, context.stage_id);
        let timestamps = build_timestamps(script);
        let duration_s = f64::from(script.estimated_duration);

        StageResult::Success {
            output: StageOutput::Voice(VoiceOutput {
                audio_url,
                duration_s,
                transcript: script.full_script.clone(),
                timestamps,
            }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds one transcript timestamp per script section, offset cumulatively
/// by each section's narration duration.
fn build_timestamps(script: &ScriptOutput) -> Vec<TranscriptTimestamp> {
    let mut offset_s = 0.0_f64;
    let mut timestamps = Vec::with_capacity(script.body.len());
    for section in &script.body {
        timestamps.push(TranscriptTimestamp { text: section.content.clone(), offset_s });
        offset_s += f64::from(section.duration_s);
    }
    timestamps
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use serde_json::json;
    use stage_gate_core::PipelineId;
    use stage_gate_core::StageId;
    use stage_gate_core::StageName;
    use stage_gate_core::StageOutput;
    use stage_gate_core::core::output::ScriptOutput;
    use stage_gate_core::core::output::ScriptSection;
    use stage_gate_core::dispatch::StageContext;
    use stage_gate_core::dispatch::StageResult;

    use super::VoiceHandler;
    use super::VoiceHandlerConfig;
    use crate::StageHandler;

    fn script_output() -> ScriptOutput {
        ScriptOutput {
            hook: "hook".to_owned(),
            body: vec![ScriptSection {
                heading: "Section 1".to_owned(),
                content: "content".to_owned(),
                visual_cue: "cue-1".to_owned(),
                duration_s: 10,
            }],
            cta: "subscribe".to_owned(),
            full_script: "hook content subscribe".to_owned(),
            estimated_duration: 10,
            speaker_notes: vec![],
        }
    }

    fn context(previous_output: Option<StageOutput>) -> StageContext {
        StageContext {
            pipeline_id: PipelineId::new("p1"),
            stage_id: StageId::new("p1-VOICE"),
            stage_name: StageName::Voice,
            input: json!({}),
            previous_output,
            dry_run: false,
        }
    }

    #[test]
    fn execute_fails_without_script_output() {
        let handler = VoiceHandler::new(VoiceHandlerConfig::default());
        let result = handler.execute(&context(None));
        assert!(matches!(result, StageResult::Failure { .. }));
    }

    #[test]
    fn execute_carries_the_full_script_as_transcript() {
        let handler = VoiceHandler::new(VoiceHandlerConfig::default());
        let result = handler.execute(&context(Some(StageOutput::Script(script_output()))));
        let StageResult::Success { output: StageOutput::Voice(voice), .. } = result else {
            panic!("expected voice success");
        };
        assert_eq!(voice.transcript, "hook content subscribe");
        assert_eq!(voice.timestamps.len(), 1);
    }
}
