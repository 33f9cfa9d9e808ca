// crates/stage-gate-handlers/src/music.rs
// ============================================================================
// Module: Music Stage Handler
// Description: Deterministic handler for the MUSIC stage.
// Purpose: Select a stub background track sized to the preceding narration.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The music handler sizes a fabricated track to the duration of the
//! preceding VOICE output, so the narration and the bed it plays under never
//! drift apart downstream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::MusicOutput;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the music handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicHandlerConfig {
    /// Genre used when the input omits `genre`.
    pub default_genre: String,
    /// Mood used when the input omits `mood`.
    pub default_mood: String,
    /// URL scheme and host prefix used to fabricate the selected track
    /// location.
    pub audio_url_prefix: String,
}

impl Default for MusicHandlerConfig {
    fn default() -> Self {
        Self {
            default_genre: "ambient".to_owned(),
            default_mood: "uplifting".to_owned(),
            audio_url_prefix: "stub://music".to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the MUSIC stage.
pub struct MusicHandler {
    /// Handler configuration.
    config: MusicHandlerConfig,
}

impl MusicHandler {
    /// Creates a new music handler with the given configuration.
    #[must_use]
    pub const fn new(config: MusicHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for MusicHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        if input.is_object() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()])
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Voice(voice)) = &context.previous_output else {
            return StageResult::Failure { error: "music stage requires a voice output".to_owned() };
        };

        let audio_url = format!("{}/{}/{}", self.config.audio_url_prefix, context.pipeline_id, context.stage_id);
        let genre = string_field(&context.input, "genre").unwrap_or_else(|| self.config.default_genre.clone());
        let mood = string_field(&context.input, "mood").unwrap_or_else(|| self.config.default_mood.clone());

        StageResult::Success {
            output: StageOutput::Music(MusicOutput { audio_url, duration_s: voice.duration_s, genre, mood }),
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

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use serde_json::json;
    use stage_gate_core::PipelineId;
    use stage_gate_core::StageId;
    use stage_gate_core::StageName;
    use stage_gate_core::StageOutput;
    use stage_gate_core::core::output::VoiceOutput;
    use stage_gate_core::dispatch::StageContext;
    use stage_gate_core::dispatch::StageResult;

    use super::MusicHandler;
    use super::MusicHandlerConfig;
    use crate::StageHandler;

    fn voice_output() -> VoiceOutput {
        VoiceOutput { audio_url: "stub://voice/p1".to_owned(), duration_s: 42.0, transcript: "t".to_owned(), timestamps: vec![] }
    }

    fn context(previous_output: Option<StageOutput>) -> StageContext {
        StageContext {
            pipeline_id: PipelineId::new("p1"),
            stage_id: StageId::new("p1-MUSIC"),
            stage_name: StageName::Music,
            input: json!({}),
            previous_output,
            dry_run: false,
        }
    }

    #[test]
    fn execute_fails_without_voice_output() {
        let handler = MusicHandler::new(MusicHandlerConfig::default());
        let result = handler.execute(&context(None));
        assert!(matches!(result, StageResult::Failure { .. }));
    }

    #[test]
    fn execute_matches_narration_duration() {
        let handler = MusicHandler::new(MusicHandlerConfig::default());
        let result = handler.execute(&context(Some(StageOutput::Voice(voice_output()))));
        let StageResult::Success { output: StageOutput::Music(music), .. } = result else {
            panic!("expected music success");
        };
        assert!((music.duration_s - 42.0).abs() < f64::EPSILON);
    }
}
