// crates/stage-gate-handlers/src/editor.rs
// ============================================================================
// Module: Editor Stage Handler
// Description: Deterministic handler for the EDITOR stage.
// Purpose: Assemble a stub rendered video from the preceding VISUAL output.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The editor handler renders a fixed output format and sizes the assembled
//! video's duration to the end of the last preceding visual clip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::EditorOutput;
use stage_gate_core::core::output::VideoFormat;
use stage_gate_core::core::output::VisualOutput;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the editor handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorHandlerConfig {
    /// URL scheme and host prefix used to fabricate the rendered video
    /// location.
    pub video_url_prefix: String,
    /// URL scheme and host prefix used to fabricate the thumbnail location.
    pub thumbnail_url_prefix: String,
    /// Frame width in pixels of the rendered video.
    pub width: u32,
    /// Frame height in pixels of the rendered video.
    pub height: u32,
    /// Frames per second of the rendered video.
    pub fps: u32,
    /// Video codec identifier of the rendered video.
    pub codec: String,
}

impl Default for EditorHandlerConfig {
    fn default() -> Self {
        Self {
            video_url_prefix: "stub://video".to_owned(),
            thumbnail_url_prefix: "stub://thumbnail".to_owned(),
            width: 1080,
            height: 1920,
            fps: 30,
            codec: "h264".to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the EDITOR stage.
pub struct EditorHandler {
    /// Handler configuration.
    config: EditorHandlerConfig,
}

impl EditorHandler {
    /// Creates a new editor handler with the given configuration.
    #[must_use]
    pub const fn new(config: EditorHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for EditorHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        if input.is_object() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()])
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Visual(visual)) = &context.previous_output else {
            return StageResult::Failure { error: "editor stage requires a visual output".to_owned() };
        };

        let duration_s = timeline_end(visual);
        let video_url = format!("{}/{}/{}", self.config.video_url_prefix, context.pipeline_id, context.stage_id);
        let thumbnail_url = format!("{}/{}/{}", self.config.thumbnail_url_prefix, context.pipeline_id, context.stage_id);
        let format = VideoFormat {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
            codec: self.config.codec.clone(),
        };

        StageResult::Success {
            output: StageOutput::Editor(EditorOutput {
                video_url,
                thumbnail_url,
                duration_s,
                format,
                render_time_s: 0.0,
            }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the latest point in time any clip or overlay extends to.
fn timeline_end(visual: &VisualOutput) -> f64 {
    let clip_end = visual.clips.iter().map(|clip| clip.start_time + clip.duration).fold(0.0_f64, f64::max);
    let overlay_end = visual.overlays.iter().map(|overlay| overlay.start_time + overlay.duration).fold(0.0_f64, f64::max);
    clip_end.max(overlay_end)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use serde_json::json;
    use stage_gate_core::PipelineId;
    use stage_gate_core::StageId;
    use stage_gate_core::StageName;
    use stage_gate_core::StageOutput;
    use stage_gate_core::core::output::VisualClip;
    use stage_gate_core::core::output::VisualOutput;
    use stage_gate_core::dispatch::StageContext;
    use stage_gate_core::dispatch::StageResult;

    use super::EditorHandler;
    use super::EditorHandlerConfig;
    use crate::StageHandler;

    fn visual_output() -> VisualOutput {
        VisualOutput {
            clips: vec![VisualClip { url: "clip".to_owned(), start_time: 0.0, duration: 20.0 }],
            overlays: vec![],
        }
    }

    fn context(previous_output: Option<StageOutput>) -> StageContext {
        StageContext {
            pipeline_id: PipelineId::new("p1"),
            stage_id: StageId::new("p1-EDITOR"),
            stage_name: StageName::Editor,
            input: json!({}),
            previous_output,
            dry_run: false,
        }
    }

    #[test]
    fn execute_fails_without_visual_output() {
        let handler = EditorHandler::new(EditorHandlerConfig::default());
        let result = handler.execute(&context(None));
        assert!(matches!(result, StageResult::Failure { .. }));
    }

    #[test]
    fn execute_sizes_duration_to_the_timeline_end() {
        let handler = EditorHandler::new(EditorHandlerConfig::default());
        let result = handler.execute(&context(Some(StageOutput::Visual(visual_output()))));
        let StageResult::Success { output: StageOutput::Editor(editor), .. } = result else {
            panic!("expected editor success");
        };
        assert!((editor.duration_s - 20.0).abs() < f64::EPSILON);
        assert_eq!(editor.format.codec, "h264");
    }
}
