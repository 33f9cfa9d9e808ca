// crates/stage-gate-handlers/src/visual.rs
// ============================================================================
// Module: Visual Stage Handler
// Description: Deterministic handler for the VISUAL stage.
// Purpose: Source stub clips and overlays spanning the preceding track's
// duration.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The visual handler tiles a fixed number of clips evenly across the
//! preceding MUSIC output's duration and scatters a fixed number of overlays
//! across the same span.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::VisualClip;
use stage_gate_core::core::output::VisualOutput;
use stage_gate_core::core::output::VisualOverlay;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the visual handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualHandlerConfig {
    /// Number of clips to source, tiled evenly across the timeline.
    pub clip_count: usize,
    /// Number of overlays to place, scattered evenly across the timeline.
    pub overlay_count: usize,
    /// URL scheme and host prefix used to fabricate clip locations.
    pub clip_source_prefix: String,
}

impl Default for VisualHandlerConfig {
    fn default() -> Self {
        Self { clip_count: 4, overlay_count: 2, clip_source_prefix: "stub://visual".to_owned() }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the VISUAL stage.
pub struct VisualHandler {
    /// Handler configuration.
    config: VisualHandlerConfig,
}

impl VisualHandler {
    /// Creates a new visual handler with the given configuration.
    #[must_use]
    pub const fn new(config: VisualHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for VisualHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        if input.is_object() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()])
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Music(music)) = &context.previous_output else {
            return StageResult::Failure { error: "visual stage requires a music output".to_owned() };
        };

        let clip_count = self.config.clip_count.max(1);
        let overlay_count = self.config.overlay_count.max(1);
        let clips = build_clips(music.duration_s, clip_count, &self.config.clip_source_prefix, context);
        let overlays = build_overlays(music.duration_s, overlay_count);

        StageResult::Success {
            output: StageOutput::Visual(VisualOutput { clips, overlays }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Tiles `count` clips evenly across `total_duration_s`.
fn build_clips(total_duration_s: f64, count: usize, source_prefix: &str, context: &StageContext) -> Vec<VisualClip> {
    let slice_s = total_duration_s / count as f64;
    (0..count)
        .map(|index| VisualClip {
            url: format!("{source_prefix}/{}/{}/clip-{index}", context.pipeline_id, context.stage_id),
            start_time: slice_s * index as f64,
            duration: slice_s,
        })
        .collect()
}

/// Scatters `count` overlays evenly across `total_duration_s`.
fn build_overlays(total_duration_s: f64, count: usize) -> Vec<VisualOverlay> {
    let slice_s = total_duration_s / count as f64;
    (0..count)
        .map(|index| VisualOverlay {
            content: format!("overlay-{index}"),
            start_time: slice_s * index as f64,
            duration: slice_s.min(3.0),
            style: "lower-third".to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "test assertions use expect for clarity")]

    use serde_json::json;
    use stage_gate_core::PipelineId;
    use stage_gate_core::StageId;
    use stage_gate_core::StageName;
    use stage_gate_core::StageOutput;
    use stage_gate_core::core::output::MusicOutput;
    use stage_gate_core::dispatch::StageContext;
    use stage_gate_core::dispatch::StageResult;

    use super::VisualHandler;
    use super::VisualHandlerConfig;
    use crate::StageHandler;

    fn music_output() -> MusicOutput {
        MusicOutput {
            audio_url: "stub://music/p1".to_owned(),
            duration_s: 40.0,
            genre: "ambient".to_owned(),
            mood: "uplifting".to_owned(),
        }
    }

    fn context(previous_output: Option<StageOutput>) -> StageContext {
        StageContext {
            pipeline_id: PipelineId::new("p1"),
            stage_id: StageId::new("p1-VISUAL"),
            stage_name: StageName::Visual,
            input: json!({}),
            previous_output,
            dry_run: false,
        }
    }

    #[test]
    fn execute_fails_without_music_output() {
        let handler = VisualHandler::new(VisualHandlerConfig::default());
        let result = handler.execute(&context(None));
        assert!(matches!(result, StageResult::Failure { .. }));
    }

    #[test]
    fn execute_tiles_clips_across_the_full_duration() {
        let handler = VisualHandler::new(VisualHandlerConfig::default());
        let result = handler.execute(&context(Some(StageOutput::Music(music_output()))));
        let StageResult::Success { output: StageOutput::Visual(visual), .. } = result else {
            panic!("expected visual success");
        };
        assert_eq!(visual.clips.len(), 4);
        let span: f64 = visual.clips.iter().map(|clip| clip.duration).sum();
        assert!((span - 40.0).abs() < 1e-9);
    }
}
