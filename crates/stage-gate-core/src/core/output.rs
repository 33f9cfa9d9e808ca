// crates/stage-gate-core/src/core/output.rs
// ============================================================================
// Module: Stage Output Schemas
// Description: Typed handoff payloads exchanged between adjacent stages.
// Purpose: Give hosts a strongly typed alternative to an opaque JSON blob
// while keeping the scheduler itself ignorant of payload semantics.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The scheduler treats a completed stage's output as an opaque value to
//! store and hand to the next stage; it never inspects fields. [`StageOutput`]
//! gives hosts that want strong typing a tagged enum with one variant per
//! handoff schema, dispatched by stage name, matching the design note on
//! dynamic stage output typing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Stage Output
// ============================================================================

/// Typed output produced by completing a stage.
///
/// # Invariants
/// - The variant in use must match the stage name being completed; the
///   scheduler validates this correspondence but does not interpret the
///   payload further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageOutput {
    /// RESEARCH → SCRIPT handoff.
    Research(ResearchOutput),
    /// SCRIPT → VOICE handoff.
    Script(ScriptOutput),
    /// VOICE → EDITOR handoff.
    Voice(VoiceOutput),
    /// MUSIC → EDITOR handoff.
    Music(MusicOutput),
    /// VISUAL → EDITOR handoff.
    Visual(VisualOutput),
    /// EDITOR → PUBLISH handoff.
    Editor(EditorOutput),
    /// PUBLISH → terminal handoff.
    Publish(PublishOutput),
}

impl StageOutput {
    /// Returns the fixed stage name this output was produced by.
    #[must_use]
    pub const fn stage_name(&self) -> super::registry::StageName {
        use super::registry::StageName;
        match self {
            Self::Research(_) => StageName::Research,
            Self::Script(_) => StageName::Script,
            Self::Voice(_) => StageName::Voice,
            Self::Music(_) => StageName::Music,
            Self::Visual(_) => StageName::Visual,
            Self::Editor(_) => StageName::Editor,
            Self::Publish(_) => StageName::Publish,
        }
    }
}

/// Output of the RESEARCH stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    /// The researched topic, echoed from pipeline creation.
    pub topic: String,
    /// Between three and ten researched facts.
    pub facts: Vec<String>,
    /// Source references backing the facts.
    pub sources: Vec<String>,
    /// Between two and five audience hooks.
    pub hooks: Vec<String>,
    /// Intended audience description.
    pub target_audience: String,
    /// Estimated final video duration in seconds, within `[15, 180]`.
    pub estimated_duration: u32,
}

/// One section of a script body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    /// Section heading.
    pub heading: String,
    /// Section narration content.
    pub content: String,
    /// Suggested visual cue for this section.
    pub visual_cue: String,
    /// Estimated section duration in seconds.
    pub duration_s: u32,
}

/// Output of the SCRIPT stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Opening hook line.
    pub hook: String,
    /// Ordered script body sections.
    pub body: Vec<ScriptSection>,
    /// Closing call to action.
    pub cta: String,
    /// The full assembled script text.
    pub full_script: String,
    /// Estimated total duration in seconds.
    pub estimated_duration: u32,
    /// Notes for the narrator.
    pub speaker_notes: Vec<String>,
}

/// A transcript timestamp marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTimestamp {
    /// Transcript text for this marker.
    pub text: String,
    /// Offset in seconds from the start of the narration.
    pub offset_s: f64,
}

/// Output of the VOICE stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceOutput {
    /// Location of the rendered narration audio.
    pub audio_url: String,
    /// Narration duration in seconds.
    pub duration_s: f64,
    /// Full narration transcript.
    pub transcript: String,
    /// Word- or phrase-level timestamps within the transcript.
    pub timestamps: Vec<TranscriptTimestamp>,
}

/// Output of the MUSIC stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicOutput {
    /// Location of the selected music track.
    pub audio_url: String,
    /// Track duration in seconds.
    pub duration_s: f64,
    /// Music genre.
    pub genre: String,
    /// Intended mood of the track.
    pub mood: String,
}

/// A sourced visual clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualClip {
    /// Location of the clip asset.
    pub url: String,
    /// Start time in seconds within the assembled timeline.
    pub start_time: f64,
    /// Clip duration in seconds.
    pub duration: f64,
}

/// A text or graphic overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualOverlay {
    /// Overlay text or graphic reference.
    pub content: String,
    /// Start time in seconds within the assembled timeline.
    pub start_time: f64,
    /// Overlay duration in seconds.
    pub duration: f64,
    /// Overlay presentation style.
    pub style: String,
}

/// Output of the VISUAL stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualOutput {
    /// Sourced visual clips.
    pub clips: Vec<VisualClip>,
    /// Text and graphic overlays.
    pub overlays: Vec<VisualOverlay>,
}

/// Rendered video format parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: u32,
    /// Video codec identifier.
    pub codec: String,
}

/// Output of the EDITOR stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorOutput {
    /// Location of the assembled video.
    pub video_url: String,
    /// Location of the generated thumbnail image.
    pub thumbnail_url: String,
    /// Final video duration in seconds.
    pub duration_s: f64,
    /// Rendered video format.
    pub format: VideoFormat,
    /// Wall-clock render time in seconds, as reported by the handler.
    pub render_time_s: f64,
}

/// Per-platform publish result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPublishResult {
    /// Platform identifier, e.g. `"youtube"`.
    pub platform: String,
    /// Published post location.
    pub url: String,
    /// Platform-assigned post identifier.
    pub post_id: String,
    /// Whether publishing to this platform succeeded.
    pub success: bool,
    /// Platform error text, present only when `success` is `false`.
    pub error: Option<String>,
}

/// Output of the PUBLISH stage. Terminal: no downstream stage consumes this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutput {
    /// Per-platform publish outcomes.
    pub platforms: Vec<PlatformPublishResult>,
    /// Time publishing completed, as a caller-supplied unix millis value.
    pub published_at: i64,
}

#[cfg(test)]
mod tests {
    use super::ResearchOutput;
    use super::StageOutput;
    use crate::core::registry::StageName;

    #[test]
    fn stage_name_matches_variant() {
        let output = StageOutput::Research(ResearchOutput {
            topic: "cats".to_owned(),
            facts: vec!["fact".to_owned()],
            sources: vec![],
            hooks: vec![],
            target_audience: "everyone".to_owned(),
            estimated_duration: 60,
        });
        assert_eq!(output.stage_name(), StageName::Research);
    }
}
