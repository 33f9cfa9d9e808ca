// crates/stage-gate-handlers/src/publish.rs
// ============================================================================
// Module: Publish Stage Handler
// Description: Deterministic handler for the terminal PUBLISH stage.
// Purpose: Fan a rendered video out to stub per-platform publish results.
// Dependencies: serde_json, stage_gate_core
// ============================================================================

//! ## Overview
//! The publish handler requires a preceding EDITOR output and fans the
//! rendered video out to every platform named in the input, or to the
//! configured default platforms when the input names none.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use stage_gate_core::StageHandler;
use stage_gate_core::StageOutput;
use stage_gate_core::core::output::PlatformPublishResult;
use stage_gate_core::core::output::PublishOutput;
use stage_gate_core::dispatch::StageContext;
use stage_gate_core::dispatch::StageResult;
use stage_gate_core::dispatch::ValidationResult;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the publish handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishHandlerConfig {
    /// Platforms targeted when the input omits `platforms`.
    pub default_platforms: Vec<String>,
}

impl Default for PublishHandlerConfig {
    fn default() -> Self {
        Self { default_platforms: vec!["youtube".to_owned()] }
    }
}

// ============================================================================
// SECTION: Handler Implementation
// ============================================================================

/// Deterministic handler for the PUBLISH stage.
///
/// # Invariants
/// - `validate` rejects a `platforms` field that is present but not an array
///   of non-empty strings.
pub struct PublishHandler {
    /// Handler configuration.
    config: PublishHandlerConfig,
}

impl PublishHandler {
    /// Creates a new publish handler with the given configuration.
    #[must_use]
    pub const fn new(config: PublishHandlerConfig) -> Self {
        Self { config }
    }
}

impl StageHandler for PublishHandler {
    fn validate(&self, input: &Value) -> ValidationResult {
        let Some(object) = input.as_object() else {
            return ValidationResult::Invalid(vec!["input must be a JSON object".to_owned()]);
        };
        match object.get("platforms") {
            None => ValidationResult::Valid,
            Some(value) if platforms_from_value(value).is_some() => ValidationResult::Valid,
            Some(_) => ValidationResult::Invalid(vec!["platforms must be an array of non-empty strings".to_owned()]),
        }
    }

    fn execute(&self, context: &StageContext) -> StageResult {
        let Some(StageOutput::Editor(_)) = &context.previous_output else {
            return StageResult::Failure { error: "publish stage requires an editor output".to_owned() };
        };

        let platforms = context
            .input
            .as_object()
            .and_then(|object| object.get("platforms"))
            .and_then(platforms_from_value)
            .unwrap_or_else(|| self.config.default_platforms.clone());
        let published_at = i64_field(&context.input, "published_at").unwrap_or(0);

        let results = platforms
            .iter()
            .map(|platform| PlatformPublishResult {
                platform: platform.clone(),
                url: format!("https://stub.example/{platform}/{}", context.pipeline_id),
                post_id: format!("stub-{}-{platform}", context.pipeline_id),
                success: true,
                error: None,
            })
            .collect();

        StageResult::Success {
            output: StageOutput::Publish(PublishOutput { platforms: results, published_at }),
            artifacts: vec![],
            metadata: Value::Null,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses `value` as a non-empty array of non-empty platform name strings.
fn platforms_from_value(value: &Value) -> Option<Vec<String>> {
    let array = value.as_array()?;
    if array.is_empty() {
        return None;
    }
    array
        .iter()
        .map(|entry| entry.as_str().filter(|name| !name.is_empty()).map(ToOwned::to_owned))
        .collect::<Option<Vec<String>>>()
}

/// Extracts an optional `i64` field from an object input.
fn i64_field(input: &Value, key: &str) -> Option<i64> {
    input.as_object()?.get(key)?.as_i64()
}
