// crates/stage-gate-core/src/runtime/config.rs
// ============================================================================
// Module: Scheduler Runtime Configuration
// Description: Deserializable configuration for the pipeline scheduler.
// Purpose: Give hosts a validated, serde-friendly way to configure reaper
// timeouts and listing limits without touching scheduler code.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`SchedulerConfig`] is deserialized from whatever configuration format a
//! host uses (TOML, JSON, environment) and validated once at construction
//! time via [`SchedulerConfig::validate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Defaults
// ============================================================================

const fn default_reaper_timeout_ms() -> u64 {
    300_000
}

const fn default_max_list_limit() -> u32 {
    500
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Runtime configuration for a [`crate::runtime::scheduler::PipelineScheduler`].
///
/// # Invariants
/// - `reaper_timeout_ms` is greater than zero after validation.
/// - `max_list_limit` is greater than zero after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds a stage may remain `CLAIMED`/`RUNNING` before the
    /// reaper considers it stalled.
    #[serde(default = "default_reaper_timeout_ms")]
    pub reaper_timeout_ms: u64,

    /// The largest `limit` value `list_pipelines` will accept.
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { reaper_timeout_ms: default_reaper_timeout_ms(), max_list_limit: default_max_list_limit() }
    }
}

impl SchedulerConfig {
    /// Validates runtime limits, rejecting zero values that would make the
    /// reaper a no-op or every listing call fail.
    ///
    /// # Errors
    /// Returns [`ConfigError`] describing the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reaper_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("reaper_timeout_ms must be greater than zero".to_owned()));
        }
        if self.max_list_limit == 0 {
            return Err(ConfigError::InvalidValue("max_list_limit must be greater than zero".to_owned()));
        }
        Ok(())
    }
}

/// Errors produced while validating a [`SchedulerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured field failed validation.
    #[error("invalid scheduler configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::SchedulerConfig;

    #[test]
    fn default_config_validates() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_reaper_timeout_is_rejected() {
        let config = SchedulerConfig { reaper_timeout_ms: 0, ..SchedulerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_list_limit_is_rejected() {
        let config = SchedulerConfig { max_list_limit: 0, ..SchedulerConfig::default() };
        assert!(config.validate().is_err());
    }
}
