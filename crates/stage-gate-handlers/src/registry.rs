// crates/stage-gate-handlers/src/registry.rs
// ============================================================================
// Module: Handler Registry Construction
// Description: Assembles a HandlerRegistry from the built-in stage handlers.
// Purpose: Give embedders a single call that wires up all seven stages.
// Dependencies: stage_gate_core
// ============================================================================

//! ## Overview
//! [`BuiltinHandlerConfigs`] bundles one configuration per stage.
//! [`with_builtin_handlers`] and [`register_builtin_handlers`] wire the
//! corresponding handler into a [`stage_gate_core::HandlerRegistry`] under
//! its stage name, mirroring how a provider registry wires up its built-in
//! evidence providers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use stage_gate_core::HandlerRegistry;
use stage_gate_core::StageName;

use crate::EditorHandler;
use crate::EditorHandlerConfig;
use crate::MusicHandler;
use crate::MusicHandlerConfig;
use crate::PublishHandler;
use crate::PublishHandlerConfig;
use crate::ResearchHandler;
use crate::ResearchHandlerConfig;
use crate::ScriptHandler;
use crate::ScriptHandlerConfig;
use crate::VisualHandler;
use crate::VisualHandlerConfig;
use crate::VoiceHandler;
use crate::VoiceHandlerConfig;

// ============================================================================
// SECTION: Built-in Config
// ============================================================================

/// Configuration bundle for the built-in stage handlers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuiltinHandlerConfigs {
    /// Configuration for the research handler.
    pub research: ResearchHandlerConfig,
    /// Configuration for the script handler.
    pub script: ScriptHandlerConfig,
    /// Configuration for the voice handler.
    pub voice: VoiceHandlerConfig,
    /// Configuration for the music handler.
    pub music: MusicHandlerConfig,
    /// Configuration for the visual handler.
    pub visual: VisualHandlerConfig,
    /// Configuration for the editor handler.
    pub editor: EditorHandlerConfig,
    /// Configuration for the publish handler.
    pub publish: PublishHandlerConfig,
}

// ============================================================================
// SECTION: Registry Construction
// ============================================================================

/// Builds a registry with every built-in handler registered under its
/// stage name, using an allow-all access policy.
#[must_use]
pub fn with_builtin_handlers(configs: BuiltinHandlerConfigs) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_builtin_handlers(&mut registry, configs);
    registry
}

/// Registers every built-in handler into `registry` under its stage name,
/// replacing any handler already registered for that stage.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry, configs: BuiltinHandlerConfigs) {
    registry.register(StageName::Research, Box::new(ResearchHandler::new(configs.research)));
    registry.register(StageName::Script, Box::new(ScriptHandler::new(configs.script)));
    registry.register(StageName::Voice, Box::new(VoiceHandler::new(configs.voice)));
    registry.register(StageName::Music, Box::new(MusicHandler::new(configs.music)));
    registry.register(StageName::Visual, Box::new(VisualHandler::new(configs.visual)));
    registry.register(StageName::Editor, Box::new(EditorHandler::new(configs.editor)));
    registry.register(StageName::Publish, Box::new(PublishHandler::new(configs.publish)));
}

#[cfg(test)]
mod tests {
    use super::BuiltinHandlerConfigs;
    use super::with_builtin_handlers;
    use stage_gate_core::StageName;

    #[test]
    fn builtin_registry_covers_every_stage() {
        let registry = with_builtin_handlers(BuiltinHandlerConfigs::default());
        for stage_name in StageName::ORDER {
            assert!(registry.contains(stage_name));
        }
    }
}
