// crates/stage-gate-core/src/core/registry.rs
// ============================================================================
// Module: Stage Registry
// Description: Immutable stage order and attribution weight table.
// Purpose: Centralize the fixed seven-stage pipeline shape shared by the
// scheduler and the attribution engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The stage registry is a read-only constant table: the ordered list of
//! seven stage names and the weight each carries for attribution. Order and
//! weights must never change during a pipeline's lifetime; upgrading them
//! requires a data migration, not a runtime reconfiguration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Stage Names
// ============================================================================

/// One of the seven fixed stages in a pipeline run.
///
/// # Invariants
/// - Variants are stable for serialization and wire compatibility.
/// - The set of variants and their relative order never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageName {
    /// Topic research: facts, sources, hooks, target audience.
    Research,
    /// Script authoring from research output.
    Script,
    /// Voice narration synthesis from the script.
    Voice,
    /// Background music selection.
    Music,
    /// Visual clip and overlay sourcing.
    Visual,
    /// Video assembly from voice, music, and visual outputs.
    Editor,
    /// Social/platform publishing of the assembled video.
    Publish,
}

impl StageName {
    /// The seven stages in fixed pipeline order.
    pub const ORDER: [Self; 7] =
        [Self::Research, Self::Script, Self::Voice, Self::Music, Self::Visual, Self::Editor, Self::Publish];

    /// Returns the stable wire token for this stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Research => "RESEARCH",
            Self::Script => "SCRIPT",
            Self::Voice => "VOICE",
            Self::Music => "MUSIC",
            Self::Visual => "VISUAL",
            Self::Editor => "EDITOR",
            Self::Publish => "PUBLISH",
        }
    }

    /// Parses a stage name from its stable wire token.
    #[must_use]
    pub fn from_str_token(token: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|stage| stage.as_str() == token)
    }

    /// Returns this stage's zero-based position in [`StageName::ORDER`].
    #[must_use]
    pub const fn position(self) -> usize {
        match self {
            Self::Research => 0,
            Self::Script => 1,
            Self::Voice => 2,
            Self::Music => 3,
            Self::Visual => 4,
            Self::Editor => 5,
            Self::Publish => 6,
        }
    }

    /// Returns the attribution weight (a whole percent) for this stage.
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::Research => 10,
            Self::Script => 25,
            Self::Voice => 20,
            Self::Music => 10,
            Self::Visual => 15,
            Self::Editor => 15,
            Self::Publish => 5,
        }
    }

    /// Returns the next stage in fixed order, or `None` when this is the
    /// terminal stage.
    #[must_use]
    pub fn next_stage(self) -> Option<Self> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    /// Returns the predecessor stage in fixed order, or `None` when this is
    /// the first stage.
    #[must_use]
    pub fn predecessor(self) -> Option<Self> {
        self.position().checked_sub(1).map(|index| Self::ORDER[index])
    }

    /// Returns true when this is the first stage in fixed order.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.predecessor().is_none()
    }

    /// Returns true when this is the terminal stage in fixed order.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.next_stage().is_none()
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sum of all stage weights in the registry; must equal 100.
#[must_use]
pub fn total_weight() -> u32 {
    StageName::ORDER.iter().map(|stage| u32::from(stage.weight())).sum()
}

#[cfg(test)]
mod tests {
    use super::StageName;
    use super::total_weight;

    #[test]
    fn weights_sum_to_one_hundred() {
        assert_eq!(total_weight(), 100);
    }

    #[test]
    fn order_round_trips_through_wire_tokens() {
        for stage in StageName::ORDER {
            assert_eq!(StageName::from_str_token(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn next_and_predecessor_are_inverses() {
        for stage in StageName::ORDER {
            if let Some(next) = stage.next_stage() {
                assert_eq!(next.predecessor(), Some(stage));
            }
        }
    }

    #[test]
    fn research_has_no_predecessor_and_publish_has_no_successor() {
        assert!(StageName::Research.is_first());
        assert!(StageName::Publish.is_terminal());
        assert_eq!(StageName::Research.predecessor(), None);
        assert_eq!(StageName::Publish.next_stage(), None);
    }
}
