// crates/stage-gate-core/src/runtime/attribution_engine.rs
// ============================================================================
// Module: Attribution Engine
// Description: Records per-stage attribution and distributes a total reward
// proportionally to registry weights.
// Purpose: Implement the two operations the spec assigns to the attribution
// engine, independent of any particular store backend.
// Dependencies: std::collections::BTreeMap, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`AttributionEngine::record`] is a thin, idempotent wrapper over
//! [`PipelineStore::append_attribution`] — in the normal flow this insert
//! already happens inside [`PipelineStore::complete_stage_transaction`], so
//! `record` exists for hosts recording attribution outside that path (e.g.
//! backfills). [`AttributionEngine::distribute`] is pure arithmetic and
//! touches no store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::attribution::Attribution;
use crate::core::identifiers::AgentId;
use crate::core::registry::StageName;
use crate::interfaces::PipelineStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Attribution Engine
// ============================================================================

/// The attribution engine: recording and distribution logic.
pub struct AttributionEngine;

impl AttributionEngine {
    /// Records an attribution, treating a uniqueness conflict on
    /// `(pipeline_id, stage_name)` as a no-op rather than an error.
    ///
    /// # Errors
    /// Propagates any [`StoreError`] other than [`StoreError::Conflict`].
    pub fn record<S: PipelineStore>(store: &S, attribution: Attribution) -> Result<(), StoreError> {
        match store.append_attribution(attribution) {
            Ok(()) | Err(StoreError::Conflict(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Computes each agent's integer share of `total`, proportional to the
    /// registry weight of the stage they are attributed for.
    ///
    /// For every attribution, `share = floor(total * weight_of(stage_name) /
    /// 100)`; shares are summed per agent. `u128` arithmetic is used
    /// throughout so that totals far beyond any realistic reward pool never
    /// overflow before the division.
    #[must_use]
    pub fn distribute(total: u128, attributions: &[(StageName, AgentId)]) -> BTreeMap<AgentId, u128> {
        let mut shares: BTreeMap<AgentId, u128> = BTreeMap::new();
        for (stage_name, agent_id) in attributions {
            let weight = u128::from(stage_name.weight());
            let share = total.saturating_mul(weight) / 100;
            shares.entry(agent_id.clone()).and_modify(|existing| *existing += share).or_insert(share);
        }
        shares
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::AttributionEngine;
    use crate::core::identifiers::AgentId;
    use crate::core::registry::StageName;

    #[test]
    fn distribute_splits_full_attribution_set_exactly() {
        let agent_one = AgentId::new("A1");
        let agent_two = AgentId::new("A2");
        let attributions = vec![
            (StageName::Research, agent_one.clone()),
            (StageName::Script, agent_one.clone()),
            (StageName::Voice, agent_one.clone()),
            (StageName::Music, agent_two.clone()),
            (StageName::Visual, agent_two.clone()),
            (StageName::Editor, agent_one.clone()),
            (StageName::Publish, agent_two.clone()),
        ];
        let shares = AttributionEngine::distribute(1_000_000, &attributions);
        assert_eq!(shares.get(&agent_one), Some(&700_000));
        assert_eq!(shares.get(&agent_two), Some(&300_000));
        let sum: u128 = shares.values().sum();
        assert_eq!(sum, 1_000_000);
    }

    #[test]
    fn distribute_with_bigint_scale_total_is_exact() {
        let agent = AgentId::new("X");
        let attributions: Vec<_> = StageName::ORDER.into_iter().map(|stage| (stage, agent.clone())).collect();
        let shares = AttributionEngine::distribute(1_000_000_000_000_000_000_000_000, &attributions);
        let mut expected = BTreeMap::new();
        expected.insert(agent, 1_000_000_000_000_000_000_000_000_u128);
        assert_eq!(shares, expected);
    }

    #[test]
    fn distribute_with_zero_total_yields_zero_shares() {
        let agent = AgentId::new("A1");
        let attributions = vec![(StageName::Research, agent.clone())];
        let shares = AttributionEngine::distribute(0, &attributions);
        assert_eq!(shares.get(&agent), Some(&0));
    }
}
