// crates/stage-gate-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Scheduler Telemetry
// Description: Dependency-light counters and latency buckets for scheduler
// operations.
// Purpose: Let hosts wire their own metrics exporter without the core
// depending on one.
// Dependencies: std::sync::atomic
// ============================================================================

//! ## Overview
//! This module intentionally depends on nothing beyond `std`. It defines the
//! closed set of operations and outcomes a host may want to label metrics
//! with, fixed latency buckets suitable for a histogram, and a small
//! in-process counter table hosts may poll or ignore entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Operations and Outcomes
// ============================================================================

/// A scheduler or attribution engine operation, for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchedulerOperation {
    /// `create_pipeline`.
    CreatePipeline,
    /// `start_pipeline`.
    StartPipeline,
    /// `ready_set`.
    ReadySet,
    /// `claim_stage`.
    ClaimStage,
    /// `start_stage`.
    StartStage,
    /// `complete_stage`.
    CompleteStage,
    /// `fail_stage`.
    FailStage,
    /// `get_pipeline`.
    GetPipeline,
    /// `list_pipelines`.
    ListPipelines,
    /// `reap_stalled`.
    ReapStalled,
}

impl SchedulerOperation {
    /// All operations, in declaration order; used to size counter tables.
    pub const ALL: [Self; 10] = [
        Self::CreatePipeline,
        Self::StartPipeline,
        Self::ReadySet,
        Self::ClaimStage,
        Self::StartStage,
        Self::CompleteStage,
        Self::FailStage,
        Self::GetPipeline,
        Self::ListPipelines,
        Self::ReapStalled,
    ];

    /// Returns the stable label for this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatePipeline => "create_pipeline",
            Self::StartPipeline => "start_pipeline",
            Self::ReadySet => "ready_set",
            Self::ClaimStage => "claim_stage",
            Self::StartStage => "start_stage",
            Self::CompleteStage => "complete_stage",
            Self::FailStage => "fail_stage",
            Self::GetPipeline => "get_pipeline",
            Self::ListPipelines => "list_pipelines",
            Self::ReapStalled => "reap_stalled",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::CreatePipeline => 0,
            Self::StartPipeline => 1,
            Self::ReadySet => 2,
            Self::ClaimStage => 3,
            Self::StartStage => 4,
            Self::CompleteStage => 5,
            Self::FailStage => 6,
            Self::GetPipeline => 7,
            Self::ListPipelines => 8,
            Self::ReapStalled => 9,
        }
    }
}

/// The outcome of a scheduler operation, for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// The operation returned a success value.
    Success,
    /// The operation returned a typed error.
    Error,
}

impl SchedulerOutcome {
    /// Returns the stable label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Latency histogram bucket upper bounds, in milliseconds.
pub const LATENCY_BUCKETS_MS: [f64; 8] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0];

// ============================================================================
// SECTION: Counters
// ============================================================================

/// A fixed table of atomic counters, one slot per [`SchedulerOperation`],
/// split by outcome.
pub struct OperationCounters {
    success: [AtomicU64; SchedulerOperation::ALL.len()],
    error: [AtomicU64; SchedulerOperation::ALL.len()],
}

impl OperationCounters {
    /// Builds a fresh, zeroed counter table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            success: std::array::from_fn(|_| AtomicU64::new(0)),
            error: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records one occurrence of `operation` with the given `outcome`.
    pub fn record(&self, operation: SchedulerOperation, outcome: SchedulerOutcome) {
        let table = match outcome {
            SchedulerOutcome::Success => &self.success,
            SchedulerOutcome::Error => &self.error,
        };
        table[operation.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current count for `operation` and `outcome`.
    #[must_use]
    pub fn count(&self, operation: SchedulerOperation, outcome: SchedulerOutcome) -> u64 {
        let table = match outcome {
            SchedulerOutcome::Success => &self.success,
            SchedulerOutcome::Error => &self.error,
        };
        table[operation.index()].load(Ordering::Relaxed)
    }
}

impl Default for OperationCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::OperationCounters;
    use super::SchedulerOperation;
    use super::SchedulerOutcome;

    #[test]
    fn records_and_reads_back_counts() {
        let counters = OperationCounters::new();
        counters.record(SchedulerOperation::ClaimStage, SchedulerOutcome::Success);
        counters.record(SchedulerOperation::ClaimStage, SchedulerOutcome::Error);
        counters.record(SchedulerOperation::ClaimStage, SchedulerOutcome::Error);
        assert_eq!(counters.count(SchedulerOperation::ClaimStage, SchedulerOutcome::Success), 1);
        assert_eq!(counters.count(SchedulerOperation::ClaimStage, SchedulerOutcome::Error), 2);
        assert_eq!(counters.count(SchedulerOperation::StartStage, SchedulerOutcome::Success), 0);
    }
}
