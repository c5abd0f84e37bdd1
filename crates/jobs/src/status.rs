//! Composite job status derivation.
//!
//! Pure functions over a [`JobSnapshot`]: no IO, no timers, same input gives
//! the same output.

use serde::{Deserialize, Serialize};

use crate::snapshot::JobSnapshot;

/// Composite state of a multi-part job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No errors yet, some requested part still incomplete.
    Processing,
    /// Every requested part fully produced, no errors.
    Completed,
    /// Errors reported and no erroring part produced anything.
    Failed,
    /// Errors reported, but at least one erroring part produced output.
    Partial,
}

impl JobState {
    /// Terminal states end automatic polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Partial => "partial",
        }
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive the composite state of a snapshot.
///
/// Evaluated top to bottom, first match wins:
///
/// 1. nothing requested at all → `Completed`
/// 2. some part errored and at least one erroring part produced output → `Partial`
/// 3. some part errored, no erroring part produced anything → `Failed`
/// 4. no errors and every requested part fully produced → `Completed`
/// 5. otherwise → `Processing`
///
/// Error and production are independent signals: a part may report an error
/// and still have produced some or all of its requested outputs.
pub fn derive_state(snapshot: &JobSnapshot) -> JobState {
    let parts = snapshot.parts();

    if !parts.values().any(|p| p.is_requested()) {
        return JobState::Completed;
    }

    let mut any_error = false;
    let mut erroring_part_produced = false;
    for part in parts.values().filter(|p| p.has_error()) {
        any_error = true;
        erroring_part_produced |= part.produced > 0;
    }

    if any_error {
        return if erroring_part_produced {
            JobState::Partial
        } else {
            JobState::Failed
        };
    }

    if parts.values().all(|p| p.is_fully_produced()) {
        JobState::Completed
    } else {
        JobState::Processing
    }
}

/// Aggregate production counts for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub produced: u64,
    pub requested: u64,
    /// In `[0, 1]`; `0` when nothing was requested.
    pub fraction: f64,
}

/// Sum produced/requested across all parts.
///
/// Over-produced parts are clamped to their requested count so the fraction
/// never exceeds 1.
pub fn progress(snapshot: &JobSnapshot) -> Progress {
    let (produced, requested) = snapshot
        .parts()
        .values()
        .fold((0u64, 0u64), |(produced, requested), p| {
            (
                produced + u64::from(p.effective_produced()),
                requested + u64::from(p.requested),
            )
        });

    let fraction = if requested == 0 {
        0.0
    } else {
        (produced as f64 / requested as f64).clamp(0.0, 1.0)
    };

    Progress {
        produced,
        requested,
        fraction,
    }
}
