//! Immutable job snapshots.
//!
//! A [`JobSnapshot`] is one fetched view of a remote job. It is validated once,
//! when built from remote data, and never mutated afterwards: each poll
//! produces a new value.

use std::collections::BTreeMap;

use atelier_core::{DomainError, DomainResult, JobId, PartName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{JobState, derive_state};

/// One producible part of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartSpec {
    /// How many outputs were asked for.
    pub requested: u32,
    /// How many outputs exist so far. May exceed `requested` in malformed
    /// data; such a part counts as fully produced.
    pub produced: u32,
    /// Provider-side failure reported for this part, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Locations of the produced outputs, in production order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

impl PartSpec {
    pub fn new(requested: u32) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    pub fn with_produced(mut self, produced: u32) -> Self {
        self.produced = produced;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach artifact locations; `produced` follows the artifact count.
    pub fn with_artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = artifacts.into_iter().map(Into::into).collect();
        self.produced = u32::try_from(self.artifacts.len()).unwrap_or(u32::MAX);
        self
    }

    pub fn is_requested(&self) -> bool {
        self.requested > 0
    }

    pub fn is_fully_produced(&self) -> bool {
        !self.is_requested() || self.produced >= self.requested
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Requested, but nothing produced yet.
    pub fn is_pending(&self) -> bool {
        self.is_requested() && self.produced == 0
    }

    /// Produced count clamped to the requested count.
    pub fn effective_produced(&self) -> u32 {
        self.produced.min(self.requested)
    }
}

/// Immutable view of a job at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    job_id: JobId,
    parts: BTreeMap<PartName, PartSpec>,
    fetched_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn builder(job_id: JobId) -> JobSnapshotBuilder {
        JobSnapshotBuilder {
            job_id,
            parts: Vec::new(),
            fetched_at: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn parts(&self) -> &BTreeMap<PartName, PartSpec> {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&PartSpec> {
        let name = PartName::new(name).ok()?;
        self.parts.get(&name)
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Composite state derived from this snapshot.
    pub fn state(&self) -> JobState {
        derive_state(self)
    }
}

/// Builds a [`JobSnapshot`], checking part names once at the boundary.
#[derive(Debug)]
pub struct JobSnapshotBuilder {
    job_id: JobId,
    parts: Vec<(String, PartSpec)>,
    fetched_at: Option<DateTime<Utc>>,
}

impl JobSnapshotBuilder {
    pub fn part(mut self, name: impl Into<String>, spec: PartSpec) -> Self {
        self.parts.push((name.into(), spec));
        self
    }

    /// Defaults to the build time when not set.
    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    pub fn build(self) -> DomainResult<JobSnapshot> {
        let mut parts = BTreeMap::new();
        for (raw, spec) in self.parts {
            let name = PartName::new(&raw)?;
            if parts.insert(name.clone(), spec).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate part {name:?} in snapshot of job {}",
                    self.job_id
                )));
            }
        }

        Ok(JobSnapshot {
            job_id: self.job_id,
            parts,
            fetched_at: self.fetched_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_normalizes_part_names() {
        let snapshot = JobSnapshot::builder(JobId::new())
            .part("Front", PartSpec::new(2))
            .build()
            .unwrap();

        assert!(snapshot.part("front").is_some());
        assert!(snapshot.part("FRONT").is_some());
        assert!(snapshot.part("back").is_none());
    }

    #[test]
    fn builder_rejects_duplicates_after_normalization() {
        let err = JobSnapshot::builder(JobId::new())
            .part("front", PartSpec::new(1))
            .part(" FRONT", PartSpec::new(2))
            .build()
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn builder_rejects_empty_part_name() {
        let err = JobSnapshot::builder(JobId::new())
            .part("", PartSpec::new(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn artifacts_drive_produced_count() {
        let spec = PartSpec::new(2).with_artifacts(["https://cdn/a.png"]);
        assert_eq!(spec.produced, 1);
        assert!(!spec.is_fully_produced());
        assert!(!spec.is_pending());
    }

    #[test]
    fn over_production_is_clamped() {
        let spec = PartSpec::new(1).with_produced(3);
        assert!(spec.is_fully_produced());
        assert_eq!(spec.effective_produced(), 1);
    }

    #[test]
    fn unrequested_part_is_fully_produced_and_not_pending() {
        let spec = PartSpec::new(0);
        assert!(spec.is_fully_produced());
        assert!(!spec.is_pending());
    }
}
