//! Consumer-side contract for fetching a job's produced outputs.

use std::path::PathBuf;

use async_trait::async_trait;
use atelier_core::{JobId, PartName};
use thiserror::Error;

use crate::snapshot::JobSnapshot;

/// One produced output of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub job_id: JobId,
    pub part: PartName,
    /// Position within the part, from 0.
    pub index: usize,
    pub url: String,
}

/// Every artifact the snapshot lists, in part-name order then production order.
///
/// Locations beyond a part's `requested` count are ignored.
pub fn produced_artifacts(snapshot: &JobSnapshot) -> Vec<ArtifactRef> {
    snapshot
        .parts()
        .iter()
        .flat_map(|(part, spec)| {
            spec.artifacts
                .iter()
                .take(spec.requested as usize)
                .enumerate()
                .map(move |(index, url)| ArtifactRef {
                    job_id: snapshot.job_id(),
                    part: part.clone(),
                    index,
                    url: url.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a bulk download. One failed artifact never aborts the rest.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(ArtifactRef, ArtifactError)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Stores the artifacts of a snapshot somewhere.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Errors here are setup failures (e.g. the destination cannot be
    /// created); per-artifact failures land in the report.
    async fn download_all(&self, snapshot: &JobSnapshot) -> Result<DownloadReport, ArtifactError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PartSpec;

    #[test]
    fn lists_artifacts_in_part_order() {
        let snapshot = JobSnapshot::builder(JobId::new())
            .part("front", PartSpec::new(2).with_artifacts(["f0.png", "f1.png"]))
            .part("back", PartSpec::new(1).with_artifacts(["b0.png"]))
            .build()
            .unwrap();

        let refs = produced_artifacts(&snapshot);
        let listed: Vec<(&str, usize, &str)> = refs
            .iter()
            .map(|r| (r.part.as_str(), r.index, r.url.as_str()))
            .collect();

        assert_eq!(
            listed,
            vec![("back", 0, "b0.png"), ("front", 0, "f0.png"), ("front", 1, "f1.png")]
        );
        assert!(refs.iter().all(|r| r.job_id == snapshot.job_id()));
    }

    #[test]
    fn ignores_artifacts_beyond_requested() {
        let snapshot = JobSnapshot::builder(JobId::new())
            .part("front", PartSpec::new(1).with_artifacts(["a.png", "b.png"]))
            .build()
            .unwrap();

        assert_eq!(produced_artifacts(&snapshot).len(), 1);
    }

    #[test]
    fn empty_snapshot_has_no_artifacts() {
        let snapshot = JobSnapshot::builder(JobId::new())
            .part("back", PartSpec::new(0))
            .build()
            .unwrap();
        assert!(produced_artifacts(&snapshot).is_empty());
        assert!(DownloadReport::default().is_complete());
    }
}
