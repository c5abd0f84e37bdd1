//! The injected fetch capability.
//!
//! The tracker is agnostic to transport, auth and serialization: anything
//! that can turn a job id into a [`JobSnapshot`] can drive a poller.

use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::{DomainError, JobId};
use thiserror::Error;

use crate::snapshot::JobSnapshot;

/// Transport-level failure of a single fetch.
///
/// Distinct from part-level errors, which are data inside a snapshot. Cloned
/// so the same failure can be signalled to every subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }
}

impl From<DomainError> for FetchError {
    fn from(value: DomainError) -> Self {
        Self::InvalidSnapshot(value.to_string())
    }
}

/// Fetches the current snapshot of one job.
///
/// Implementations own timeouts; the poller never cancels a fetch except by
/// dropping its future on disposal.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + 'static {
    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, FetchError>;
}

#[async_trait]
impl<F> SnapshotFetcher for Arc<F>
where
    F: SnapshotFetcher + ?Sized,
{
    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, FetchError> {
        (**self).fetch_snapshot(job_id).await
    }
}
