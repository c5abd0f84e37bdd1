//! Job tracking for remote multi-part generation jobs.
//!
//! - [`status`]: pure derivation of a job's lifecycle state and progress.
//! - [`snapshot`]: immutable, validated views of a remote job.
//! - [`fetch`]: the injected capability that produces snapshots.
//! - [`poller`]: one polling session per job, with subscription and disposal.
//! - [`artifacts`]: contract for consumers that store produced outputs.

pub mod artifacts;
pub mod fetch;
pub mod poller;
pub mod snapshot;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifacts::{ArtifactError, ArtifactRef, ArtifactSink, DownloadReport, produced_artifacts};
pub use fetch::{FetchError, SnapshotFetcher};
pub use poller::{
    DEFAULT_POLL_INTERVAL, JobPoller, ListenerHandle, PollEvent, PollerConfig, PollerError,
    SessionState, Subscription,
};
pub use snapshot::{JobSnapshot, JobSnapshotBuilder, PartSpec};
pub use status::{JobState, Progress, derive_state, progress};

pub use atelier_core::{JobId, PartName};
