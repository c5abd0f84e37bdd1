//! REST adapters for the atelier backend.
//!
//! [`ApiClient`] turns the generation and training endpoints into
//! [`SnapshotFetcher`](atelier_jobs::SnapshotFetcher)s that drive a
//! [`JobPoller`](atelier_jobs::JobPoller); [`DirectoryDownloader`] stores the
//! outputs once a job settles.

pub mod api;
pub mod config;
pub mod download;

pub use api::{
    ApiClient, GenerationResponse, JobResource, ResourceFetcher, TrainingResponse, TrainingStatus,
};
pub use config::{ClientConfig, ConfigError};
pub use download::DirectoryDownloader;
