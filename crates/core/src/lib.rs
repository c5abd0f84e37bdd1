//! `atelier-core`: shared identifiers and domain errors.
//!
//! Pure types only. Nothing here knows about polling, timers or HTTP.

pub mod error;
pub mod id;
pub mod part;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use part::PartName;
