//! Names of the independently countable pieces of a job's output.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Name of one part of a job ("front", "back", "model", ...).
///
/// Always non-empty, trimmed and lowercase, so "Front " and "front" name the
/// same part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartName(String);

impl PartName {
    pub const FRONT: &'static str = "front";
    pub const BACK: &'static str = "back";
    pub const MODEL: &'static str = "model";

    pub fn new(name: impl AsRef<str>) -> DomainResult<Self> {
        let normalized = name.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("part name must not be empty"));
        }
        if normalized.chars().any(|c| c.is_control() || c == '/') {
            return Err(DomainError::validation(format!(
                "part name contains forbidden characters: {normalized:?}"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn front() -> Self {
        Self(Self::FRONT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PartName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PartName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartName> for String {
    fn from(value: PartName) -> Self {
        value.0
    }
}
