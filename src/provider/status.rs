//! Provider status vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::model::JobStatus;

/// Status values reported by the parsing provider.
///
/// Anything outside the known vocabulary lands in `Unknown` and is treated as
/// an error by the pipeline: a response we do not understand cannot be polled
/// safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Started,
    InProgress,
    Completed,
    Error,
    Unknown(String),
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "STARTED" => Self::Started,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "ERROR" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl FromStr for ProviderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("STARTED"),
            Self::InProgress => f.write_str("IN_PROGRESS"),
            Self::Completed => f.write_str("COMPLETED"),
            Self::Error => f.write_str("ERROR"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for ProviderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl From<ProviderStatus> for JobStatus {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Started | ProviderStatus::InProgress => JobStatus::Pending,
            ProviderStatus::Completed => JobStatus::Done,
            ProviderStatus::Error => JobStatus::Error,
            ProviderStatus::Unknown(raw) => {
                debug!(status = %raw, "Unknown provider status mapped to error");
                JobStatus::Error
            }
        }
    }
}
