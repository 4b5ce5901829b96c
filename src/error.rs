//! Error types for the trip pipeline.

use crate::model::JobId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Email source error: {0}")]
    Source(#[from] SourceError),

    #[error("Job service error: {0}")]
    JobService(#[from] JobServiceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Trip error: {0}")]
    Trip(#[from] TripError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors reported by an email source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to fetch emails: {reason}")]
    FetchFailed { reason: String },
}

/// Errors reported by the asynchronous parsing job service.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("Request for job {job_id} failed: {reason}")]
    RequestFailed { job_id: JobId, reason: String },

    #[error("Invalid response from job service: {reason}")]
    InvalidResponse { reason: String },

    #[error("Cannot convert job result to trip: {0}")]
    Conversion(#[from] TripError),
}

/// Trip store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No trip with reference {reference}")]
    NotFound { reference: String },
}

/// Violations of the trip model invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TripError {
    #[error("Trip reference must not be empty")]
    MissingReference,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
