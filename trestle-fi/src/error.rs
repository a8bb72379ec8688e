//! Error types for the field-inspection core
//!
//! Tree and navigation problems are recovered locally and never reach this
//! enum; persistence, upload, and submission failures are surfaced to the
//! caller as typed variants while in-memory state stays intact.

use thiserror::Error;
use uuid::Uuid;

/// Convenience Result type for the field-inspection core
pub type Result<T> = std::result::Result<T, Error>;

/// One image that failed to upload during submission
#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub maintenance_id: Uuid,
    pub image_id: Uuid,
    pub reason: String,
}

/// Main error type for the field-inspection core
#[derive(Error, Debug)]
pub enum Error {
    /// Shared-library errors (database, IO, config, serialization)
    #[error(transparent)]
    Common(#[from] trestle_common::Error),

    /// Durable-store failure after recovery attempts; ratings continue
    /// in memory only
    #[error("Persistence degraded: {0}")]
    Persistence(String),

    /// Remote API request failure
    #[error("API error: {0}")]
    Api(String),

    /// One or more images failed to upload; each failure names the
    /// maintenance action it belongs to so the user can retry
    #[error("{} image upload(s) failed", failures.len())]
    Upload { failures: Vec<UploadFailure> },

    /// Remote submission failure; the local snapshot is preserved
    #[error("Submission failed: {0}")]
    Submission(String),

    /// A submission is already in flight
    #[error("A submission is already in progress")]
    SubmissionInFlight,
}
