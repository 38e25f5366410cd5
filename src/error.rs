//! Error types for ingest, storage, and sink replication

use thiserror::Error;

use crate::ingest::JobStatus;

/// Errors raised while ingesting a file. Any of these except `JobNotFound`
/// and `NotPending` marks the job failed.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The file has no usable header row or is not valid delimited text
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The job to run does not exist
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Only pending jobs run; the job is left as it is
    #[error("job {job_id} is {status}, not pending")]
    NotPending { job_id: String, status: JobStatus },

    /// The source file could not be read
    #[error("failed to read source: {0}")]
    Source(String),

    /// A row or job write/read against the store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the durable store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The detected schema of a job is write-once
    #[error("schema already recorded for job {0}")]
    SchemaAlreadyRecorded(String),

    #[error("invalid stored value: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the sink replication client. Never fatal to an ingest job.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Credentials are missing or were rejected
    #[error("sink authentication failed: {0}")]
    Auth(String),

    /// The sink answered with a non-2xx status
    #[error("sink API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response
    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response without the fields we need
    #[error("unexpected sink response: {0}")]
    UnexpectedResponse(String),
}
