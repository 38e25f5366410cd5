//! Durable storage for jobs and their rows
//!
//! The orchestrator depends only on the [`JobStore`] and [`RowStore`]
//! contracts. [`SqliteStore`] implements both on top of `sqlx`.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::formats::RowRecord;
use crate::ingest::job::{AnalysisStatus, IngestJob, JobStatus, NewJob, SinkBinding};
use crate::schema::DetectedSchema;

pub use sqlite::SqliteStore;

/// Identifier of a stored row
pub type RowId = i64;

/// Row persistence scoped to a job
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Persist one row for `job_id`
    async fn append(&self, job_id: &str, row: &RowRecord) -> Result<RowId, StoreError>;

    /// Persist `rows` in order, returning how many were written
    async fn append_all(&self, job_id: &str, rows: &[RowRecord]) -> Result<u64, StoreError> {
        for row in rows {
            self.append(job_id, row).await?;
        }
        Ok(rows.len() as u64)
    }

    async fn count(&self, job_id: &str) -> Result<u64, StoreError>;

    /// Rows of `job_id` in insertion order
    async fn page(
        &self,
        job_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<RowRecord>, StoreError>;
}

/// Job record persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in `pending` state
    async fn create_job(&self, job: NewJob) -> Result<IngestJob, StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<IngestJob, StoreError>;

    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), StoreError>;

    /// Record the detected schema. Fails if one is already recorded.
    async fn set_schema(&self, job_id: &str, schema: &DetectedSchema) -> Result<(), StoreError>;

    async fn set_sink_binding(
        &self,
        job_id: &str,
        binding: &SinkBinding,
    ) -> Result<(), StoreError>;

    async fn set_analysis_status(
        &self,
        job_id: &str,
        status: AnalysisStatus,
    ) -> Result<(), StoreError>;

    /// Delete a job and, by cascade, all of its rows
    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError>;
}

/// Everything the orchestrator needs from the store
pub trait IngestStore: JobStore + RowStore {}

impl<T: JobStore + RowStore> IngestStore for T {}
