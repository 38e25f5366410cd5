//! SQLite-backed store for jobs and rows
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::{JobStore, RowId, RowStore};
use crate::config::{STORE_BUSY_TIMEOUT, STORE_MAX_CONNECTIONS};
use crate::error::StoreError;
use crate::formats::RowRecord;
use crate::ingest::job::{AnalysisStatus, IngestJob, JobStatus, NewJob, SinkBinding};
use crate::schema::DetectedSchema;

const MIGRATIONS: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS ingest_jobs (
        id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        name TEXT,
        status TEXT NOT NULL,
        analysis_status TEXT NOT NULL,
        schema TEXT,
        dataset_id TEXT,
        table_name TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS data_rows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL REFERENCES ingest_jobs(id) ON DELETE CASCADE,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_data_rows_job ON data_rows(job_id, id)",
];

/// Job and row store over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(STORE_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(STORE_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. Every connection to `sqlite::memory:` is a
    /// fresh database, so the pool holds exactly one that never expires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Store schema ready");
        Ok(())
    }

    /// Map an UPDATE that touched nothing to `JobNotFound`
    fn ensure_updated(job_id: &str, rows_affected: u64) -> Result<(), StoreError> {
        if rows_affected == 0 {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn job_exists(&self, job_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM ingest_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{value}': {e}")))
}

fn job_from_row(row: &SqliteRow) -> Result<IngestJob, StoreError> {
    let status: String = row.try_get("status")?;
    let analysis_status: String = row.try_get("analysis_status")?;
    let schema: Option<String> = row.try_get("schema")?;
    let dataset_id: Option<String> = row.try_get("dataset_id")?;
    let table_name: Option<String> = row.try_get("table_name")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let schema = schema
        .map(|json| serde_json::from_str::<DetectedSchema>(&json))
        .transpose()?;
    let sink_binding = match (dataset_id, table_name) {
        (Some(dataset_id), Some(table_name)) => Some(SinkBinding {
            dataset_id,
            table_name,
        }),
        _ => None,
    };

    Ok(IngestJob {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        name: row.try_get("name")?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        analysis_status: analysis_status.parse().map_err(StoreError::Corrupt)?,
        schema,
        sink_binding,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create_job(&self, job: NewJob) -> Result<IngestJob, StoreError> {
        let id = Uuid::new_v4().to_string();
        let ts = now();

        sqlx::query(
            "INSERT INTO ingest_jobs (id, owner, name, status, analysis_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&job.owner)
        .bind(&job.name)
        .bind(JobStatus::Pending.as_str())
        .bind(AnalysisStatus::NotStarted.as_str())
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await?;

        self.get_job(&id).await
    }

    async fn get_job(&self, job_id: &str) -> Result<IngestJob, StoreError> {
        let row = sqlx::query("SELECT * FROM ingest_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        job_from_row(&row)
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE ingest_jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(job_id, result.rows_affected())
    }

    async fn set_schema(&self, job_id: &str, schema: &DetectedSchema) -> Result<(), StoreError> {
        let json = serde_json::to_string(schema)?;
        let result = sqlx::query(
            "UPDATE ingest_jobs SET schema = ?, updated_at = ? WHERE id = ? AND schema IS NULL",
        )
        .bind(json)
        .bind(now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.job_exists(job_id).await? {
                return Err(StoreError::SchemaAlreadyRecorded(job_id.to_string()));
            }
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn set_sink_binding(
        &self,
        job_id: &str,
        binding: &SinkBinding,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE ingest_jobs SET dataset_id = ?, table_name = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&binding.dataset_id)
        .bind(&binding.table_name)
        .bind(now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Self::ensure_updated(job_id, result.rows_affected())
    }

    async fn set_analysis_status(
        &self,
        job_id: &str,
        status: AnalysisStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE ingest_jobs SET analysis_status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(now())
                .bind(job_id)
                .execute(&self.pool)
                .await?;
        Self::ensure_updated(job_id, result.rows_affected())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM ingest_jobs WHERE id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Self::ensure_updated(job_id, result.rows_affected())
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn append(&self, job_id: &str, row: &RowRecord) -> Result<RowId, StoreError> {
        let data = serde_json::to_string(row)?;
        let result =
            sqlx::query("INSERT INTO data_rows (job_id, data, created_at) VALUES (?, ?, ?)")
                .bind(job_id)
                .bind(data)
                .bind(now())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    async fn append_all(&self, job_id: &str, rows: &[RowRecord]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let ts = now();
        for row in rows {
            let data = serde_json::to_string(row)?;
            sqlx::query("INSERT INTO data_rows (job_id, data, created_at) VALUES (?, ?, ?)")
                .bind(job_id)
                .bind(data)
                .bind(&ts)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn count(&self, job_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_rows WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn page(
        &self,
        job_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<RowRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM data_rows WHERE job_id = ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(job_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<RowRecord, StoreError> {
                let data: String = row.try_get("data")?;
                Ok(serde_json::from_str(&data)?)
            })
            .collect()
    }
}
