use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::config::{DEFAULT_SAMPLE_SIZE, SINK_BATCH_SIZE, SINK_TABLE_NAME};
use crate::error::{IngestError, StoreError};
use crate::formats::{DelimitedConfig, RowRecord, TabularFile};
use crate::ingest::job::{IngestJob, JobStatus, SinkBinding};
use crate::io::ByteReader;
use crate::schema::{self, DetectedSchema};
use crate::sink::{SinkClient, SinkConfig, SinkTransport};
use crate::store::{IngestStore, JobStore, RowStore};
use crate::telemetry::TelemetryEvent;

/// What happened to the optional sink replication of a job
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationOutcome {
    /// No sink is configured
    Disabled,
    Completed {
        dataset_id: String,
        batches: usize,
        rows: u64,
    },
    /// Replication stopped at the first error. Rows pushed before it stay in
    /// the sink.
    Failed {
        dataset_id: Option<String>,
        batches: usize,
        error: String,
    },
}

/// Result of a job that reached `done`
#[derive(Debug)]
pub struct IngestReport {
    pub job_id: String,
    pub rows_stored: u64,
    pub schema: DetectedSchema,
    pub replication: ReplicationOutcome,
    pub duration: Duration,
}

struct SinkSetup {
    config: SinkConfig,
    transport: Arc<dyn SinkTransport>,
}

/// Progress of a replication attempt, kept so a failure can report how far
/// it got
#[derive(Default)]
struct Replication {
    dataset_id: Option<String>,
    batches: usize,
    rows: u64,
}

/// Runs ingest jobs: parse, detect, store, then optionally replicate.
///
/// A job is run at most once: only `pending` jobs are picked up.
pub struct Orchestrator {
    store: Arc<dyn IngestStore>,
    sink: Option<SinkSetup>,
    telemetry: Option<UnboundedSender<TelemetryEvent>>,
    sample_size: usize,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn IngestStore>) -> Self {
        Self {
            store,
            sink: None,
            telemetry: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    /// Replicate finished jobs to the sink. Ignored unless `config` carries
    /// credentials.
    pub fn with_sink(mut self, config: SinkConfig, transport: Arc<dyn SinkTransport>) -> Self {
        if config.is_enabled() {
            self.sink = Some(SinkSetup { config, transport });
        } else {
            info!("Sink credentials not configured, replication disabled");
        }
        self
    }

    pub fn with_telemetry(mut self, telemetry: UnboundedSender<TelemetryEvent>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn replication_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Run a pending job against `source`.
    ///
    /// A job in any other status is refused untouched. Any error before
    /// `done` is recorded as `failed` on the job and then returned. Sink errors are logged and reported in
    /// [`IngestReport::replication`], never returned.
    pub async fn run(
        &self,
        job_id: &str,
        source: &dyn ByteReader,
        format: DelimitedConfig,
    ) -> Result<IngestReport, IngestError> {
        let start_time = Instant::now();

        let job = self.store.get_job(job_id).await.map_err(|e| match e {
            StoreError::JobNotFound(id) => IngestError::JobNotFound(id),
            other => IngestError::Store(other),
        })?;
        if job.status != JobStatus::Pending {
            warn!(job_id, status = %job.status, "Refusing to run job that is not pending");
            return Err(IngestError::NotPending {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        info!(job_id, name = %job.display_name(), "Starting ingest job");
        self.emit(TelemetryEvent::JobStarted {
            job_id: job_id.to_string(),
        });

        let (rows_stored, schema) = match self.ingest(job_id, source, format).await {
            Ok(result) => result,
            Err(e) => {
                self.mark_failed(job_id, &e).await;
                return Err(e);
            }
        };

        let replication = match &self.sink {
            Some(setup) => self.replicate(&job, &schema, setup).await,
            None => ReplicationOutcome::Disabled,
        };

        Ok(IngestReport {
            job_id: job_id.to_string(),
            rows_stored,
            schema,
            replication,
            duration: start_time.elapsed(),
        })
    }

    /// Everything up to and including `done`
    async fn ingest(
        &self,
        job_id: &str,
        source: &dyn ByteReader,
        format: DelimitedConfig,
    ) -> Result<(u64, DetectedSchema), IngestError> {
        self.store.set_status(job_id, JobStatus::Processing).await?;

        let data = source
            .read_all()
            .await
            .map_err(|e| IngestError::Source(format!("{e:#}")))?;
        let file = TabularFile::parse(data, format)?;
        let mut rows = file.rows();

        let sample = rows
            .by_ref()
            .take(self.sample_size)
            .collect::<Result<Vec<RowRecord>, _>>()?;
        let schema = schema::detect(&sample, file.headers(), self.sample_size);
        self.store.set_schema(job_id, &schema).await?;
        info!(job_id, columns = schema.len(), "Detected schema");

        let mut stored = self.store_rows(job_id, &sample).await?;
        let mut pending = Vec::with_capacity(SINK_BATCH_SIZE);
        for row in rows {
            pending.push(row?);
            if pending.len() == SINK_BATCH_SIZE {
                stored += self.store_rows(job_id, &pending).await?;
                pending.clear();
            }
        }
        stored += self.store_rows(job_id, &pending).await?;

        self.store.set_status(job_id, JobStatus::Done).await?;
        info!(job_id, rows = stored, "Ingest job done");
        self.emit(TelemetryEvent::JobFinished {
            job_id: job_id.to_string(),
            status: JobStatus::Done,
        });

        Ok((stored, schema))
    }

    async fn store_rows(&self, job_id: &str, rows: &[RowRecord]) -> Result<u64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let stored = self.store.append_all(job_id, rows).await?;
        self.emit(TelemetryEvent::RowsStored {
            job_id: job_id.to_string(),
            rows: stored,
        });
        Ok(stored)
    }

    async fn mark_failed(&self, job_id: &str, cause: &IngestError) {
        error!(job_id, error = %cause, "Ingest job failed");
        if let Err(e) = self.store.set_status(job_id, JobStatus::Failed).await {
            warn!(job_id, error = %e, "Could not record failed status");
        }
        self.emit(TelemetryEvent::JobFinished {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
        });
    }

    async fn replicate(
        &self,
        job: &IngestJob,
        schema: &DetectedSchema,
        setup: &SinkSetup,
    ) -> ReplicationOutcome {
        let client = SinkClient::new(setup.config.clone(), setup.transport.clone());
        let mut progress = Replication::default();

        match self.push_job(job, schema, &client, &mut progress).await {
            Ok(()) => ReplicationOutcome::Completed {
                dataset_id: progress.dataset_id.unwrap_or_default(),
                batches: progress.batches,
                rows: progress.rows,
            },
            Err(e) => {
                error!(
                    job_id = %job.id,
                    dataset_id = progress.dataset_id.as_deref().unwrap_or("-"),
                    batches = progress.batches,
                    "Sink replication failed: {:#}",
                    e
                );
                ReplicationOutcome::Failed {
                    dataset_id: progress.dataset_id,
                    batches: progress.batches,
                    error: format!("{e:#}"),
                }
            }
        }
    }

    /// Create the remote dataset, bind it, and push every stored row in
    /// storage order. Stops at the first failing batch.
    async fn push_job(
        &self,
        job: &IngestJob,
        schema: &DetectedSchema,
        client: &SinkClient,
        progress: &mut Replication,
    ) -> anyhow::Result<()> {
        let dataset_name = job.sink_dataset_name();
        let dataset_id = client
            .create_push_dataset(&dataset_name, SINK_TABLE_NAME, schema)
            .await
            .with_context(|| format!("Failed to create sink dataset '{}'", dataset_name))?;
        progress.dataset_id = Some(dataset_id.clone());

        let binding = SinkBinding {
            dataset_id: dataset_id.clone(),
            table_name: SINK_TABLE_NAME.to_string(),
        };
        self.store
            .set_sink_binding(&job.id, &binding)
            .await
            .context("Failed to record sink binding")?;

        let mut offset = 0u64;
        loop {
            let batch = self
                .store
                .page(&job.id, SINK_BATCH_SIZE as u64, offset)
                .await
                .context("Failed to read stored rows")?;
            if batch.is_empty() {
                break;
            }

            let batch_start = Instant::now();
            client
                .push_rows(&dataset_id, SINK_TABLE_NAME, &batch)
                .await
                .with_context(|| {
                    format!(
                        "Failed to push batch {} (rows {}..{})",
                        progress.batches + 1,
                        offset,
                        offset + batch.len() as u64
                    )
                })?;

            let rows = batch.len() as u64;
            progress.batches += 1;
            progress.rows += rows;
            offset += rows;
            self.emit(TelemetryEvent::BatchPushed {
                job_id: job.id.clone(),
                rows,
                duration_ms: batch_start.elapsed().as_millis() as u64,
            });

            if batch.len() < SINK_BATCH_SIZE {
                break;
            }
        }

        info!(
            job_id = %job.id,
            dataset_id = %dataset_id,
            batches = progress.batches,
            rows = progress.rows,
            "Replicated job to sink"
        );
        Ok(())
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(tx) = &self.telemetry {
            let _ = tx.send(event);
        }
    }
}
