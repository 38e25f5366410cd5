//! High-level runner API for ingesting files.
//!
//! Wires the store, the optional sink, file readers and progress display
//! together. This is the entry point used by the CLI.

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::PREVIEW_ROWS;
use crate::formats::{DelimitedConfig, Format, RowRecord};
use crate::ingest::{IngestJob, IngestReport, NewJob, Orchestrator};
use crate::io::{ByteReader, LocalFileByteReader, estimate_rows_in_range};
use crate::sink::{HttpTransport, SinkConfig, SinkTransport};
use crate::store::{JobStore, RowStore, SqliteStore};
use crate::telemetry::{ProgressStats, TelemetryEvent};

/// Arguments for ingesting one or more files
#[derive(Clone)]
pub struct IngestArgs {
    pub files: Vec<PathBuf>,
    /// Owner recorded on every job, typically an e-mail address
    pub owner: String,
    /// Job name; defaults to the file stem
    pub name: Option<String>,
    /// Forces the format of every file; otherwise taken from the extension
    pub format: Option<Format>,
    /// Custom delimiter and quote; overrides `format`
    pub dialect: Option<DelimitedConfig>,
    pub database_url: String,
    /// Replicate to the sink when set and enabled
    pub sink: Option<SinkConfig>,
    pub quiet: bool,

    // Test-only: replace the HTTP transport of the sink
    #[cfg(test)]
    pub test_transport: Option<Arc<dyn SinkTransport>>,
}

/// Result of one file
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub job_id: String,
    /// The ingest error message when the job failed
    pub result: std::result::Result<IngestReport, String>,
}

/// Result of a whole ingest run
#[derive(Debug)]
pub struct RunSummary {
    pub files: Vec<FileOutcome>,
    pub stats: ProgressStats,
    pub duration: Duration,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_err()).count()
    }
}

/// Ingest every file of `args` as its own job, concurrently.
///
/// A failing file does not stop the others; its error is recorded in the
/// returned summary and on its job.
pub async fn run_ingest(args: IngestArgs) -> Result<RunSummary> {
    let start_time = Instant::now();

    let store = Arc::new(
        SqliteStore::connect(&args.database_url)
            .await
            .with_context(|| format!("Failed to open store at {}", args.database_url))?,
    );

    let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel::<TelemetryEvent>();
    let mut orchestrator = Orchestrator::new(store.clone()).with_telemetry(telemetry_tx);

    if let Some(config) = args.sink.clone() {
        #[cfg(test)]
        let transport: Arc<dyn SinkTransport> = match args.test_transport.clone() {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        #[cfg(not(test))]
        let transport: Arc<dyn SinkTransport> = Arc::new(HttpTransport::new()?);

        orchestrator = orchestrator.with_sink(config, transport);
    }
    let orchestrator = Arc::new(orchestrator);

    // Every job exists before any of them runs
    let mut jobs = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let job = store
            .create_job(NewJob {
                owner: args.owner.clone(),
                name: Some(job_name(args.name.as_deref(), path, args.files.len())),
            })
            .await
            .with_context(|| format!("Failed to create ingest job for {}", path.display()))?;
        jobs.push((path.clone(), job));
    }

    let estimated_rows = estimate_total_rows(&args.files).await;
    let progress = setup_progress_tracking(args.quiet, estimated_rows, telemetry_rx);

    let mut handles = Vec::with_capacity(jobs.len());
    for (path, job) in jobs {
        let dialect = args.dialect.clone().unwrap_or_else(|| {
            args.format
                .unwrap_or_else(|| Format::from_path(&path.to_string_lossy()))
                .config()
        });
        let orchestrator = orchestrator.clone();

        handles.push(tokio::spawn(async move {
            let reader = LocalFileByteReader::new(&path);
            let result = orchestrator
                .run(&job.id, &reader, dialect)
                .await
                .map_err(|e| e.to_string());
            FileOutcome {
                path,
                job_id: job.id,
                result,
            }
        }));
    }
    // The telemetry sender lives in the orchestrator; progress ends with the last job
    drop(orchestrator);

    let mut files = Vec::with_capacity(handles.len());
    for (i, result) in futures::future::join_all(handles).await.into_iter().enumerate() {
        match result {
            Ok(outcome) => files.push(outcome),
            Err(e) => warn!("Job task {} panicked: {:#}", i, e),
        }
    }

    let stats = progress.await.unwrap_or_default();

    Ok(RunSummary {
        files,
        stats,
        duration: start_time.elapsed(),
    })
}

/// A job and its first stored rows
#[derive(Debug)]
pub struct JobPreview {
    pub job: IngestJob,
    pub row_count: u64,
    pub rows: Vec<RowRecord>,
}

/// Load a job and up to `PREVIEW_ROWS` of its rows
pub async fn show_job(database_url: &str, job_id: &str) -> Result<JobPreview> {
    let store = SqliteStore::connect(database_url)
        .await
        .with_context(|| format!("Failed to open store at {}", database_url))?;
    let job = store
        .get_job(job_id)
        .await
        .with_context(|| format!("Failed to load job {}", job_id))?;
    let row_count = store.count(job_id).await?;
    let rows = store.page(job_id, PREVIEW_ROWS, 0).await?;

    Ok(JobPreview {
        job,
        row_count,
        rows,
    })
}

fn job_name(name: Option<&str>, path: &Path, file_count: usize) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name {
        Some(name) if file_count > 1 => format!("{} {}", name, stem),
        Some(name) => name.to_string(),
        None => stem,
    }
}

/// Rough total row count across `files`, used only to size the progress bar
async fn estimate_total_rows(files: &[PathBuf]) -> u64 {
    let mut total = 0;
    for path in files {
        let reader = LocalFileByteReader::new(path);
        let Ok(size) = reader.size().await else {
            continue;
        };
        if let Ok(Some(rows)) = estimate_rows_in_range(&reader, 0, size).await {
            total += rows;
        }
    }
    total
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Aggregate telemetry into stats, drawing progress bars unless `quiet`
fn setup_progress_tracking(
    quiet: bool,
    estimated_rows: u64,
    mut telemetry_rx: mpsc::UnboundedReceiver<TelemetryEvent>,
) -> tokio::task::JoinHandle<ProgressStats> {
    let bars = if quiet {
        None
    } else {
        let multi_progress = MultiProgress::new();

        let rows_bar = multi_progress.add(ProgressBar::new(estimated_rows));
        rows_bar.set_style(bar_style(
            "[{elapsed_precise}] Rows stored: [{bar:30.green/blue}] {human_pos}/~{human_len} | {per_sec}",
        ));

        let push_bar = multi_progress.add(ProgressBar::new(0));
        push_bar.set_style(bar_style("[{elapsed_precise}] Sink:        {msg}"));

        Some((rows_bar, push_bar))
    };

    tokio::spawn(async move {
        let mut stats = ProgressStats::new();

        while let Some(event) = telemetry_rx.recv().await {
            stats.update(&event);

            if let Some((rows_bar, push_bar)) = &bars {
                if stats.rows_stored > rows_bar.length().unwrap_or(0) {
                    rows_bar.set_length(stats.rows_stored);
                }
                rows_bar.set_position(stats.rows_stored);

                if let (Some(p50), Some(p99)) = (stats.percentile(50.0), stats.percentile(99.0)) {
                    push_bar.set_message(format!(
                        "{} batches, {} rows | p50: {}ms, p99: {}ms",
                        stats.batches_pushed(),
                        stats.rows_pushed,
                        p50,
                        p99
                    ));
                }
            }
        }

        if let Some((rows_bar, push_bar)) = bars {
            rows_bar.set_length(stats.rows_stored);
            rows_bar.finish();
            push_bar.finish();
        }

        stats
    })
}
