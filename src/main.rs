use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabular_ingest::formats::{DelimitedConfig, Format};
use tabular_ingest::ingest::ReplicationOutcome;
use tabular_ingest::runner::{IngestArgs, RunSummary, run_ingest, show_job};
use tabular_ingest::sink::SinkConfig;

#[derive(Parser, Clone)]
#[command(version, about = "Ingest delimited files into a durable store")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Ingest one or more files, one job per file
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Owner recorded on the jobs (e-mail address)
        #[arg(short, long)]
        owner: String,

        /// Job name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        /// File format (csv, tsv) - auto-detected from extension if not specified
        #[arg(short, long)]
        format: Option<String>,

        /// Custom field delimiter, e.g. ";" or "\t"
        #[arg(long)]
        delimiter: Option<String>,

        /// Quote character used with --delimiter
        #[arg(long, default_value = "\"")]
        quote: String,

        /// SQLite database URL
        #[arg(short, long, env = "INGEST_DATABASE_URL", default_value = "sqlite://ingest.db")]
        database_url: String,

        /// Skip sink replication even if credentials are configured
        #[arg(long)]
        no_sink: bool,

        /// Quiet mode - minimal output, only show summary
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show a job and its first rows
    Show {
        job_id: String,

        /// SQLite database URL
        #[arg(short, long, env = "INGEST_DATABASE_URL", default_value = "sqlite://ingest.db")]
        database_url: String,
    },
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("tabular_ingest=warn,sqlx=off")
    } else {
        EnvFilter::new("tabular_ingest=info,sqlx=off")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Ingest {
            files,
            owner,
            name,
            format,
            delimiter,
            quote,
            database_url,
            no_sink,
            quiet,
        } => {
            init_tracing(quiet);

            let format = format.as_deref().map(Format::parse).transpose()?;
            let dialect = delimiter
                .as_deref()
                .map(|d| DelimitedConfig::from_strings(d, &quote))
                .transpose()?;
            let sink = if no_sink { None } else { SinkConfig::from_env() };

            if !quiet {
                println!("Tabular Ingest");
                println!("==============");
                println!("Files: {}", files.len());
                println!("Store: {}", database_url);
                if let Some(ref dialect) = dialect {
                    println!("Delimiter: {}", dialect.delimiter_as_string());
                }
                println!(
                    "Sink replication: {}",
                    if sink.is_some() { "enabled" } else { "disabled" }
                );
                println!();
            }

            let summary = run_ingest(IngestArgs {
                files,
                owner,
                name,
                format,
                dialect,
                database_url,
                sink,
                quiet,
            })
            .await?;

            print_summary(&summary);
            if summary.failed() > 0 {
                anyhow::bail!("{} of {} files failed", summary.failed(), summary.files.len());
            }
        }
        Command::Show {
            job_id,
            database_url,
        } => {
            init_tracing(true);
            let preview = show_job(&database_url, &job_id).await?;
            let job = &preview.job;

            println!("Job {}", job.id);
            println!("  Name: {}", job.display_name());
            println!("  Owner: {}", job.owner);
            println!("  Status: {}", job.status);
            println!("  Analysis: {}", job.analysis_status.as_str());
            println!("  Rows: {}", preview.row_count);
            if let Some(ref schema) = job.schema {
                println!("  Schema:");
                for (column, detected) in schema {
                    println!("    {}: {}", column, detected);
                }
            }
            if let Some(ref binding) = job.sink_binding {
                println!("  Sink: {} / {}", binding.dataset_id, binding.table_name);
            }
            if !preview.rows.is_empty() {
                println!();
                for row in &preview.rows {
                    println!("{}", serde_json::to_string(row)?);
                }
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Ingest Summary");
    println!("==============");
    for file in &summary.files {
        println!("{} (job {})", file.path.display(), file.job_id);
        match &file.result {
            Ok(report) => {
                println!(
                    "  done: {} rows, {} columns",
                    report.rows_stored,
                    report.schema.len()
                );
                match &report.replication {
                    ReplicationOutcome::Disabled => {}
                    ReplicationOutcome::Completed {
                        dataset_id,
                        batches,
                        rows,
                    } => println!(
                        "  replicated: {} rows in {} batches to {}",
                        rows, batches, dataset_id
                    ),
                    ReplicationOutcome::Failed { error, .. } => {
                        println!("  replication failed: {}", error)
                    }
                }
            }
            Err(e) => println!("  failed: {}", e),
        }
    }
    println!("Rows stored: {}", summary.stats.rows_stored);
    if let (Some(p50), Some(p90), Some(p99)) = summary.stats.get_percentiles() {
        println!(
            "Sink batches: {} ({} rows) | p50: {}ms, p90: {}ms, p99: {}ms",
            summary.stats.batches_pushed(),
            summary.stats.rows_pushed,
            p50,
            p90,
            p99
        );
    }
    println!("Duration: {:.2}s", summary.duration.as_secs_f64());
}
