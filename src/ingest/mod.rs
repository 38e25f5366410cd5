//! Ingest jobs and the orchestrator that runs them

pub mod job;
pub mod orchestrator;

pub use job::{AnalysisStatus, IngestJob, JobStatus, NewJob, SinkBinding};
pub use orchestrator::{IngestReport, Orchestrator, ReplicationOutcome};
