use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::schema::DetectedSchema;

/// Lifecycle of an ingest job: `pending -> processing -> {done, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the advisory analysis attached to a job.
///
/// Driven by the advisory feature, never by ingest; it shares the job record
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    NotStarted,
    Analyzing,
    Completed,
    AnalysisFailed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::NotStarted => "not_started",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::AnalysisFailed => "analysis_failed",
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(AnalysisStatus::NotStarted),
            "analyzing" => Ok(AnalysisStatus::Analyzing),
            "completed" => Ok(AnalysisStatus::Completed),
            "analysis_failed" => Ok(AnalysisStatus::AnalysisFailed),
            other => Err(format!("unknown analysis status '{other}'")),
        }
    }
}

/// Where a job's rows live in the sink, recorded once the remote dataset
/// exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkBinding {
    pub dataset_id: String,
    pub table_name: String,
}

/// Input for creating a job
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Reference to the owning user, typically an e-mail address
    pub owner: String,
    pub name: Option<String>,
}

/// One uploaded file and its processing state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: String,
    pub owner: String,
    pub name: Option<String>,
    pub status: JobStatus,
    pub analysis_status: AnalysisStatus,
    pub schema: Option<DetectedSchema>,
    pub sink_binding: Option<SinkBinding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn has_sink_binding(&self) -> bool {
        self.sink_binding.is_some()
    }

    /// The job's name, or `Upload_<id>` when none was given
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Upload_{}", self.id),
        }
    }

    /// Dataset name used in the sink: `<owner>_<name>_<id>`. The sink client
    /// sanitizes it on creation.
    ///
    /// The owner part is the local part of an e-mail address with every
    /// non-alphanumeric character replaced by `_`.
    pub fn sink_dataset_name(&self) -> String {
        let owner = self.owner.split('@').next().unwrap_or_default();
        let owner: String = owner
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        format!("{}_{}_{}", owner, self.display_name(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(owner: &str, name: Option<&str>) -> IngestJob {
        IngestJob {
            id: "42".to_string(),
            owner: owner.to_string(),
            name: name.map(str::to_string),
            status: JobStatus::Pending,
            analysis_status: AnalysisStatus::NotStarted,
            schema: None,
            sink_binding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        for status in [
            AnalysisStatus::NotStarted,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Completed,
            AnalysisStatus::AnalysisFailed,
        ] {
            assert_eq!(status.as_str().parse::<AnalysisStatus>().unwrap(), status);
        }
        assert!("queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(job("a@b.c", Some("Sales")).display_name(), "Sales");
        assert_eq!(job("a@b.c", Some("   ")).display_name(), "Upload_42");
        assert_eq!(job("a@b.c", None).display_name(), "Upload_42");
    }

    #[test]
    fn test_sink_dataset_name() {
        let named = job("jane.doe+salon@example.com", Some("Jane's Salon #1 (2024)"));
        assert_eq!(
            named.sink_dataset_name(),
            "jane_doe_salon_Jane's Salon #1 (2024)_42"
        );

        let unnamed = job("ops@example.com", None);
        assert_eq!(unnamed.sink_dataset_name(), "ops_Upload_42_42");
    }
}
