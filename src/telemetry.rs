use crate::ingest::job::JobStatus;

/// Telemetry events sent from running jobs to the progress display
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// A run picked up a job
    JobStarted { job_id: String },
    /// Rows were durably stored
    RowsStored { job_id: String, rows: u64 },
    /// One batch was accepted by the sink
    BatchPushed {
        job_id: String,
        rows: u64,
        duration_ms: u64,
    },
    /// The ingest phase reached a terminal status
    JobFinished { job_id: String, status: JobStatus },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub jobs_started: usize,
    pub jobs_done: usize,
    pub jobs_failed: usize,
    pub rows_stored: u64,
    pub rows_pushed: u64,
    pub push_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::JobStarted { .. } => {
                self.jobs_started += 1;
            }
            TelemetryEvent::RowsStored { rows, .. } => {
                self.rows_stored += rows;
            }
            TelemetryEvent::BatchPushed {
                rows, duration_ms, ..
            } => {
                self.rows_pushed += rows;
                self.push_durations_ms.push(*duration_ms);
            }
            TelemetryEvent::JobFinished { status, .. } => match status {
                JobStatus::Done => self.jobs_done += 1,
                JobStatus::Failed => self.jobs_failed += 1,
                JobStatus::Pending | JobStatus::Processing => {}
            },
        }
    }

    pub fn batches_pushed(&self) -> usize {
        self.push_durations_ms.len()
    }

    /// Calculate percentile from batch push durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.push_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.push_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_aggregate_events() {
        let mut stats = ProgressStats::new();
        let job_id = "j".to_string();
        let events = [
            TelemetryEvent::JobStarted {
                job_id: job_id.clone(),
            },
            TelemetryEvent::RowsStored {
                job_id: job_id.clone(),
                rows: 1000,
            },
            TelemetryEvent::RowsStored {
                job_id: job_id.clone(),
                rows: 500,
            },
            TelemetryEvent::JobFinished {
                job_id: job_id.clone(),
                status: JobStatus::Done,
            },
            TelemetryEvent::BatchPushed {
                job_id: job_id.clone(),
                rows: 1000,
                duration_ms: 40,
            },
            TelemetryEvent::BatchPushed {
                job_id: job_id.clone(),
                rows: 500,
                duration_ms: 20,
            },
            TelemetryEvent::JobFinished {
                job_id,
                status: JobStatus::Failed,
            },
        ];
        for event in &events {
            stats.update(event);
        }

        assert_eq!(stats.jobs_started, 1);
        assert_eq!(stats.rows_stored, 1500);
        assert_eq!(stats.rows_pushed, 1500);
        assert_eq!(stats.batches_pushed(), 2);
        assert_eq!(stats.jobs_done, 1);
        assert_eq!(stats.jobs_failed, 1);
    }

    #[test]
    fn test_percentiles() {
        let mut stats = ProgressStats::new();
        assert_eq!(stats.percentile(50.0), None);

        stats.push_durations_ms = (1..=100).collect();
        assert_eq!(stats.get_percentiles(), (Some(50), Some(90), Some(99)));

        stats.push_durations_ms = vec![7];
        assert_eq!(stats.percentile(0.0), Some(7));
    }
}
