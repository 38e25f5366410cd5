//! Configuration constants for the ingest pipeline
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the application.

use std::time::Duration;

// ============================================================================
// Schema Detection Configuration
// ============================================================================

/// Number of leading data rows sampled when detecting column types
///
/// Detection never looks at the full dataset. 100 rows is enough to settle the
/// majority thresholds for typical uploads while keeping detection independent
/// of file size.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

// ============================================================================
// I/O Configuration
// ============================================================================

/// Size of sample to read when estimating the row count of a file
///
/// Only used to size progress bars, so a rough figure is fine.
pub const ESTIMATE_SAMPLE_BYTES: usize = 8192; // 8 KB

// ============================================================================
// Sink Configuration
// ============================================================================

/// Rows per push request
///
/// This is a hard limit of the push-dataset API, not a tuning knob.
pub const SINK_BATCH_SIZE: usize = 1000;

/// Timeout for individual sink requests
///
/// Set to 60 seconds because pushing a full batch of wide rows can be slow on
/// the remote side.
pub const SINK_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Name of the single table created inside every push dataset
pub const SINK_TABLE_NAME: &str = "Data";

pub const SINK_AUTH_BASE_URL: &str = "https://login.microsoftonline.com";

pub const SINK_API_BASE_URL: &str = "https://api.powerbi.com/v1.0";

pub const SINK_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

// ============================================================================
// Store Configuration
// ============================================================================

/// How long a SQLite writer waits on a locked database before giving up
///
/// Concurrent jobs write to the same database file, so short lock contention
/// is expected.
pub const STORE_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub const STORE_MAX_CONNECTIONS: u32 = 8;

// ============================================================================
// CLI Configuration
// ============================================================================

/// Number of stored rows printed by the `show` command
pub const PREVIEW_ROWS: u64 = 10;
