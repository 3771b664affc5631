//! Core data models used throughout logsift.
//!
//! These types represent the log records and ingest jobs that flow through
//! the parsing, scoring, and storage pipeline.

use chrono::{DateTime, Utc};

/// Normalized severity vocabulary.
///
/// Every parsed line carries exactly one of these values. Source spellings
/// are case-folded and `WARNING` is canonicalized to [`Level::Warn`];
/// anything outside the vocabulary becomes [`Level::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Unknown,
}

impl Level {
    /// Parse a level token from a log line.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "ERROR" => Level::Error,
            "WARN" | "WARNING" => Level::Warn,
            "INFO" => Level::Info,
            "DEBUG" => Level::Debug,
            _ => Level::Unknown,
        }
    }

    /// Derive a level from an HTTP status code (access-log lines).
    pub fn from_status(status: u32) -> Self {
        if status >= 500 {
            Level::Error
        } else if status >= 400 {
            Level::Warn
        } else {
            Level::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized log line.
///
/// Produced fully populated by the parser — no field is ever missing, even
/// for lines no format rule recognized. Immutable after parsing except for
/// `anomaly_score`, which the scorer writes as the sole permitted mutation.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub service: String,
    pub message: String,
    pub host: String,
    pub raw_line: String,
    /// 0.0 = normal, 1.0 = confidently anomalous. Zero until scored.
    pub anomaly_score: f64,
}

/// Lifecycle of an ingest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ingest job row, as stored in SQLite.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub filename: String,
    pub status: String,
    pub processed_count: Option<i64>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
