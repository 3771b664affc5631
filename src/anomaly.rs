//! Statistical anomaly scoring over a batch of parsed records.
//!
//! For each service, records are grouped into hour-of-day buckets and the
//! per-hour ERROR rate is compared to the service's mean and standard
//! deviation across the hours present in the batch. Each record is assigned
//! a score in `[0.0, 1.0]`: a clamped z-score of its own hour's error rate,
//! with a hard short-circuit to `1.0` whenever the rate clears the 2σ
//! threshold — clearly-over-threshold hours always reach the maximum even
//! when the continuous formula would land below it.
//!
//! Bucketing keys on the clock hour only; the calendar date is discarded,
//! so Monday 3am and Friday 3am share a bucket. That is a known limitation
//! of the detection design, kept as-is.

use std::collections::HashMap;

use chrono::Timelike;
use thiserror::Error;

use crate::models::{Level, LogRecord};

/// Added to the standard deviation before dividing, so a zero-variance
/// service cannot produce a division by zero.
pub const MIN_STD_OFFSET: f64 = 0.001;

/// Error rates more than this many standard deviations above the mean are
/// scored 1.0 outright.
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

/// Scores at or above this count as flagged anomalies in reports.
pub const FLAG_THRESHOLD: f64 = 0.9;

/// Scoring contract violations. Format-mismatch of individual lines is
/// never an error (the parser guarantees populated records); these cover
/// records arriving from other sources.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("record {index} missing required field(s): {fields}")]
    MissingField { index: usize, fields: String },
}

/// Per-(service, hour) aggregation. Built fresh for each batch and
/// discarded once scores are assigned.
#[derive(Debug, Default)]
struct HourProfile {
    total: u32,
    errors: u32,
}

impl HourProfile {
    fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.errors) / f64::from(self.total)
    }
}

/// Score a batch in place, writing `anomaly_score` onto every record.
///
/// Order and all other fields are untouched. Empty input is a no-op.
/// Scoring is a pure function of the batch: re-running it over its own
/// output reproduces identical scores.
pub fn score_records(records: &mut [LogRecord]) -> Result<(), ScoreError> {
    if records.is_empty() {
        return Ok(());
    }

    for (index, record) in records.iter().enumerate() {
        if record.service.is_empty() {
            return Err(ScoreError::MissingField {
                index,
                fields: "service".to_string(),
            });
        }
    }

    let mut by_service: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        by_service.entry(record.service.clone()).or_default().push(i);
    }

    for indices in by_service.values() {
        let mut buckets: HashMap<u32, HourProfile> = HashMap::new();
        for &i in indices {
            let profile = buckets.entry(records[i].timestamp.hour()).or_default();
            profile.total += 1;
            if records[i].level == Level::Error {
                profile.errors += 1;
            }
        }

        let rates: HashMap<u32, f64> = buckets
            .iter()
            .map(|(&hour, profile)| (hour, profile.error_rate()))
            .collect();

        let values: Vec<f64> = rates.values().copied().collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let std = sample_std(&values, mean);

        for &i in indices {
            let rate = rates[&records[i].timestamp.hour()];
            let z = (rate - mean) / (std + MIN_STD_OFFSET);

            records[i].anomaly_score = if rate > mean + ANOMALY_Z_THRESHOLD * std {
                1.0
            } else {
                z.clamp(0.0, 1.0)
            };
        }
    }

    Ok(())
}

/// Sample standard deviation (n − 1). A single data point has no computable
/// variance; it degrades to 0.0 instead of erroring.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}
