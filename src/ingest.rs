//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for one uploaded file: split lines → classify
//! each line into a record → score the batch → bulk-insert records (FTS
//! rows alongside, one transaction) → inline embedding (non-fatal on
//! failure). Job status is recorded around the pipeline: `processing` on
//! entry, `completed` with the processed count on success, `failed` with
//! the error string otherwise.

use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::anomaly;
use crate::config::Config;
use crate::db;
use crate::embed_cmd;
use crate::jobs;
use crate::models::LogRecord;
use crate::parser;

/// Counters reported back to the caller after a batch completes.
pub struct IngestOutcome {
    pub lines_read: usize,
    pub records_written: usize,
    pub anomalies_flagged: usize,
    pub embeddings_written: u64,
    pub embeddings_pending: u64,
}

/// CLI entry: ingest one log file synchronously.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    if dry_run {
        let lines_read = content.lines().count();
        let mut records = parser::parse_lines(&content);
        if let Some(lim) = limit {
            records.truncate(lim);
        }
        anomaly::score_records(&mut records)?;

        println!("ingest {} (dry-run)", filename);
        println!("  lines read: {}", lines_read);
        println!("  records parsed: {}", records.len());
        println!("  anomalies flagged: {}", count_flagged(&records));
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let job_id = jobs::create_job(&pool, &filename, &hash_content(&content)).await?;

    let outcome = process_job(&pool, config, &job_id, &content, limit).await?;

    println!("ingest {}", filename);
    println!("  job: {}", job_id);
    println!("  lines read: {}", outcome.lines_read);
    println!("  records written: {}", outcome.records_written);
    println!("  anomalies flagged: {}", outcome.anomalies_flagged);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", outcome.embeddings_written);
        println!("  embeddings pending: {}", outcome.embeddings_pending);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Run the pipeline for an existing job row, recording success or failure
/// on it. This is the entry point the server's upload handler spawns.
pub async fn process_job(
    pool: &SqlitePool,
    config: &Config,
    job_id: &str,
    content: &str,
    limit: Option<usize>,
) -> Result<IngestOutcome> {
    jobs::mark_processing(pool, job_id).await?;

    match run_pipeline(pool, config, job_id, content, limit).await {
        Ok(outcome) => {
            jobs::mark_completed(pool, job_id, outcome.records_written as i64).await?;
            Ok(outcome)
        }
        Err(e) => {
            jobs::mark_failed(pool, job_id, &e.to_string()).await?;
            Err(e)
        }
    }
}

async fn run_pipeline(
    pool: &SqlitePool,
    config: &Config,
    job_id: &str,
    content: &str,
    limit: Option<usize>,
) -> Result<IngestOutcome> {
    let lines_read = content.lines().count();

    let mut records = parser::parse_lines(content);
    if let Some(lim) = limit {
        records.truncate(lim);
    }

    anomaly::score_records(&mut records)?;

    insert_records(pool, job_id, &records).await?;

    let (embeddings_written, embeddings_pending) =
        embed_cmd::embed_records_inline(config, pool, &records).await;

    Ok(IngestOutcome {
        lines_read,
        records_written: records.len(),
        anomalies_flagged: count_flagged(&records),
        embeddings_written,
        embeddings_pending,
    })
}

/// Bulk write: all records of a batch land in one transaction, with their
/// FTS rows, or none do.
async fn insert_records(pool: &SqlitePool, job_id: &str, records: &[LogRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO logs (id, job_id, timestamp, level, service, message, host, raw_line, anomaly_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(job_id)
        .bind(record.timestamp.timestamp())
        .bind(record.level.as_str())
        .bind(&record.service)
        .bind(&record.message)
        .bind(&record.host)
        .bind(&record.raw_line)
        .bind(record.anomaly_score)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO logs_fts (log_id, message) VALUES (?, ?)")
            .bind(&record.id)
            .bind(&record.message)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn count_flagged(records: &[LogRecord]) -> usize {
    records
        .iter()
        .filter(|record| record.anomaly_score >= anomaly::FLAG_THRESHOLD)
        .count()
}

pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
