//! Ingest job bookkeeping.
//!
//! A job row tracks one uploaded file through
//! `queued → processing → completed | failed`. The pipeline itself never
//! touches job state beyond these narrow upserts; it returns data or raises
//! errors and the orchestrator records the outcome here.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{Job, JobState};

pub async fn create_job(pool: &SqlitePool, filename: &str, content_hash: &str) -> Result<String> {
    let job_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO jobs (id, filename, status, content_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job_id)
    .bind(filename)
    .bind(JobState::Queued.as_str())
    .bind(content_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(job_id)
}

pub async fn mark_processing(pool: &SqlitePool, job_id: &str) -> Result<()> {
    update_status(pool, job_id, JobState::Processing, None, None).await
}

pub async fn mark_completed(pool: &SqlitePool, job_id: &str, processed_count: i64) -> Result<()> {
    update_status(pool, job_id, JobState::Completed, Some(processed_count), None).await
}

pub async fn mark_failed(pool: &SqlitePool, job_id: &str, error: &str) -> Result<()> {
    update_status(pool, job_id, JobState::Failed, None, Some(error)).await
}

async fn update_status(
    pool: &SqlitePool,
    job_id: &str,
    state: JobState,
    processed_count: Option<i64>,
    error: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?, processed_count = COALESCE(?, processed_count),
            error = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(state.as_str())
    .bind(processed_count)
    .bind(error)
    .bind(now)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_job(pool: &SqlitePool, job_id: &str) -> Result<Option<Job>> {
    let row = sqlx::query(
        "SELECT id, filename, status, processed_count, error, created_at, updated_at FROM jobs WHERE id = ?",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Job {
        id: row.get("id"),
        filename: row.get("filename"),
        status: row.get("status"),
        processed_count: row.get("processed_count"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// CLI entry: show one job, or list the most recent ones.
pub async fn run_jobs(config: &Config, id: Option<String>, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;

    if let Some(job_id) = id {
        let Some(job) = get_job(&pool, &job_id).await? else {
            pool.close().await;
            bail!("job not found: {}", job_id);
        };

        println!("Job {}", job.id);
        println!("  file:      {}", job.filename);
        println!("  status:    {}", job.status);
        if let Some(count) = job.processed_count {
            println!("  processed: {}", count);
        }
        if let Some(error) = &job.error {
            println!("  error:     {}", error);
        }
        println!("  created:   {}", format_ts(job.created_at));
        println!("  updated:   {}", format_ts(job.updated_at));

        pool.close().await;
        return Ok(());
    }

    let rows = sqlx::query(
        r#"
        SELECT id, filename, status, processed_count, created_at
        FROM jobs
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("No jobs.");
        pool.close().await;
        return Ok(());
    }

    println!(
        "{:<36} {:>10} {:>8}   {:<19} {}",
        "JOB", "STATUS", "RECORDS", "CREATED", "FILE"
    );
    for row in &rows {
        let processed: Option<i64> = row.get("processed_count");
        println!(
            "{:<36} {:>10} {:>8}   {:<19} {}",
            row.get::<String, _>("id"),
            row.get::<String, _>("status"),
            processed.map_or_else(|| "-".to_string(), |count| count.to_string()),
            format_ts(row.get("created_at")),
            row.get::<String, _>("filename"),
        );
    }

    pool.close().await;
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
