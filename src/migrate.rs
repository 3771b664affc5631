use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Ingest jobs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            processed_count INTEGER,
            error TEXT,
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Parsed, scored log records
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS logs (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            level TEXT NOT NULL,
            service TEXT NOT NULL,
            message TEXT NOT NULL,
            host TEXT NOT NULL,
            raw_line TEXT NOT NULL,
            anomaly_score REAL NOT NULL DEFAULT 0.0,
            FOREIGN KEY (job_id) REFERENCES jobs(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // FTS5 virtual table over log messages
    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='logs_fts'",
    )
    .fetch_one(&pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE logs_fts USING fts5(
                log_id UNINDEXED,
                message
            )
            "#,
        )
        .execute(&pool)
        .await?;
    }

    // Embedding vectors, one per log record and model
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_vectors (
            log_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (log_id) REFERENCES logs(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Compound index for time-series filtering per service
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_logs_service_timestamp_level ON logs(service, timestamp DESC, level)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_anomaly_score ON logs(anomaly_score DESC)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_job_id ON logs(job_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
