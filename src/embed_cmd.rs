use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::models::LogRecord;

/// Embed freshly ingested records inline. Non-fatal: failures leave the
/// records pending for a later `embed pending` run.
pub async fn embed_records_inline(
    config: &Config,
    pool: &SqlitePool,
    records: &[LogRecord],
) -> (u64, u64) {
    if !config.embedding.is_enabled() || records.is_empty() {
        return (0, 0);
    }

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Warning: could not create embedding provider: {}", e);
            return (0, records.len() as u64);
        }
    };

    let mut embedded = 0u64;
    let mut pending = 0u64;

    for batch in records.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|r| r.message.clone()).collect();

        match embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await {
            Ok(vectors) => {
                for (record, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    match upsert_vector(pool, &record.id, provider.model_name(), provider.dims(), &blob)
                        .await
                    {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            eprintln!("Warning: failed to store vector for {}: {}", record.id, e);
                            pending += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                pending += batch.len() as u64;
            }
        }
    }

    (embedded, pending)
}

/// Embed stored records that have no vector for the configured model.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let pending = find_pending_logs(&pool, &model_name, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  records needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all records up to date");
        pool.close().await;
        return Ok(());
    }

    let total = pending.len();
    let (embedded, failed) = embed_batches(config, &pool, provider.as_ref(), &pending, batch_size).await;

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Delete all vectors and regenerate for every stored record.
pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    sqlx::query("DELETE FROM log_vectors").execute(&pool).await?;

    println!("embed rebuild — cleared existing vectors");

    let all_logs = find_pending_logs(&pool, &model_name, None).await?;

    if all_logs.is_empty() {
        println!("  no records to embed");
        pool.close().await;
        return Ok(());
    }

    let total = all_logs.len();
    let (embedded, failed) = embed_batches(config, &pool, provider.as_ref(), &all_logs, batch_size).await;

    println!("embed rebuild");
    println!("  total records: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

struct PendingLog {
    log_id: String,
    message: String,
}

async fn embed_batches(
    config: &Config,
    pool: &SqlitePool,
    provider: &dyn embedding::EmbeddingProvider,
    items: &[PendingLog],
    batch_size: usize,
) -> (u64, u64) {
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in items.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.message.clone()).collect();

        match embedding::embed_texts(provider, &config.embedding, &texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    match upsert_vector(pool, &item.log_id, provider.model_name(), provider.dims(), &blob)
                        .await
                    {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            eprintln!("Warning: failed to store vector for {}: {}", item.log_id, e);
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                failed += batch.len() as u64;
            }
        }
    }

    (embedded, failed)
}

async fn find_pending_logs(
    pool: &SqlitePool,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<PendingLog>> {
    let limit_val = limit.map_or(i64::MAX, |l| l as i64);

    let rows = sqlx::query(
        r#"
        SELECT l.id AS log_id, l.message
        FROM logs l
        LEFT JOIN log_vectors v ON v.log_id = l.id AND v.model = ?
        WHERE v.log_id IS NULL
        ORDER BY l.timestamp, l.id
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingLog {
            log_id: row.get("log_id"),
            message: row.get("message"),
        })
        .collect())
}

async fn upsert_vector(
    pool: &SqlitePool,
    log_id: &str,
    model: &str,
    dims: usize,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO log_vectors (log_id, model, dims, embedding, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(log_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            embedding = excluded.embedding,
            created_at = excluded.created_at
        "#,
    )
    .bind(log_id)
    .bind(model)
    .bind(dims as i64)
    .bind(blob)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
