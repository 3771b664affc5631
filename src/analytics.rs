//! Aggregate statistics over stored log records.
//!
//! Gives a quick overview of what has been ingested: volume, error rate,
//! the services producing the most logs, flagged anomalies, and the
//! hour-of-day distribution. Used by `sift stats` and served as JSON by
//! `GET /analytics`.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::anomaly;
use crate::config::Config;
use crate::db;

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub total_logs: i64,
    pub error_count: i64,
    pub warn_count: i64,
    /// Percentage of records at ERROR level.
    pub error_rate: f64,
    pub top_services: Vec<ServiceCount>,
    pub anomaly_count: i64,
    pub hourly_breakdown: Vec<HourlyBucket>,
}

#[derive(Debug, Serialize)]
pub struct ServiceCount {
    pub service: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HourlyBucket {
    pub hour: i64,
    pub total: i64,
    pub errors: i64,
}

pub async fn gather_analytics(pool: &SqlitePool) -> Result<AnalyticsSummary> {
    let total_logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
        .fetch_one(pool)
        .await?;

    let error_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE level = 'ERROR'")
        .fetch_one(pool)
        .await?;

    let warn_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE level = 'WARN'")
        .fetch_one(pool)
        .await?;

    let anomaly_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE anomaly_score >= ?")
            .bind(anomaly::FLAG_THRESHOLD)
            .fetch_one(pool)
            .await?;

    let error_rate = if total_logs > 0 {
        (error_count as f64 / total_logs as f64) * 100.0
    } else {
        0.0
    };

    let service_rows = sqlx::query(
        r#"
        SELECT service, COUNT(*) AS count
        FROM logs
        GROUP BY service
        ORDER BY count DESC, service ASC
        LIMIT 5
        "#,
    )
    .fetch_all(pool)
    .await?;

    let top_services = service_rows
        .iter()
        .map(|row| ServiceCount {
            service: row.get("service"),
            count: row.get("count"),
        })
        .collect();

    let hourly_rows = sqlx::query(
        r#"
        SELECT CAST(strftime('%H', timestamp, 'unixepoch') AS INTEGER) AS hour,
               COUNT(*) AS total,
               SUM(level = 'ERROR') AS errors
        FROM logs
        GROUP BY hour
        ORDER BY hour
        "#,
    )
    .fetch_all(pool)
    .await?;

    let hourly_breakdown = hourly_rows
        .iter()
        .map(|row| HourlyBucket {
            hour: row.get("hour"),
            total: row.get("total"),
            errors: row.get("errors"),
        })
        .collect();

    Ok(AnalyticsSummary {
        total_logs,
        error_count,
        warn_count,
        error_rate,
        top_services,
        anomaly_count,
        hourly_breakdown,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_analytics(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let summary = gather_analytics(&pool).await?;

    println!("logsift — Analytics");
    println!("===================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!();
    println!("  Total logs:  {}", summary.total_logs);
    println!(
        "  Errors:      {} ({:.1}%)",
        summary.error_count, summary.error_rate
    );
    println!("  Warnings:    {}", summary.warn_count);
    println!(
        "  Anomalies:   {} (score >= {})",
        summary.anomaly_count,
        anomaly::FLAG_THRESHOLD
    );

    if !summary.top_services.is_empty() {
        println!();
        println!("  Top services:");
        println!("  {:<28} {:>8}", "SERVICE", "LOGS");
        println!("  {}", "-".repeat(38));
        for entry in &summary.top_services {
            println!("  {:<28} {:>8}", entry.service, entry.count);
        }
    }

    if !summary.hourly_breakdown.is_empty() {
        println!();
        println!("  By hour of day:");
        println!("  {:>4} {:>8} {:>8}", "HOUR", "LOGS", "ERRORS");
        for bucket in &summary.hourly_breakdown {
            println!(
                "  {:>4} {:>8} {:>8}",
                format!("{:02}", bucket.hour),
                bucket.total,
                bucket.errors
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}
