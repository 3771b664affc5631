//! LLM-assisted root-cause analysis.
//!
//! Sends a handful of representative records (highest anomaly score first)
//! to a chat-completions model and asks for a structured verdict with
//! `cause`, `impact`, and `solution`. The model's reply is parsed
//! tolerantly (code fences and surrounding prose are stripped); anything
//! that still fails to parse degrades to a fixed placeholder report rather
//! than failing the command. The scoring/parsing pipeline has no dependency
//! on this module succeeding.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::config::{AnalysisConfig, Config};
use crate::db;

/// Structured narrative returned by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseReport {
    pub cause: String,
    pub impact: String,
    pub solution: String,
}

/// The fixed degradation result used whenever analysis cannot produce a
/// usable report.
pub fn failed_report() -> RootCauseReport {
    RootCauseReport {
        cause: "Unable to determine root cause".to_string(),
        impact: "Analysis failed".to_string(),
        solution: "Review logs manually".to_string(),
    }
}

/// CLI entry: analyze the most anomalous stored records.
pub async fn run_analyze(config: &Config, service: Option<String>, limit: Option<usize>) -> Result<()> {
    if !config.analysis.is_enabled() {
        bail!("Analysis provider is disabled. Set [analysis] provider in config.");
    }

    let pool = db::connect(config).await?;
    let wanted = limit.unwrap_or(config.analysis.max_records);
    let lines = top_anomalous_lines(&pool, service.as_deref(), wanted).await?;

    if lines.is_empty() {
        println!("No records to analyze.");
        pool.close().await;
        return Ok(());
    }

    let report = match analyze_root_cause(&config.analysis, &lines).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Warning: analysis failed: {}", e);
            failed_report()
        }
    };

    println!("Root cause analysis ({} records)", lines.len());
    println!("  cause:    {}", report.cause);
    println!("  impact:   {}", report.impact);
    println!("  solution: {}", report.solution);

    pool.close().await;
    Ok(())
}

/// Ask the configured model for a root-cause report over the given record
/// lines.
///
/// Transport and API failures return `Err` for the orchestrator to degrade;
/// a reply that arrives but cannot be parsed degrades to the placeholder
/// here, since the collaborator did respond.
pub async fn analyze_root_cause(
    config: &AnalysisConfig,
    lines: &[String],
) -> Result<RootCauseReport> {
    if !config.is_enabled() {
        bail!("Analysis provider is disabled");
    }

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("analysis.model required"))?;

    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let prompt = build_prompt(lines, config.max_records);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": [
            { "role": "user", "content": prompt }
        ],
        "temperature": 0.7,
    });

    let response = client
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("analysis API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    let content = json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid analysis response: missing message content"))?;

    Ok(parse_report(content).unwrap_or_else(failed_report))
}

/// Format the analysis prompt over at most `max_records` record lines.
fn build_prompt(lines: &[String], max_records: usize) -> String {
    let formatted = lines
        .iter()
        .take(max_records)
        .enumerate()
        .map(|(i, line)| format!("Log {}:\n{}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a system analyst reviewing anomalous log records to find \
         the root cause of an incident.\n\
         Reply with a JSON object containing exactly these keys:\n\
         - cause: the root cause of the issue\n\
         - impact: the impact of the issue\n\
         - solution: the recommended fix\n\n\
         Logs:\n{}",
        formatted
    )
}

/// Extract a report from model output. Tolerates markdown code fences and
/// prose around the JSON object; returns `None` when no parseable object
/// with the expected keys is present.
pub fn parse_report(text: &str) -> Option<RootCauseReport> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Fetch the highest-scoring records as display lines, newest first among
/// ties.
pub async fn top_anomalous_lines(
    pool: &SqlitePool,
    service: Option<&str>,
    limit: usize,
) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT timestamp, level, service, message, anomaly_score
        FROM logs
        WHERE (? IS NULL OR service = ?)
        ORDER BY anomaly_score DESC, timestamp DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(service)
    .bind(service)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(format_row).collect())
}

/// Fetch specific records (by id) as display lines, preserving request
/// order for ids that exist.
pub async fn lines_for_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(ids.len());

    for id in ids {
        let row = sqlx::query(
            "SELECT timestamp, level, service, message, anomaly_score FROM logs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = row {
            lines.push(format_row(&row));
        }
    }

    Ok(lines)
}

fn format_row(row: &sqlx::sqlite::SqliteRow) -> String {
    let timestamp: i64 = row.get("timestamp");
    let time = chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    format!(
        "{} {} {} - {} (anomaly {:.2})",
        time,
        row.get::<String, _>("level"),
        row.get::<String, _>("service"),
        row.get::<String, _>("message"),
        row.get::<f64, _>("anomaly_score"),
    )
}
