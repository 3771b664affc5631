use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::embedding;

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct LogHit {
    pub id: String,
    pub timestamp: i64,
    pub level: String,
    pub service: String,
    pub host: String,
    pub message: String,
    pub anomaly_score: f64,
    pub score: f64,
}

/// Optional narrowing applied after candidate ranking.
#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub service: Option<String>,
    pub since: Option<String>,
}

/// CLI entry: print ranked results for a query.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    filters: SearchFilters,
    limit: Option<i64>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let hits = search_logs(&pool, config, query, mode, &filters, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let time = chrono::DateTime::from_timestamp(hit.timestamp, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        println!("{}. [{:.2}] {} {} — {}", i + 1, hit.score, hit.level, hit.service, time);
        println!("    message: \"{}\"", hit.message.replace('\n', " "));
        if hit.anomaly_score > 0.0 {
            println!("    anomaly: {:.2}", hit.anomaly_score);
        }
        println!("    id: {}", hit.id);
        println!();
    }

    pool.close().await;
    Ok(())
}

/// Rank stored records against a query.
///
/// Modes: `keyword` (FTS5), `semantic` (vector similarity), `hybrid`
/// (weighted merge of both channels). Semantic and hybrid require an
/// enabled embedding provider. An empty query returns no results rather
/// than erroring.
pub async fn search_logs(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    mode: &str,
    filters: &SearchFilters,
    limit: Option<i64>,
) -> Result<Vec<LogHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    match mode {
        "keyword" | "semantic" | "hybrid" => {}
        _ => bail!(
            "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
            mode
        ),
    }

    if (mode == "semantic" || mode == "hybrid") && !config.embedding.is_enabled() {
        bail!(
            "Mode '{}' requires embeddings. Set [embedding] provider in config.",
            mode
        );
    }

    let final_limit = limit.unwrap_or(config.retrieval.final_limit);

    let keyword_candidates = if mode == "keyword" || mode == "hybrid" {
        fetch_keyword_candidates(pool, query, config.retrieval.candidate_k_keyword).await?
    } else {
        Vec::new()
    };

    let vector_candidates = if mode == "semantic" || mode == "hybrid" {
        fetch_vector_candidates(pool, config, query, config.retrieval.candidate_k_vector).await?
    } else {
        Vec::new()
    };

    if keyword_candidates.is_empty() && vector_candidates.is_empty() {
        return Ok(Vec::new());
    }

    let kw_map = normalize_scores(&keyword_candidates);
    let vec_map = normalize_scores(&vector_candidates);

    let effective_alpha = match mode {
        "keyword" => 0.0,
        "semantic" => 1.0,
        _ => config.retrieval.hybrid_alpha,
    };

    let mut merged: HashMap<&str, f64> = HashMap::new();
    for candidate in keyword_candidates.iter().chain(vector_candidates.iter()) {
        let id = candidate.log_id.as_str();
        if merged.contains_key(id) {
            continue;
        }
        let k = kw_map.get(id).copied().unwrap_or(0.0);
        let v = vec_map.get(id).copied().unwrap_or(0.0);
        merged.insert(id, (1.0 - effective_alpha) * k + effective_alpha * v);
    }

    // Fetch record fields and apply filters
    let since_ts = match &filters.since {
        Some(since_str) => {
            let since_date = NaiveDate::parse_from_str(since_str, "%Y-%m-%d")?;
            Some(
                since_date
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_utc()
                    .timestamp(),
            )
        }
        None => None,
    };

    let mut hits: Vec<LogHit> = Vec::new();

    for (&log_id, &score) in &merged {
        let row = sqlx::query(
            "SELECT id, timestamp, level, service, host, message, anomaly_score FROM logs WHERE id = ?",
        )
        .bind(log_id)
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else { continue };

        let service: String = row.get("service");
        if let Some(wanted) = &filters.service {
            if &service != wanted {
                continue;
            }
        }

        let timestamp: i64 = row.get("timestamp");
        if let Some(cutoff) = since_ts {
            if timestamp < cutoff {
                continue;
            }
        }

        hits.push(LogHit {
            id: row.get("id"),
            timestamp,
            level: row.get("level"),
            service,
            host: row.get("host"),
            message: row.get("message"),
            anomaly_score: row.get("anomaly_score"),
            score,
        });
    }

    // Deterministic: score desc, newest first, id asc as the final tiebreak
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.timestamp.cmp(&a.timestamp))
            .then(a.id.cmp(&b.id))
    });
    hits.truncate(final_limit as usize);

    Ok(hits)
}

// ============ Candidate channels ============

#[derive(Debug, Clone)]
struct LogCandidate {
    log_id: String,
    raw_score: f64,
}

async fn fetch_keyword_candidates(
    pool: &SqlitePool,
    query: &str,
    candidate_k: i64,
) -> Result<Vec<LogCandidate>> {
    let rows = sqlx::query(
        r#"
        SELECT log_id, rank
        FROM logs_fts
        WHERE logs_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(query)
    .bind(candidate_k)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            LogCandidate {
                log_id: row.get("log_id"),
                raw_score: -rank, // bm25 rank is ascending-better; negate
            }
        })
        .collect())
}

async fn fetch_vector_candidates(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    candidate_k: i64,
) -> Result<Vec<LogCandidate>> {
    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let rows = sqlx::query("SELECT log_id, embedding FROM log_vectors WHERE model = ?")
        .bind(provider.model_name())
        .fetch_all(pool)
        .await?;

    let mut candidates: Vec<LogCandidate> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            LogCandidate {
                log_id: row.get("log_id"),
                raw_score: embedding::cosine_similarity(&query_vec, &vec) as f64,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(candidate_k as usize);

    Ok(candidates)
}

// ============ Score normalization ============

/// Min-max normalize a channel's raw scores to [0, 1], keyed by log id.
/// A constant channel (all scores equal) normalizes to 1.0.
fn normalize_scores(candidates: &[LogCandidate]) -> HashMap<&str, f64> {
    if candidates.is_empty() {
        return HashMap::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c.log_id.as_str(), norm)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate(log_id: &str, score: f64) -> LogCandidate {
        LogCandidate {
            log_id: log_id.to_string(),
            raw_score: score,
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_single_is_one() {
        let candidates = vec![make_candidate("a", -3.7)];
        let normalized = normalize_scores(&candidates);
        assert!((normalized["a"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_range() {
        let candidates = vec![
            make_candidate("a", 10.0),
            make_candidate("b", 5.0),
            make_candidate("c", 0.0),
        ];
        let normalized = normalize_scores(&candidates);
        assert!((normalized["a"] - 1.0).abs() < 1e-9);
        assert!((normalized["b"] - 0.5).abs() < 1e-9);
        assert!(normalized["c"].abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal() {
        let candidates = vec![make_candidate("a", 2.0), make_candidate("b", 2.0)];
        let normalized = normalize_scores(&candidates);
        for score in normalized.values() {
            assert!((score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_normalize_stays_in_unit() {
        let candidates = vec![
            make_candidate("a", -80.0),
            make_candidate("b", 3.5),
            make_candidate("c", 250.0),
        ];
        for score in normalize_scores(&candidates).values() {
            assert!((0.0..=1.0).contains(score), "score out of range: {}", score);
        }
    }

    #[test]
    fn test_alpha_extremes_pick_one_channel() {
        let kw_cands = [make_candidate("a", 9.0), make_candidate("b", 1.0)];
        let kw = normalize_scores(&kw_cands);
        let vec_cands = [make_candidate("a", 0.1), make_candidate("b", 0.9)];
        let vec = normalize_scores(&vec_cands);

        // alpha = 0 reduces to the keyword channel
        let hybrid_a = (1.0 - 0.0) * kw["a"] + 0.0 * vec["a"];
        let hybrid_b = (1.0 - 0.0) * kw["b"] + 0.0 * vec["b"];
        assert!(hybrid_a > hybrid_b);

        // alpha = 1 reduces to the vector channel
        let hybrid_a = (1.0 - 1.0) * kw["a"] + 1.0 * vec["a"];
        let hybrid_b = (1.0 - 1.0) * kw["b"] + 1.0 * vec["b"];
        assert!(hybrid_b > hybrid_a);
    }
}
