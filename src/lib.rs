//! # logsift
//!
//! A log ingestion and anomaly detection pipeline with semantic search.
//!
//! logsift takes raw, heterogeneous log text, classifies each line into a
//! structured record, scores how unusual each record's hour-of-day error
//! rate is for its service, and stores everything in SQLite where it can be
//! searched (keyword, semantic, hybrid), summarized, and fed to an LLM for
//! root-cause analysis.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────────┐   ┌──────────┐
//! │ Log files │──▶│    Pipeline     │──▶│  SQLite   │
//! │ (uploads) │   │ Parse+Score    │   │ FTS5+Vec  │
//! └───────────┘   └────────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │  (sift)  │       │  (JSON)  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sift init                       # create database
//! sift ingest app.log             # parse, score, and store a log file
//! sift stats                      # error rates, top services, anomalies
//! sift search "timeout" --mode hybrid
//! sift analyze                    # LLM root-cause over top anomalies
//! sift serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parser`] | Line classification into records |
//! | [`anomaly`] | Hour-of-day error-rate anomaly scoring |
//! | [`ingest`] | Pipeline orchestration |
//! | [`jobs`] | Ingest job bookkeeping |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Keyword, semantic, and hybrid search |
//! | [`analytics`] | Aggregate statistics |
//! | [`analyze`] | LLM root-cause analysis |
//! | [`server`] | JSON HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analytics;
pub mod analyze;
pub mod anomaly;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod ingest;
pub mod jobs;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod search;
pub mod server;
