use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sift_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sift");
    path
}

const SAMPLE_LOG: &str = "\
2024-12-01 01:05:00 INFO payment-svc - heartbeat ok
2024-12-01 02:05:00 INFO payment-svc - heartbeat ok
2024-12-01 03:05:00 INFO payment-svc - heartbeat ok
2024-12-01 04:05:00 ERROR payment-svc - DB conn failed

Dec  1 03:17:44 prod-server-01 nginx[1234]: upstream timed out
[WARNING] disk usage above 80 percent
192.168.1.1 - - [01/Dec/2024:03:17:44 +0000] \"GET /api HTTP/1.1\" 500 1234
garbage line #### not a real log @@
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(root.join("app.log"), SAMPLE_LOG).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/sift.sqlite"

[retrieval]
final_limit = 12

[server]
bind = "127.0.0.1:7441"
"#,
        root.display()
    );

    let config_path = config_dir.join("sift.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sift(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sift binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sift(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("sift.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_sift(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_sift(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_counts_and_flags() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    let (stdout, stderr, success) =
        run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    // 9 physical lines, one blank — blank lines are skipped, not recorded
    assert!(stdout.contains("lines read: 9"), "got: {}", stdout);
    assert!(stdout.contains("records written: 8"), "got: {}", stdout);
    // payment-svc's all-error 04:00 hour is the only bucket past threshold
    assert!(stdout.contains("anomalies flagged: 1"), "got: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    let (stdout, _, success) = run_sift(
        &config_path,
        &["ingest", log_path.to_str().unwrap(), "--dry-run"],
    );

    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("records parsed: 8"), "got: {}", stdout);

    let (jobs_out, _, _) = run_sift(&config_path, &["jobs"]);
    assert!(jobs_out.contains("No jobs."), "got: {}", jobs_out);
}

#[test]
fn test_ingest_with_limit() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    let (stdout, _, success) = run_sift(
        &config_path,
        &["ingest", log_path.to_str().unwrap(), "--limit", "3"],
    );

    assert!(success);
    assert!(stdout.contains("records written: 3"), "got: {}", stdout);
}

#[test]
fn test_ingest_missing_file_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["ingest", "/nonexistent/app.log"]);
    assert!(!success, "ingest of a missing file should fail");
    assert!(stderr.contains("Failed to read log file"), "got: {}", stderr);
}

#[test]
fn test_job_recorded_as_completed() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    let (ingest_out, _, _) = run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    // Listing shows the job
    let (jobs_out, _, success) = run_sift(&config_path, &["jobs"]);
    assert!(success);
    assert!(jobs_out.contains("completed"), "got: {}", jobs_out);
    assert!(jobs_out.contains("app.log"));

    // Detail view via the id printed by ingest
    let job_id = ingest_out
        .lines()
        .find(|l| l.trim().starts_with("job:"))
        .and_then(|l| l.split("job:").nth(1))
        .map(|s| s.trim().to_string())
        .expect("ingest output should contain a job id");

    let (detail_out, _, success) = run_sift(&config_path, &["jobs", &job_id]);
    assert!(success);
    assert!(detail_out.contains("completed"));
    assert!(detail_out.contains("processed: 8"), "got: {}", detail_out);
}

#[test]
fn test_job_not_found() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["jobs", "no-such-job"]);
    assert!(!success, "unknown job id should fail");
    assert!(stderr.contains("not found"), "got: {}", stderr);
}

#[test]
fn test_search_keyword() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    let (stdout, stderr, success) = run_sift(&config_path, &["search", "upstream"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("upstream timed out"), "got: {}", stdout);
    assert!(stdout.contains("nginx"));
}

#[test]
fn test_search_deterministic() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    let (stdout1, _, _) = run_sift(&config_path, &["search", "heartbeat"]);
    let (stdout2, _, _) = run_sift(&config_path, &["search", "heartbeat"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (stdout, _, success) = run_sift(&config_path, &["search", ""]);
    assert!(success, "Empty query should not panic");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_no_results() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    let (stdout, _, success) = run_sift(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_service_filter() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    let (stdout, _, success) = run_sift(
        &config_path,
        &["search", "heartbeat", "--service", "nginx"],
    );
    assert!(success);
    assert!(
        stdout.contains("No results"),
        "heartbeat lines belong to payment-svc, got: {}",
        stdout
    );
}

#[test]
fn test_search_unknown_mode_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["search", "test", "--mode", "invalid"]);
    assert!(!success, "Unknown mode should fail");
    assert!(stderr.contains("Unknown search mode"), "got: {}", stderr);
}

#[test]
fn test_search_semantic_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["search", "test", "--mode", "semantic"]);
    assert!(!success, "Semantic mode should fail when embeddings disabled");
    assert!(stderr.contains("embeddings"), "got: {}", stderr);
}

#[test]
fn test_search_hybrid_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["search", "test", "--mode", "hybrid"]);
    assert!(!success, "Hybrid mode should fail when embeddings disabled");
    assert!(stderr.contains("embeddings"), "got: {}", stderr);
}

#[test]
fn test_embed_pending_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["embed", "pending"]);
    assert!(!success, "embed pending should fail when provider disabled");
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_embed_rebuild_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["embed", "rebuild"]);
    assert!(!success, "embed rebuild should fail when provider disabled");
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_analyze_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (_, stderr, success) = run_sift(&config_path, &["analyze"]);
    assert!(!success, "analyze should fail when provider disabled");
    assert!(stderr.contains("disabled"), "got: {}", stderr);
}

#[test]
fn test_stats_after_ingest() {
    let (tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let log_path = tmp.path().join("app.log");
    run_sift(&config_path, &["ingest", log_path.to_str().unwrap()]);

    let (stdout, _, success) = run_sift(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Total logs:  8"), "got: {}", stdout);
    assert!(stdout.contains("payment-svc"));
    assert!(stdout.contains("Errors:"));
    assert!(stdout.contains("Anomalies:"));
}

#[test]
fn test_stats_on_empty_database() {
    let (_tmp, config_path) = setup_test_env();

    run_sift(&config_path, &["init"]);
    let (stdout, _, success) = run_sift(&config_path, &["stats"]);
    assert!(success, "stats on an empty database should not fail");
    assert!(stdout.contains("Total logs:  0"), "got: {}", stdout);
}
