//! Integration tests that drive the compiled `trx` binary.
//!
//! Everything here runs offline: the configured transcript and storage
//! endpoints point at an unreachable address and are never contacted by
//! the commands under test.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn trx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("trx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/trx.sqlite"

[transcript]
base_url = "http://127.0.0.1:9"

[storage]
base_url = "http://127.0.0.1:9"
bucket = "transcription"

[embedding]
provider = "local"
model = "hashed-bow"
dims = 256

[worker]
sleep_after_secs = 0
"#,
        root.display()
    );

    let config_path = config_dir.join("trx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_trx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = trx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("STORAGE_SERVICE_KEY", "test-service-key")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run trx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_trx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_trx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_trx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_work_with_empty_queue_exits_cleanly() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_trx(&config_path, &["work"]);
    assert!(success, "work failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("no pending job"));
}

#[test]
fn test_search_empty_index_reports_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_trx(&config_path, &["search", "anything at all"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_with_media_filter_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (stdout, _, success) = run_trx(
        &config_path,
        &["search", "hello", "--media", "abc123", "--limit", "2"],
    );
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_jobs_shows_empty_queue() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (stdout, _, success) = run_trx(&config_path, &["jobs"]);
    assert!(success);
    assert!(stdout.contains("STATUS"));
    assert!(stdout.contains("(no jobs)"));
}

#[test]
fn test_ingest_rejects_invalid_media_reference() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (_, stderr, success) = run_trx(&config_path, &["ingest", "not a media reference"]);
    assert!(!success);
    assert!(stderr.contains("could not extract a media id"));
}

#[test]
fn test_reindex_with_no_stored_transcripts() {
    let (_tmp, config_path) = setup_test_env();

    run_trx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_trx(&config_path, &["reindex"]);
    assert!(
        success,
        "reindex failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("0 stored transcripts"));
    assert!(stdout.contains("documents in index: 0"));
}

#[test]
fn test_missing_config_fails_with_context() {
    let (tmp, _) = setup_test_env();
    let missing = tmp.path().join("nope.toml");

    let binary = trx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(missing.to_str().unwrap())
        .arg("init")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}
