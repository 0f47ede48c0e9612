/*!
 * CLI integration tests
 *
 * Runs the built binary against temporary repositories and checks exit codes
 * and machine-readable output.
 */

mod common;

use common::{layer_files, temp_repo, write_files};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn forest_bounds(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_forest-bounds"))
        .arg("--root")
        .arg(root)
        .arg("--no-progress")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run forest-bounds")
}

#[test]
fn test_missing_repo_root_is_fatal() {
    let dir = tempdir().unwrap();
    let output = forest_bounds(dir.path(), &["index"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not locate repository root"));
    assert!(stderr.contains("--root"));
}

#[test]
fn test_fetch_without_layer_files_is_fatal() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("data-config")).unwrap();

    let output = forest_bounds(dir.path(), &["fetch"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No YAML configs found"));
}

#[test]
fn test_layer_without_output_dir_is_fatal() {
    let repo = temp_repo("layers:\n  - name: orphan\n");
    let output = forest_bounds(repo.path(), &["chunk"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("output_dir"));
}

#[test]
fn test_index_json_report_on_empty_repo() {
    let repo = temp_repo("layers: []\n");
    let output = forest_bounds(repo.path(), &["index", "--json"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["indexed"], 0);
    assert_eq!(report["scanned"], 0);

    let index = fs::read_to_string(repo.path().join("data-out/index.json")).unwrap();
    assert_eq!(serde_json::from_str::<Vec<serde_json::Value>>(&index).unwrap().len(), 0);
}

#[test]
fn test_export_then_chunk_from_cli() {
    let repo = temp_repo("layers:\n  - name: forests\n    output_dir: national-forests\n");
    write_files(
        &repo.path().join("data-in/national-forests"),
        &layer_files("forests", "FORESTNAME", 4, &["Pike", "San Isabel"]),
    );

    let export = forest_bounds(repo.path(), &["export", "--json"]);
    assert!(export.status.success());
    let report: serde_json::Value = serde_json::from_slice(&export.stdout).unwrap();
    assert_eq!(report["files_written"], 1);

    let chunk = forest_bounds(repo.path(), &["chunk", "--json"]);
    assert!(chunk.status.success());
    let report: serde_json::Value = serde_json::from_slice(&chunk.stdout).unwrap();
    assert_eq!(report["files_copied"], 1);
    assert!(repo
        .path()
        .join("data-out/national-forests/forests.geojson")
        .is_file());
}

#[test]
fn test_cleanup_leaves_output_alone() {
    let repo = temp_repo("layers: []\n");
    let out_file = repo.path().join("data-out/national-forests/pike.geojson");
    fs::create_dir_all(out_file.parent().unwrap()).unwrap();
    fs::write(&out_file, br#"{"type":"FeatureCollection","features":[]}"#).unwrap();
    fs::create_dir_all(repo.path().join("data-in-geojson/national-forests")).unwrap();

    let output = forest_bounds(repo.path(), &["cleanup"]);
    assert!(output.status.success());
    assert!(out_file.is_file());
    assert!(!repo.path().join("data-in-geojson").exists());
}
