#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn watchstore_cmd(data: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("watchstore"));
    cmd.arg("--data").arg(data).env_remove("WATCHSTORE_LOG");
    cmd
}

fn write_json(dir: &Path, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stdout_lines(cmd: &mut Command) -> Vec<String> {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn v1_0_blob() -> Value {
    json!({
        "movies": {
            "10": {"want": true, "title": "Alien"},
            "11": {"watched": true, "rating": 8, "review": "good", "date": 5}
        },
        "search": {"recent": ["alien", "dune"]}
    })
}

#[test]
fn test_migrate_prints_current_blob() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());

    let data = stdout_json(watchstore_cmd(temp.path()).arg("migrate").arg(&file));
    assert_eq!(data["version"], "1.3");
    assert_eq!(data["movies"]["want"], json!([10]));
    assert_eq!(data["movies"]["watched"], json!([11]));
    assert_eq!(data["movies"]["reviews"]["11"]["rating"], json!(8));

    // Nothing is written for an offline migration
    assert!(!temp.path().join("store").exists());
}

#[test]
fn test_migrate_report_lists_applied_steps() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &json!({"version": "1.1"}));

    let report = stdout_json(
        watchstore_cmd(temp.path())
            .args(["migrate", "--report"])
            .arg(&file),
    );
    assert_eq!(report["from"], "1.1");
    assert_eq!(report["applied"], json!(["1.2", "1.3"]));
}

#[test]
fn test_migrate_rejects_newer_version() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "new.json", &json!({"version": "2.0"}));

    watchstore_cmd(temp.path())
        .arg("migrate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported schema version"));
}

#[test]
fn test_migrate_rejects_invalid_json() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("broken.json");
    fs::write(&file, "{not json").unwrap();

    watchstore_cmd(temp.path())
        .arg("migrate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_import_then_export_round_trip() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());

    watchstore_cmd(temp.path())
        .args(["import", "--user", "42"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported"))
        .stdout(predicate::str::contains("user 42"));

    let exported = stdout_json(watchstore_cmd(temp.path()).args(["export", "--user", "42"]));
    assert_eq!(exported["version"], "1.3");
    assert_eq!(exported["movies"]["want"], json!([10]));
    assert_eq!(exported["movies"]["reviews"]["11"]["text"], "good");
    assert_eq!(exported["search"]["recent"], json!(["alien", "dune"]));

    // The export is itself importable and yields the same store
    let again = write_json(temp.path(), "export.json", &exported);
    watchstore_cmd(temp.path())
        .args(["import", "--user", "43"])
        .arg(&again)
        .assert()
        .success();
    let copy = stdout_json(watchstore_cmd(temp.path()).args(["export", "--user", "43"]));
    assert_eq!(copy, exported);
}

#[test]
fn test_keys_lists_only_the_users_keys() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());

    for user in ["1", "2"] {
        watchstore_cmd(temp.path())
            .args(["import", "--user", user])
            .arg(&file)
            .assert()
            .success();
    }

    let keys = stdout_lines(watchstore_cmd(temp.path()).args(["keys", "--user", "1"]));
    assert!(keys.contains(&"user_1_meta".to_string()));
    assert!(keys.contains(&"user_1_movies_want".to_string()));
    assert!(keys.iter().all(|k| k.starts_with("user_1_")));
}

#[test]
fn test_status_reports_version_and_sizes() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());
    watchstore_cmd(temp.path())
        .args(["import", "--user", "7"])
        .arg(&file)
        .assert()
        .success();

    let lines = stdout_lines(watchstore_cmd(temp.path()).args(["status", "--user", "7"]));
    assert!(lines.contains(&"version: 1.4".to_string()));
    assert!(lines.contains(&"movies_want: 1".to_string()));
    assert!(lines.contains(&"movie_reviews: 1".to_string()));
    assert!(lines.contains(&"recent_searches: 2".to_string()));
}

#[test]
fn test_clear_leaves_a_fresh_store() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());
    watchstore_cmd(temp.path())
        .args(["import", "--user", "5"])
        .arg(&file)
        .assert()
        .success();

    watchstore_cmd(temp.path())
        .args(["clear", "--user", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared store for user 5"));

    let keys = stdout_lines(watchstore_cmd(temp.path()).args(["keys", "--user", "5"]));
    assert_eq!(keys, vec!["user_5_meta".to_string()]);

    let exported = stdout_json(watchstore_cmd(temp.path()).args(["export", "--user", "5"]));
    assert_eq!(exported["movies"]["want"], json!([]));
}

#[test]
fn test_legacy_blob_is_cut_over_on_open() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");
    fs::create_dir_all(&store_dir).unwrap();
    write_json(
        &store_dir,
        "user_9_data.json",
        &json!({
            "version": "1.2",
            "movies": {"want": [{"id": 3}, {"id": 3}], "watched": []},
            "search": {"recent": ["a"]}
        }),
    );

    let exported = stdout_json(watchstore_cmd(temp.path()).args(["export", "--user", "9"]));
    assert_eq!(exported["movies"]["want"], json!([3]));

    let keys = stdout_lines(watchstore_cmd(temp.path()).args(["keys", "--user", "9"]));
    assert!(keys.contains(&"user_9_meta".to_string()));
    assert!(!keys.contains(&"user_9_data".to_string()));

    let lines = stdout_lines(watchstore_cmd(temp.path()).args(["status", "--user", "9"]));
    assert!(lines.contains(&"version: 1.4".to_string()));
}

#[test]
fn test_data_env_is_used_without_flag() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());

    Command::new(cargo_bin("watchstore"))
        .env("WATCHSTORE_DATA", temp.path())
        .args(["import", "--user", "3"])
        .arg(&file)
        .assert()
        .success();

    assert!(temp.path().join("store").join("user_3_meta.json").exists());
}

#[test]
fn test_verbose_logs_command_outcome() {
    let temp = TempDir::new().unwrap();
    let file = write_json(temp.path(), "old.json", &v1_0_blob());

    watchstore_cmd(temp.path())
        .args(["-v", "import", "--user", "8"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("imported blob"));
}
