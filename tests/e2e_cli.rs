//! CLI end-to-end tests
//!
//! Tests for the reelforge command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the reelforge binary
#[allow(deprecated)]
fn reelforge_cmd() -> Command {
    Command::cargo_bin("reelforge").unwrap()
}

/// A `SEQ0010` folder with five plate frames and a stray text file.
fn plate_dir(root: &Path) -> PathBuf {
    let seq = root.join("scans/SEQ0010");
    fs::create_dir_all(&seq).unwrap();
    for frame in 1001..=1005 {
        fs::write(seq.join(format!("shot_010_plate.{frame}.exr")), format!("frame {frame}")).unwrap();
    }
    fs::write(seq.join("notes.txt"), "notes").unwrap();
    root.join("scans")
}

fn write_pipeline(root: &Path, publish: &Path, metadata: serde_json::Value) -> PathBuf {
    let pipeline = serde_json::json!({
        "contextVars": { "dept": "comp" },
        "taskHolders": [{
            "task": "copy",
            "targetTemplate": format!("{}/{{seq}}/{{shot}}/{{baseName}}", publish.display()),
            "matchTypes": ["exrPlate"],
            "taskMetadata": metadata,
            "taskHolders": [{
                "task": "checksum",
                "targetTemplate": "{filePath}"
            }]
        }]
    });
    let path = root.join("publish.json");
    fs::write(&path, serde_json::to_string_pretty(&pipeline).unwrap()).unwrap();
    path
}

/// Config running holders through this binary and waiting for them.
fn write_local_config(root: &Path) -> PathBuf {
    let config = format!(
        "[dispatch]\ndefault = \"local\"\nawait_execution = true\nexecutable = \"{}\"\njob_directory = \"{}\"\n",
        env!("CARGO_BIN_EXE_reelforge"),
        root.join("jobs").display()
    );
    let path = root.join("reelforge.toml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = reelforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = reelforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelforge"))
        .stdout(predicate::str::contains("farm-job"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = reelforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "reelforge {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_types_lists_registries() {
    let mut cmd = reelforge_cmd();
    cmd.arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("exrPlate"))
        .stdout(predicate::str::contains("checksum"))
        .stdout(predicate::str::contains("newver"))
        .stdout(predicate::str::contains("renderfarm"))
        .stdout(predicate::str::contains("reelforge.sequence"));
}

#[test]
fn test_cli_validate_config_and_pipeline() {
    let dir = tempdir().unwrap();
    let config = write_local_config(dir.path());
    let pipeline = write_pipeline(dir.path(), &dir.path().join("publish"), serde_json::json!({}));

    let mut cmd = reelforge_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("validate")
        .arg(&pipeline)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Top-level task holders: 1"));
}

#[test]
fn test_cli_validate_rejects_bad_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[dispatch]\ndefault = \"cloud\"\n").unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cloud"));
}

#[test]
fn test_cli_run_dry_run_lists_targets() {
    let dir = tempdir().unwrap();
    let scans = plate_dir(dir.path());
    let publish = dir.path().join("publish");
    let pipeline = write_pipeline(dir.path(), &publish, serde_json::json!({}));

    let mut cmd = reelforge_cmd();
    cmd.args(["run", "--dry-run"])
        .arg(&pipeline)
        .arg(&scans)
        .assert()
        .success()
        .stdout(predicate::str::contains("copy (5 match(es))"))
        .stdout(predicate::str::contains("SEQ0010/shot_010/shot_010_plate.1003.exr"))
        .stdout(predicate::str::contains("DRY RUN"));

    assert!(!publish.exists());
}

#[test]
fn test_cli_run_missing_source_fails() {
    let dir = tempdir().unwrap();
    let pipeline = write_pipeline(dir.path(), &dir.path().join("publish"), serde_json::json!({}));

    let mut cmd = reelforge_cmd();
    cmd.arg("run")
        .arg(&pipeline)
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source does not exist"));
}

#[test]
fn test_cli_run_local_dispatch_publishes_plates() {
    let dir = tempdir().unwrap();
    let scans = plate_dir(dir.path());
    let publish = dir.path().join("publish");
    let pipeline = write_pipeline(dir.path(), &publish, serde_json::json!({}));
    let config = write_local_config(dir.path());

    let mut cmd = reelforge_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("run")
        .arg(&pipeline)
        .arg(&scans)
        .assert()
        .success()
        .stdout(predicate::str::contains("copy:"));

    for frame in 1001..=1005 {
        let published = publish.join(format!("SEQ0010/shot_010/shot_010_plate.{frame}.exr"));
        assert_eq!(fs::read_to_string(published).unwrap(), format!("frame {frame}"));
    }
    assert!(!publish.join("SEQ0010/shot_010/notes.txt").exists());
}

#[test]
fn test_cli_run_subprocess_wrapper() {
    let dir = tempdir().unwrap();
    let scans = plate_dir(dir.path());
    let publish = dir.path().join("publish");
    let pipeline = write_pipeline(
        dir.path(),
        &publish,
        serde_json::json!({
            "wrapper.name": "subprocess",
            "wrapper.options": { "executable": env!("CARGO_BIN_EXE_reelforge") }
        }),
    );
    let config = write_local_config(dir.path());

    let mut cmd = reelforge_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("run")
        .arg(&pipeline)
        .arg(&scans)
        .assert()
        .success();

    assert!(publish
        .join("SEQ0010/shot_010/shot_010_plate.1005.exr")
        .exists());
}

#[test]
fn test_cli_exec_holder_missing_job_fails() {
    let mut cmd = reelforge_cmd();
    cmd.args(["exec-holder", "/nonexistent/job.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Local job failed"));
}
