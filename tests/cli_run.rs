//! End-to-end `caravan run` tests.
//!
//! A tiny rsync stand-in on PATH keeps these hermetic: it copies the
//! source tree with cp, optionally fails on demand, and records every
//! invocation so gating tests can assert rsync never ran.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::tempdir;

fn install_rsync_shim(dir: &Path) -> PathBuf {
    let bin_dir = dir.join("bin");
    fs::create_dir_all(&bin_dir).unwrap();
    let shim = bin_dir.join("rsync");
    fs::write(
        &shim,
        concat!(
            "#!/bin/sh\n",
            "# rsync stand-in: copy the source tree, fail on demand\n",
            "if [ -n \"${RSYNC_SHIM_LOG:-}\" ]; then echo invoked >> \"$RSYNC_SHIM_LOG\"; fi\n",
            "if [ -n \"${CARAVAN_TEST_FAIL:-}\" ]; then exit 23; fi\n",
            "eval \"src=\\${$(($# - 1))}\"\n",
            "eval \"dst=\\${$#}\"\n",
            "mkdir -p \"$dst\"\n",
            "cp -R \"$src\". \"$dst\" >/dev/null 2>&1 || true\n",
            "exit 0\n",
        ),
    )
    .unwrap();
    let mut perms = fs::metadata(&shim).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&shim, perms).unwrap();
    bin_dir
}

fn shim_path(bin_dir: &Path) -> String {
    format!(
        "{}:{}",
        bin_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    )
}

fn make_volume(path: &Path, role_marker: &str) {
    fs::create_dir_all(path).unwrap();
    fs::write(path.join(".caravan-vol"), "").unwrap();
    fs::write(path.join(role_marker), "").unwrap();
}

fn write_config(dir: &Path, src: &Path, dst: &Path, snapshot_line: &str) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            r#"
            [volumes.docs]
            type = "local"
            path = "{}"

            [volumes.usb]
            type = "local"
            path = "{}"

            [syncs.docs-usb]
            [syncs.docs-usb.source]
            volume = "docs"
            [syncs.docs-usb.destination]
            volume = "usb"
            {snapshot_line}
            "#,
            src.display(),
            dst.display()
        ),
    )
    .unwrap();
    path
}

fn run_json(config: &Path, path_env: &str, extra_env: &[(&str, &str)]) -> (serde_json::Value, i32) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_caravan"));
    cmd.args(["--config"])
        .arg(config)
        .args(["--output", "json", "run"])
        .env("PATH", path_env);
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    let output = cmd.output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    (
        serde_json::from_str(&stdout).expect("run --output json must emit JSON"),
        output.status.code().unwrap_or(-1),
    )
}

fn snapshot_names(dst: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dst.join("snapshots")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

fn latest_name(dst: &Path) -> Option<String> {
    let target = fs::read_link(dst.join("latest")).ok()?;
    Some(target.file_name().unwrap().to_string_lossy().into_owned())
}

#[test]
fn hard_link_retention_end_to_end() {
    let dir = tempdir().unwrap();
    let bin_dir = install_rsync_shim(dir.path());
    let path_env = shim_path(&bin_dir);
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    make_volume(&dst, ".caravan-dst");
    fs::write(src.join("file.txt"), "payload").unwrap();
    let config = write_config(
        dir.path(),
        &src,
        &dst,
        "hard-link-snapshots = { enabled = true, max-snapshots = 2 }",
    );

    for run in 1..=3 {
        let (json, code) = run_json(&config, &path_env, &[]);
        assert_eq!(code, 0, "run {run} failed: {json}");
        let result = &json["results"][0];
        assert_eq!(result["status"], "succeeded");
        assert!(result["snapshot"].is_string());
    }

    // three successful runs with max-snapshots = 2: the two most
    // recent remain, the oldest is pruned, latest names the newest
    let names = snapshot_names(&dst);
    assert_eq!(names.len(), 2, "snapshots: {names:?}");
    assert_eq!(latest_name(&dst).as_deref(), Some(names[1].as_str()));
    // the published data is reachable through latest
    assert!(dst.join("latest").join("file.txt").exists());
}

#[test]
fn failed_transfer_publishes_nothing() {
    let dir = tempdir().unwrap();
    let bin_dir = install_rsync_shim(dir.path());
    let path_env = shim_path(&bin_dir);
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    make_volume(&dst, ".caravan-dst");
    fs::write(src.join("file.txt"), "payload").unwrap();
    let config = write_config(
        dir.path(),
        &src,
        &dst,
        "hard-link-snapshots = { enabled = true, max-snapshots = 2 }",
    );

    let (_, code) = run_json(&config, &path_env, &[]);
    assert_eq!(code, 0);
    let before = snapshot_names(&dst);
    let latest_before = latest_name(&dst);

    let (json, code) = run_json(&config, &path_env, &[("CARAVAN_TEST_FAIL", "1")]);
    assert_eq!(code, 1);
    let result = &json["results"][0];
    assert_eq!(result["status"], "failed");
    assert_eq!(result["rsync_exit_code"], 23);

    // no new snapshot is visible and latest is untouched
    assert_eq!(snapshot_names(&dst), before);
    assert_eq!(latest_name(&dst), latest_before);
}

#[test]
fn orphaned_snapshot_is_removed_before_the_next_transfer() {
    let dir = tempdir().unwrap();
    let bin_dir = install_rsync_shim(dir.path());
    let path_env = shim_path(&bin_dir);
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    make_volume(&dst, ".caravan-dst");
    let config = write_config(
        dir.path(),
        &src,
        &dst,
        "hard-link-snapshots = { enabled = true }",
    );

    let (_, code) = run_json(&config, &path_env, &[]);
    assert_eq!(code, 0);

    // a directory newer than latest can only be a failed-run leftover
    let orphan = dst.join("snapshots/2097-01-01T00:00:00Z");
    fs::create_dir_all(&orphan).unwrap();

    let (json, code) = run_json(&config, &path_env, &[]);
    assert_eq!(code, 0);
    assert_eq!(json["results"][0]["status"], "succeeded");
    assert!(!orphan.exists(), "orphan should have been swept");
}

#[test]
fn unavailable_destination_skips_without_invoking_rsync() {
    let dir = tempdir().unwrap();
    let bin_dir = install_rsync_shim(dir.path());
    let path_env = shim_path(&bin_dir);
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    fs::create_dir_all(&dst).unwrap(); // no markers: unavailable
    let config = write_config(dir.path(), &src, &dst, "");
    let shim_log = dir.path().join("shim.log");

    let (json, code) = run_json(
        &config,
        &path_env,
        &[("RSYNC_SHIM_LOG", shim_log.to_str().unwrap())],
    );
    // skipped syncs do not fail the run
    assert_eq!(code, 0);
    let result = &json["results"][0];
    assert_eq!(result["status"], "skipped");
    assert!(result["reasons"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r == "destination-unavailable"));
    assert!(!shim_log.exists(), "rsync must not have been invoked");
}

#[test]
fn dry_run_reports_without_side_effects() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    make_volume(&dst, ".caravan-dst");
    fs::write(src.join("file.txt"), "payload").unwrap();
    let config = write_config(
        dir.path(),
        &src,
        &dst,
        "hard-link-snapshots = { enabled = true, max-snapshots = 2 }",
    );

    // no rsync shim on PATH: dry-run must not need the binary at all
    let output = Command::new(env!("CARGO_BIN_EXE_caravan"))
        .args(["--config"])
        .arg(&config)
        .args(["--output", "json", "run", "--dry-run"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    let result = &json["results"][0];
    assert_eq!(result["status"], "succeeded");
    assert_eq!(result["dry_run"], true);
    let command = result["command"].as_array().unwrap();
    assert_eq!(command[0], "rsync");
    assert!(command.iter().any(|a| a
        .as_str()
        .is_some_and(|s| s.starts_with("--partial-dir=.caravan-partial"))));

    // nothing was written
    assert!(!dst.join("snapshots").exists());
    assert!(!dst.join("latest").exists());
    assert!(!dst.join("file.txt").exists());
}

#[test]
fn plain_sync_copies_into_destination_root() {
    let dir = tempdir().unwrap();
    let bin_dir = install_rsync_shim(dir.path());
    let path_env = shim_path(&bin_dir);
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    make_volume(&src, ".caravan-src");
    make_volume(&dst, ".caravan-dst");
    fs::write(src.join("file.txt"), "payload").unwrap();
    let config = write_config(dir.path(), &src, &dst, "");

    let (json, code) = run_json(&config, &path_env, &[]);
    assert_eq!(code, 0);
    let result = &json["results"][0];
    assert_eq!(result["status"], "succeeded");
    assert!(result["snapshot"].is_null());
    assert!(dst.join("file.txt").exists());
}
