use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::tempdir;

fn write_config(dir: &Path, src: &Path, dst: &Path) -> PathBuf {
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
            "#,
            src.display(),
            dst.display()
        ),
    )
    .unwrap();
    path
}

fn check_json(config: &Path) -> (serde_json::Value, std::process::ExitStatus) {
    let output = Command::new(env!("CARGO_BIN_EXE_caravan"))
        .args(["--config"])
        .arg(config)
        .args(["--output", "json", "check"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    (
        serde_json::from_str(&stdout).expect("check --output json must emit JSON"),
        output.status,
    )
}

#[test]
fn check_reports_missing_markers() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    let config = write_config(dir.path(), &src, &dst);

    let (json, status) = check_json(&config);
    assert!(status.success());

    let volumes = json["volumes"].as_array().unwrap();
    assert!(volumes
        .iter()
        .all(|v| v["reason"] == "marker-not-found" && v["available"] == false));
    let syncs = json["syncs"].as_array().unwrap();
    assert_eq!(syncs[0]["active"], false);
}

#[test]
fn check_reports_ready_sync() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    for (vol, role) in [(&src, ".caravan-src"), (&dst, ".caravan-dst")] {
        fs::create_dir_all(vol).unwrap();
        fs::write(vol.join(".caravan-vol"), "").unwrap();
        fs::write(vol.join(role), "").unwrap();
    }
    let config = write_config(dir.path(), &src, &dst);

    let (json, status) = check_json(&config);
    assert!(status.success());
    let syncs = json["syncs"].as_array().unwrap();
    assert_eq!(syncs[0]["active"], true);
    assert_eq!(syncs[0]["reasons"].as_array().unwrap().len(), 0);
}

#[test]
fn strict_check_fails_on_inactive_sync() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    let config = write_config(dir.path(), &src, &dst);

    let output = Command::new(env!("CARGO_BIN_EXE_caravan"))
        .args(["--config"])
        .arg(&config)
        .args(["check", "--strict"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn human_check_lists_volumes_and_syncs() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    let config = write_config(dir.path(), &src, &dst);

    let output = Command::new(env!("CARGO_BIN_EXE_caravan"))
        .args(["--config"])
        .arg(&config)
        .args(["check"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Volumes:"), "got:\n{stdout}");
    assert!(stdout.contains("Syncs:"));
    assert!(stdout.contains("docs-usb"));
}

#[test]
fn missing_config_exits_2() {
    let output = Command::new(env!("CARGO_BIN_EXE_caravan"))
        .args(["--config", "/nonexistent/caravan.toml", "check"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"));
}
