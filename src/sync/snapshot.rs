//! Snapshot lifecycle: the strategy seam and shared helpers
//!
//! Both strategies implement the same contract: `prepare` picks the
//! transfer target, `publish` makes a successful transfer visible as a
//! snapshot, `prune` enforces retention, and `abort` cleans up after a
//! failed transfer. The orchestrator selects a strategy once per sync
//! and never branches on the mode again.
//!
//! Snapshot names are UTC ISO-8601 timestamps at second precision;
//! within-second collisions get a numeric suffix so lexicographic name
//! order is always creation order.

use std::fs;
use std::io;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SnapshotMode;
use crate::error::CaravanResult;
use crate::remote::VolumeShell;
use crate::sync::btrfs::BtrfsStrategy;
use crate::sync::hardlinks::HardLinkStrategy;

/// What the transfer should write into, as decided by the strategy.
#[derive(Debug, Clone, Default)]
pub struct TransferTarget {
    /// Subpath under the destination sync path (`latest` or
    /// `snapshots/<name>`). `None` = the sync path itself.
    pub dest_suffix: Option<String>,
    /// `--link-dest` base relative to the transfer destination.
    pub link_dest: Option<String>,
    /// Name of the snapshot directory created for this run, when the
    /// strategy writes into one directly.
    pub snapshot_name: Option<String>,
}

/// A snapshot deletion that failed; reported, never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct PruneWarning {
    pub path: String,
    pub message: String,
}

/// Result of a retention pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub warnings: Vec<PruneWarning>,
}

/// Everything a strategy needs to act on one sync's destination.
pub struct SnapshotContext<'a> {
    pub sync_slug: &'a str,
    /// Destination volume path plus the sync's subdir.
    pub dest_path: String,
    pub shell: VolumeShell<'a>,
    pub max_snapshots: Option<u32>,
    pub now: DateTime<Utc>,
}

impl SnapshotContext<'_> {
    pub fn snapshots_dir(&self) -> String {
        format!("{}/snapshots", self.dest_path)
    }

    pub fn latest_path(&self) -> String {
        format!("{}/latest", self.dest_path)
    }
}

/// The snapshot lifecycle contract shared by both strategies.
pub trait SnapshotStrategy {
    fn name(&self) -> &'static str;

    /// Compute the transfer target without touching the filesystem.
    /// Used by dry-run reporting.
    fn plan(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget>;

    /// Decide (and if needed create) the transfer target.
    fn prepare(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget>;

    /// Make a successful transfer visible as a snapshot. Returns the
    /// published snapshot path, if one was created.
    fn publish(&self, ctx: &SnapshotContext, target: &TransferTarget)
        -> CaravanResult<Option<String>>;

    /// Clean up after a failed transfer. Best-effort; must leave any
    /// previously published snapshot untouched.
    fn abort(&self, ctx: &SnapshotContext, target: &TransferTarget);

    /// Enforce the retention bound. Failures are per-snapshot
    /// warnings, not errors.
    fn prune(&self, ctx: &SnapshotContext) -> PruneReport;
}

/// Select the strategy for a snapshot mode, once per sync.
pub fn strategy_for(mode: SnapshotMode) -> Option<Box<dyn SnapshotStrategy>> {
    match mode {
        SnapshotMode::None => None,
        SnapshotMode::Btrfs => Some(Box::new(BtrfsStrategy)),
        SnapshotMode::HardLink => Some(Box::new(HardLinkStrategy)),
    }
}

/// Format a snapshot name for a point in time.
pub fn snapshot_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Disambiguate a snapshot name against existing ones. The numeric
/// suffix keeps lexicographic order equal to creation order within a
/// second.
pub fn unique_snapshot_name(existing: &[String], base: &str) -> String {
    if !existing.iter().any(|name| name == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !existing.iter().any(|name| name == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Which snapshot names a retention pass would remove: oldest first,
/// never the one `latest` references, until at most `max` remain.
pub fn prune_candidates(snapshots: &[String], latest: Option<&str>, max: u32) -> Vec<String> {
    let excess = snapshots.len().saturating_sub(max as usize);
    let mut candidates = Vec::new();
    for name in snapshots {
        if candidates.len() >= excess {
            break;
        }
        if latest == Some(name.as_str()) {
            continue;
        }
        candidates.push(name.clone());
    }
    candidates
}

// Pure argv builders shared by the live executor (remote side) and
// the script generator.

pub fn ls_args(dir: &str) -> Vec<String> {
    vec!["ls".to_string(), dir.to_string()]
}

pub fn readlink_args(path: &str) -> Vec<String> {
    vec!["readlink".to_string(), path.to_string()]
}

pub fn mkdir_p_args(path: &str) -> Vec<String> {
    vec!["mkdir".to_string(), "-p".to_string(), path.to_string()]
}

pub fn rm_rf_args(path: &str) -> Vec<String> {
    vec!["rm".to_string(), "-rf".to_string(), path.to_string()]
}

pub fn ln_sfn_args(target: &str, link: &str) -> Vec<String> {
    vec![
        "ln".to_string(),
        "-sfn".to_string(),
        target.to_string(),
        link.to_string(),
    ]
}

/// List snapshot names at the destination, sorted ascending (oldest
/// first). Missing `snapshots/` directory reads as empty.
pub fn list_snapshots(ctx: &SnapshotContext) -> CaravanResult<Vec<String>> {
    let dir = ctx.snapshots_dir();
    let mut names: Vec<String> = match &ctx.shell {
        VolumeShell::Local => match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| !name.starts_with('.'))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        },
        VolumeShell::Remote(_) => {
            let out = ctx.shell.run(&ls_args(&dir))?;
            if !out.status.success() {
                Vec::new()
            } else {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('.'))
                    .map(String::from)
                    .collect()
            }
        }
    };
    names.sort();
    Ok(names)
}

/// Read the `latest` alias target, returning the snapshot name it
/// references, or `None` when no sync ever completed.
pub fn read_latest(ctx: &SnapshotContext) -> Option<String> {
    let latest = ctx.latest_path();
    let target = match &ctx.shell {
        VolumeShell::Local => fs::read_link(&latest).ok()?.to_string_lossy().into_owned(),
        VolumeShell::Remote(_) => {
            let out = ctx.shell.run(&readlink_args(&latest)).ok()?;
            if !out.status.success() {
                return None;
            }
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }
    };
    // Target looks like "snapshots/<name>"; keep the name.
    let name = target.rsplit('/').next().unwrap_or(&target).to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
