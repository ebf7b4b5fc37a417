//! Hard-link snapshot strategy
//!
//! The transfer writes directly into a fresh `snapshots/<ts>/`
//! directory, hard-linking unchanged content from the previous
//! snapshot via `--link-dest`. Publication is a single atomic repoint
//! of the `latest` alias; a failed transfer leaves only an orphaned
//! directory that the next run's sweep removes.

use std::fs;

use crate::error::{CaravanError, CaravanResult};
use crate::remote::VolumeShell;
use crate::sync::snapshot::{
    list_snapshots, ln_sfn_args, mkdir_p_args, prune_candidates, read_latest, rm_rf_args,
    snapshot_timestamp, unique_snapshot_name, PruneReport, PruneWarning, SnapshotContext,
    SnapshotStrategy, TransferTarget,
};

pub struct HardLinkStrategy;

impl SnapshotStrategy for HardLinkStrategy {
    fn name(&self) -> &'static str {
        "hard-link"
    }

    fn plan(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget> {
        let existing = list_snapshots(ctx)?;
        let link_dest = existing.last().map(|newest| format!("../{newest}"));
        let name = unique_snapshot_name(&existing, &snapshot_timestamp(ctx.now));
        Ok(TransferTarget {
            dest_suffix: Some(format!("snapshots/{name}")),
            link_dest,
            snapshot_name: Some(name),
        })
    }

    fn prepare(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget> {
        // Crash recovery first: drop leftovers of failed runs.
        let _ = sweep_orphans(ctx);

        let existing = list_snapshots(ctx)?;
        let link_dest = existing.last().map(|newest| format!("../{newest}"));
        let name = unique_snapshot_name(&existing, &snapshot_timestamp(ctx.now));
        let snapshot_path = format!("{}/{name}", ctx.snapshots_dir());
        create_dir(ctx, &snapshot_path)?;

        Ok(TransferTarget {
            dest_suffix: Some(format!("snapshots/{name}")),
            link_dest,
            snapshot_name: Some(name),
        })
    }

    fn publish(
        &self,
        ctx: &SnapshotContext,
        target: &TransferTarget,
    ) -> CaravanResult<Option<String>> {
        let Some(name) = &target.snapshot_name else {
            return Ok(None);
        };
        update_latest(ctx, name)?;
        Ok(Some(format!("{}/{name}", ctx.snapshots_dir())))
    }

    fn abort(&self, ctx: &SnapshotContext, target: &TransferTarget) {
        if let Some(name) = &target.snapshot_name {
            let path = format!("{}/{name}", ctx.snapshots_dir());
            let _ = delete_snapshot(ctx, &path);
        }
    }

    fn prune(&self, ctx: &SnapshotContext) -> PruneReport {
        let mut report = PruneReport::default();
        let Some(max) = ctx.max_snapshots else {
            return report;
        };
        let snapshots = match list_snapshots(ctx) {
            Ok(s) => s,
            Err(e) => {
                report.warnings.push(PruneWarning {
                    path: ctx.snapshots_dir(),
                    message: e.to_string(),
                });
                return report;
            }
        };
        let latest = read_latest(ctx);
        for name in prune_candidates(&snapshots, latest.as_deref(), max) {
            let path = format!("{}/{name}", ctx.snapshots_dir());
            match delete_snapshot(ctx, &path) {
                Ok(()) => report.removed.push(path),
                Err(message) => report.warnings.push(PruneWarning { path, message }),
            }
        }
        report
    }
}

/// Remove snapshot directories newer than the `latest` target. These
/// can only be leftovers of runs that failed before publication.
pub fn sweep_orphans(ctx: &SnapshotContext) -> CaravanResult<Vec<String>> {
    let Some(latest) = read_latest(ctx) else {
        return Ok(Vec::new());
    };
    let mut removed = Vec::new();
    for name in list_snapshots(ctx)? {
        if name.as_str() > latest.as_str() {
            let path = format!("{}/{name}", ctx.snapshots_dir());
            if delete_snapshot(ctx, &path).is_ok() {
                removed.push(path);
            }
        }
    }
    Ok(removed)
}

fn create_dir(ctx: &SnapshotContext, path: &str) -> CaravanResult<()> {
    match &ctx.shell {
        VolumeShell::Local => fs::create_dir_all(path).map_err(|e| CaravanError::Snapshot {
            sync: ctx.sync_slug.to_string(),
            message: format!("mkdir {path} failed: {e}"),
        }),
        VolumeShell::Remote(_) => {
            let out = ctx.shell.run(&mkdir_p_args(path))?;
            if out.status.success() {
                Ok(())
            } else {
                Err(CaravanError::Snapshot {
                    sync: ctx.sync_slug.to_string(),
                    message: format!(
                        "mkdir {path} failed: {}",
                        String::from_utf8_lossy(&out.stderr).trim()
                    ),
                })
            }
        }
    }
}

/// Repoint the `latest` alias at a snapshot.
///
/// Locally this is symlink-to-a-temp-name plus `rename()`, which
/// replaces the alias in one atomic step; remotely `ln -sfn` is the
/// closest primitive plain ssh offers.
fn update_latest(ctx: &SnapshotContext, snapshot_name: &str) -> CaravanResult<()> {
    let target = format!("snapshots/{snapshot_name}");
    let latest = ctx.latest_path();
    match &ctx.shell {
        VolumeShell::Local => {
            let tmp = format!("{}/.latest.tmp", ctx.dest_path);
            let _ = fs::remove_file(&tmp);
            std::os::unix::fs::symlink(&target, &tmp).map_err(|e| CaravanError::Snapshot {
                sync: ctx.sync_slug.to_string(),
                message: format!("symlink {tmp} failed: {e}"),
            })?;
            fs::rename(&tmp, &latest).map_err(|e| CaravanError::Snapshot {
                sync: ctx.sync_slug.to_string(),
                message: format!("latest repoint failed: {e}"),
            })
        }
        VolumeShell::Remote(_) => {
            let out = ctx.shell.run(&ln_sfn_args(&target, &latest))?;
            if out.status.success() {
                Ok(())
            } else {
                Err(CaravanError::Snapshot {
                    sync: ctx.sync_slug.to_string(),
                    message: format!(
                        "latest repoint failed: {}",
                        String::from_utf8_lossy(&out.stderr).trim()
                    ),
                })
            }
        }
    }
}

/// Delete one hard-link snapshot directory.
pub fn delete_snapshot(ctx: &SnapshotContext, path: &str) -> Result<(), String> {
    match &ctx.shell {
        VolumeShell::Local => fs::remove_dir_all(path).map_err(|e| e.to_string()),
        VolumeShell::Remote(_) => match ctx.shell.run(&rm_rf_args(path)) {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(String::from_utf8_lossy(&out.stderr).trim().to_string()),
            Err(e) => Err(e.to_string()),
        },
    }
}
