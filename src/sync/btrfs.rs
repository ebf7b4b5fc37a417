//! Btrfs snapshot strategy
//!
//! The transfer always writes into the stable `latest/` subvolume, so
//! unchanged files are never rewritten; publication takes a read-only
//! copy-on-write snapshot of it. A failed transfer leaves `latest/`
//! partially updated but never touches snapshot history.

use crate::error::{CaravanError, CaravanResult};
use crate::sync::snapshot::{
    list_snapshots, prune_candidates, read_latest, snapshot_timestamp, unique_snapshot_name,
    PruneReport, PruneWarning, SnapshotContext, SnapshotStrategy, TransferTarget,
};

pub struct BtrfsStrategy;

/// `btrfs subvolume snapshot -r <latest> <snapshot>`
pub fn snapshot_create_args(latest: &str, snapshot_path: &str) -> Vec<String> {
    vec![
        "btrfs".to_string(),
        "subvolume".to_string(),
        "snapshot".to_string(),
        "-r".to_string(),
        latest.to_string(),
        snapshot_path.to_string(),
    ]
}

/// Unset the read-only property so a snapshot can be deleted without
/// CAP_SYS_ADMIN on filesystems mounted with user_subvol_rm_allowed.
pub fn property_rw_args(path: &str) -> Vec<String> {
    vec![
        "btrfs".to_string(),
        "property".to_string(),
        "set".to_string(),
        path.to_string(),
        "ro".to_string(),
        "false".to_string(),
    ]
}

/// `btrfs subvolume delete <path>`
pub fn subvolume_delete_args(path: &str) -> Vec<String> {
    vec![
        "btrfs".to_string(),
        "subvolume".to_string(),
        "delete".to_string(),
        path.to_string(),
    ]
}

fn run_tool(ctx: &SnapshotContext, argv: &[String]) -> Result<(), String> {
    match ctx.shell.run(argv) {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(format!(
            "{} failed: {}",
            argv.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        )),
        Err(e) => Err(format!("{} failed: {e}", argv.join(" "))),
    }
}

impl SnapshotStrategy for BtrfsStrategy {
    fn name(&self) -> &'static str {
        "btrfs"
    }

    fn plan(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget> {
        self.prepare(ctx)
    }

    fn prepare(&self, ctx: &SnapshotContext) -> CaravanResult<TransferTarget> {
        // The transfer target is the live tree; no directory to make
        // and no link-dest, since unchanged files stay in place.
        let _ = ctx;
        Ok(TransferTarget {
            dest_suffix: Some("latest".to_string()),
            link_dest: None,
            snapshot_name: None,
        })
    }

    fn publish(
        &self,
        ctx: &SnapshotContext,
        _target: &TransferTarget,
    ) -> CaravanResult<Option<String>> {
        let existing = list_snapshots(ctx)?;
        let name = unique_snapshot_name(&existing, &snapshot_timestamp(ctx.now));
        let snapshot_path = format!("{}/{name}", ctx.snapshots_dir());
        run_tool(ctx, &snapshot_create_args(&ctx.latest_path(), &snapshot_path)).map_err(
            |message| CaravanError::Snapshot {
                sync: ctx.sync_slug.to_string(),
                message,
            },
        )?;
        Ok(Some(snapshot_path))
    }

    fn abort(&self, _ctx: &SnapshotContext, _target: &TransferTarget) {
        // Nothing to clean: the snapshot is only taken after success,
        // and `latest/` being partially updated is the accepted
        // trade-off of this strategy.
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
        // `latest` is a live subvolume here, not an alias into
        // snapshots/, but guard anyway in case one was created.
        let latest = read_latest(ctx);
        for name in prune_candidates(&snapshots, latest.as_deref(), max) {
            let path = format!("{}/{name}", ctx.snapshots_dir());
            let result = run_tool(ctx, &property_rw_args(&path))
                .and_then(|()| run_tool(ctx, &subvolume_delete_args(&path)));
            match result {
                Ok(()) => report.removed.push(path),
                Err(message) => report.warnings.push(PruneWarning { path, message }),
            }
        }
        report
    }
}
