//! Sync orchestration: check -> transfer -> publish -> prune
//!
//! Each sync runs to completion before the next starts, in dependency
//! order. A sync's failure never aborts the run; it is recorded on the
//! outcome and the next sync proceeds. Dry-run builds every command
//! and reports what would run without spawning rsync or touching
//! snapshots.

use std::collections::BTreeMap;
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::check::{SyncReason, SyncStatus};
use crate::config::{Config, SyncConfig};
use crate::error::CaravanResult;
use crate::remote::{EndpointResolution, VolumeShell};
use crate::sync::ordering::sort_syncs;
use crate::sync::rsync::{build_rsync_command, resolve_path, BuildOptions, ProgressMode};
use crate::sync::snapshot::{
    list_snapshots, prune_candidates, read_latest, strategy_for, PruneWarning, SnapshotContext,
    TransferTarget,
};

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Prune after successful publication (on by default).
    pub no_prune: bool,
    pub progress: ProgressMode,
    /// Restrict to these sync slugs.
    pub only: Option<Vec<String>>,
    /// Set by the signal handler; no further sync starts once raised.
    /// The in-flight transfer dies with the signal and takes the
    /// normal failure exit, so nothing half-done is ever published.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Terminal state of one sync in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Skipped,
    Succeeded,
    Failed,
}

/// Per-sync result record. Produced once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub slug: String,
    pub status: OutcomeStatus,
    pub dry_run: bool,
    /// Why the sync was skipped (empty otherwise).
    pub reasons: Vec<SyncReason>,
    /// The transfer command that ran (or would run).
    pub command: Option<Vec<String>>,
    pub rsync_exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    pub duration_secs: f64,
    /// Path of the snapshot published by this run.
    pub snapshot: Option<String>,
    /// Paths of snapshots removed by retention.
    pub pruned: Vec<String>,
    pub prune_warnings: Vec<PruneWarning>,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn skipped(slug: &str, dry_run: bool, reasons: Vec<SyncReason>) -> Self {
        Self {
            slug: slug.to_string(),
            status: OutcomeStatus::Skipped,
            dry_run,
            reasons,
            command: None,
            rsync_exit_code: None,
            output: String::new(),
            duration_secs: 0.0,
            snapshot: None,
            pruned: Vec::new(),
            prune_warnings: Vec::new(),
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Observer hooks for progress reporting. All methods default to
/// no-ops so renderers implement only what they need.
pub trait RunObserver {
    fn sync_started(&mut self, _slug: &str) {}
    fn sync_finished(&mut self, _outcome: &SyncOutcome) {}
}

/// Observer that ignores everything (JSON mode, tests).
pub struct NullObserver;

impl RunObserver for NullObserver {}

/// Run all (or selected) syncs in dependency order.
///
/// Expects pre-computed statuses from [`crate::check::check_all`].
pub fn run_all_syncs(
    config: &Config,
    statuses: &BTreeMap<String, SyncStatus>,
    resolution: &EndpointResolution,
    options: &RunOptions,
    observer: &mut dyn RunObserver,
) -> CaravanResult<Vec<SyncOutcome>> {
    let selected: Vec<&SyncConfig> = config
        .syncs
        .values()
        .filter(|s| statuses.contains_key(&s.slug))
        .filter(|s| {
            options
                .only
                .as_ref()
                .is_none_or(|names| names.contains(&s.slug))
        })
        .collect();
    let ordered = sort_syncs(&selected)?;

    let mut outcomes = Vec::with_capacity(ordered.len());
    for slug in ordered {
        if options
            .cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::SeqCst))
        {
            break;
        }
        observer.sync_started(&slug);
        let status = &statuses[&slug];
        let outcome = if status.active {
            run_single_sync(&config.syncs[&slug], config, resolution, options)
        } else {
            SyncOutcome::skipped(&slug, options.dry_run, status.reasons.clone())
        };
        observer.sync_finished(&outcome);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn run_single_sync(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    options: &RunOptions,
) -> SyncOutcome {
    let mut outcome = SyncOutcome {
        status: OutcomeStatus::Failed,
        ..SyncOutcome::skipped(&sync.slug, options.dry_run, Vec::new())
    };

    let dest_vol = match config.volume(&sync.destination.volume) {
        Ok(v) => v,
        Err(e) => {
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    let Some(shell) = VolumeShell::for_volume(dest_vol, resolution) else {
        // An active sync always has a resolved destination; this is a
        // belt-and-braces guard.
        outcome.error = Some(format!(
            "destination volume '{}' has no resolved endpoint",
            dest_vol.slug()
        ));
        return outcome;
    };

    let ctx = SnapshotContext {
        sync_slug: &sync.slug,
        dest_path: resolve_path(dest_vol, sync.destination.subdir.as_deref()),
        shell,
        max_snapshots: sync.destination.max_snapshots(),
        now: Utc::now(),
    };
    let strategy = strategy_for(sync.destination.snapshot_mode());

    // 1. Pick the transfer target (dry-run: read-only planning).
    let target = match &strategy {
        Some(s) => {
            let prepared = if options.dry_run {
                s.plan(&ctx)
            } else {
                s.prepare(&ctx)
            };
            match prepared {
                Ok(t) => t,
                Err(e) => {
                    outcome.error = Some(e.to_string());
                    return outcome;
                }
            }
        }
        None => TransferTarget::default(),
    };

    // 2. Build the transfer command.
    let build = BuildOptions {
        link_dest: target.link_dest.clone(),
        dest_suffix: target.dest_suffix.clone(),
        progress: options.progress,
    };
    let cmd = match build_rsync_command(sync, config, resolution, &build) {
        Ok(cmd) => cmd,
        Err(e) => {
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    outcome.command = Some(cmd.clone());

    if options.dry_run {
        outcome.status = OutcomeStatus::Succeeded;
        return outcome;
    }

    // 3. Transfer.
    let started = Instant::now();
    let streamed = options.progress != ProgressMode::None;
    let (exit, output) = match execute_transfer(&cmd, streamed) {
        Ok(result) => result,
        Err(e) => {
            if let Some(s) = &strategy {
                s.abort(&ctx, &target);
            }
            outcome.error = Some(format!("failed to spawn {}: {e}", cmd[0]));
            return outcome;
        }
    };
    outcome.duration_secs = started.elapsed().as_secs_f64();
    outcome.rsync_exit_code = exit.code();
    outcome.output = output;

    if !exit.success() {
        if let Some(s) = &strategy {
            s.abort(&ctx, &target);
        }
        outcome.error = Some(format!(
            "rsync exited with code {}",
            exit.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
        ));
        return outcome;
    }

    // 4. Publish.
    if let Some(s) = &strategy {
        match s.publish(&ctx, &target) {
            Ok(published) => outcome.snapshot = published,
            Err(e) => {
                // The partial snapshot (if any) is left for the next
                // run's orphan sweep; latest is untouched.
                outcome.error = Some(e.to_string());
                return outcome;
            }
        }

        // 5. Prune.
        if !options.no_prune {
            let report = s.prune(&ctx);
            outcome.pruned = report.removed;
            outcome.prune_warnings = report.warnings;
        }
    }

    outcome.status = OutcomeStatus::Succeeded;
    outcome
}

fn execute_transfer(cmd: &[String], streamed: bool) -> io::Result<(ExitStatus, String)> {
    let mut command = Command::new(&cmd[0]);
    command.args(&cmd[1..]);
    if streamed {
        // Progress output goes straight to the terminal.
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok((status, String::new()))
    } else {
        let out = command.stdin(Stdio::null()).output()?;
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok((out.status, text))
    }
}

/// Result of a retention-only maintenance pass on one sync.
#[derive(Debug, Clone, Serialize)]
pub struct PruneOutcome {
    pub slug: String,
    pub deleted: Vec<String>,
    pub kept: usize,
    pub dry_run: bool,
    pub warnings: Vec<PruneWarning>,
}

/// Prune snapshots for every active sync with a retention bound. This
/// is the maintenance pass that resolves deletions a run reported as
/// warnings.
pub fn prune_all_syncs(
    config: &Config,
    statuses: &BTreeMap<String, SyncStatus>,
    resolution: &EndpointResolution,
    dry_run: bool,
    only: Option<&[String]>,
) -> CaravanResult<Vec<PruneOutcome>> {
    let mut outcomes = Vec::new();
    for (slug, status) in statuses {
        if only.is_some_and(|names| !names.iter().any(|n| n == slug)) {
            continue;
        }
        if !status.active {
            continue;
        }
        let sync = &config.syncs[slug];
        let Some(max) = sync.destination.max_snapshots() else {
            continue;
        };
        let Some(strategy) = strategy_for(sync.destination.snapshot_mode()) else {
            continue;
        };
        let dest_vol = config.volume(&sync.destination.volume)?;
        let Some(shell) = VolumeShell::for_volume(dest_vol, resolution) else {
            continue;
        };
        let ctx = SnapshotContext {
            sync_slug: slug,
            dest_path: resolve_path(dest_vol, sync.destination.subdir.as_deref()),
            shell,
            max_snapshots: Some(max),
            now: Utc::now(),
        };

        let outcome = if dry_run {
            let snapshots = list_snapshots(&ctx)?;
            let latest = read_latest(&ctx);
            let candidates = prune_candidates(&snapshots, latest.as_deref(), max);
            let kept = snapshots.len() - candidates.len();
            PruneOutcome {
                slug: slug.clone(),
                deleted: candidates
                    .into_iter()
                    .map(|name| format!("{}/{name}", ctx.snapshots_dir()))
                    .collect(),
                kept,
                dry_run,
                warnings: Vec::new(),
            }
        } else {
            let report = strategy.prune(&ctx);
            let remaining = list_snapshots(&ctx).map(|s| s.len()).unwrap_or(0);
            PruneOutcome {
                slug: slug.clone(),
                deleted: report.removed,
                kept: remaining,
                dry_run,
                warnings: report.warnings,
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
