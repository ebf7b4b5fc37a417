//! Human-readable output rendering
//!
//! The core returns structured records; this module is the only place
//! that turns them into terminal text. JSON output is rendered by the
//! command layer straight from the same records, so both formats
//! always agree.

use is_terminal::IsTerminal;

use crate::check::{SyncReason, SyncStatus, VolumeReason, VolumeStatus};
use crate::config::{Config, Volume};
use crate::error::CaravanError;
use crate::remote::EndpointResolution;
use crate::sync::{OutcomeStatus, PruneOutcome, RunObserver, SyncOutcome};

/// Icons for output rendering
pub struct Icons {
    pub check: &'static str,
    pub cross: &'static str,
    pub skip: &'static str,
    pub warn: &'static str,
}

impl Icons {
    pub fn unicode() -> Self {
        Self {
            check: "✓",
            cross: "✗",
            skip: "○",
            warn: "⚠",
        }
    }

    pub fn ascii() -> Self {
        Self {
            check: "[OK]",
            cross: "[FAIL]",
            skip: "[SKIP]",
            warn: "[WARN]",
        }
    }

    /// Unicode when stdout is an interactive terminal.
    pub fn auto() -> Self {
        if std::io::stdout().is_terminal() {
            Self::unicode()
        } else {
            Self::ascii()
        }
    }
}

fn volume_reason_text(reason: VolumeReason) -> &'static str {
    match reason {
        VolumeReason::Ok => "available",
        VolumeReason::PathMissing => "path does not exist",
        VolumeReason::NotADirectory => "path is not a directory",
        VolumeReason::MarkerNotFound => "volume marker not found",
        VolumeReason::EndpointUnresolved => "no reachable ssh endpoint",
        VolumeReason::Unreachable => "ssh connection failed",
    }
}

fn sync_reason_text(reason: SyncReason) -> &'static str {
    match reason {
        SyncReason::Disabled => "disabled",
        SyncReason::SourceUnavailable => "source unavailable",
        SyncReason::DestinationUnavailable => "destination unavailable",
        SyncReason::SourceMarkerNotFound => "source marker not found",
        SyncReason::DestinationMarkerNotFound => "destination marker not found",
    }
}

/// Render volume and sync statuses.
pub fn print_check<'a>(
    volumes: impl Iterator<Item = &'a VolumeStatus>,
    syncs: impl Iterator<Item = &'a SyncStatus>,
    icons: &Icons,
) {
    println!("Volumes:");
    for status in volumes {
        let icon = if status.available {
            icons.check
        } else {
            icons.cross
        };
        println!(
            "  {icon} {} - {}",
            status.slug,
            volume_reason_text(status.reason)
        );
    }
    println!();
    println!("Syncs:");
    for status in syncs {
        if status.active {
            println!("  {} {} - ready", icons.check, status.slug);
        } else {
            let reasons: Vec<&str> = status
                .reasons
                .iter()
                .map(|r| sync_reason_text(*r))
                .collect();
            println!("  {} {} - {}", icons.skip, status.slug, reasons.join(", "));
        }
    }
}

/// Render per-sync run outcomes and a summary line.
pub fn print_run_results(outcomes: &[SyncOutcome], dry_run: bool, icons: &Icons) {
    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Succeeded => {
                println!("  {} {}", icons.check, outcome.slug);
                if let Some(snapshot) = &outcome.snapshot {
                    println!("      snapshot: {snapshot}");
                }
                for path in &outcome.pruned {
                    println!("      pruned: {path}");
                }
                for warning in &outcome.prune_warnings {
                    println!(
                        "      {} prune failed: {} ({})",
                        icons.warn, warning.path, warning.message
                    );
                }
                if dry_run {
                    if let Some(cmd) = &outcome.command {
                        println!("      would run: {}", cmd.join(" "));
                    }
                }
            }
            OutcomeStatus::Skipped => {
                let reasons: Vec<&str> = outcome
                    .reasons
                    .iter()
                    .map(|r| sync_reason_text(*r))
                    .collect();
                println!(
                    "  {} {} - skipped ({})",
                    icons.skip,
                    outcome.slug,
                    reasons.join(", ")
                );
            }
            OutcomeStatus::Failed => {
                println!(
                    "  {} {} - {}",
                    icons.cross,
                    outcome.slug,
                    outcome.error.as_deref().unwrap_or("failed")
                );
            }
        }
    }

    let succeeded = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Succeeded)
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Skipped)
        .count();
    let failed = outcomes.iter().filter(|o| o.failed()).count();
    println!();
    let suffix = if dry_run { " (dry run)" } else { "" };
    println!("Summary: {succeeded} succeeded, {skipped} skipped, {failed} failed{suffix}");
}

/// Render prune outcomes.
pub fn print_prune_results(outcomes: &[PruneOutcome], icons: &Icons) {
    if outcomes.is_empty() {
        println!("Nothing to prune.");
        return;
    }
    for outcome in outcomes {
        let verb = if outcome.dry_run {
            "would delete"
        } else {
            "deleted"
        };
        println!(
            "  {} {}: {} {} snapshot(s), {} kept",
            icons.check,
            outcome.slug,
            verb,
            outcome.deleted.len(),
            outcome.kept
        );
        for path in &outcome.deleted {
            println!("      - {path}");
        }
        for warning in &outcome.warnings {
            println!(
                "      {} {} ({})",
                icons.warn, warning.path, warning.message
            );
        }
    }
}

/// Render the validated configuration.
pub fn print_config(config: &Config, resolution: &EndpointResolution) {
    if !config.ssh_endpoints.is_empty() {
        println!("SSH endpoints:");
        for (slug, endpoint) in &config.ssh_endpoints {
            let mut extras = Vec::new();
            if let Some(location) = &endpoint.location {
                extras.push(format!("location={location}"));
            }
            if !endpoint.proxy_jumps.is_empty() {
                extras.push(format!("via {}", endpoint.proxy_jumps.join(",")));
            }
            let extras = if extras.is_empty() {
                String::new()
            } else {
                format!(" ({})", extras.join(", "))
            };
            println!(
                "  {slug}: {}@{}:{}{extras}",
                endpoint.user.as_deref().unwrap_or("-"),
                endpoint.host,
                endpoint.port
            );
        }
        println!();
    }

    println!("Volumes:");
    for (slug, volume) in &config.volumes {
        match volume {
            Volume::Local(v) => println!("  {slug}: local {}", v.path),
            Volume::Remote(v) => {
                let endpoint = resolution
                    .get(slug)
                    .map(|r| r.server.slug.clone())
                    .unwrap_or_else(|| format!("{} (unresolved)", v.ssh_endpoint));
                println!("  {slug}: remote {}:{}", endpoint, v.path);
            }
        }
    }
    println!();

    println!("Syncs:");
    for (slug, sync) in &config.syncs {
        let mode = format!("{:?}", sync.destination.snapshot_mode()).to_lowercase();
        let enabled = if sync.enabled { "" } else { " [disabled]" };
        println!(
            "  {slug}: {} -> {} (snapshots: {mode}){enabled}",
            sync.source.volume, sync.destination.volume
        );
    }
}

/// Render a fatal configuration error.
pub fn print_config_error(err: &CaravanError) {
    eprintln!("Configuration error: {err}");
}

/// Observer printing live progress during `caravan run`.
pub struct TextObserver {
    icons: Icons,
}

impl TextObserver {
    pub fn new(icons: Icons) -> Self {
        Self { icons }
    }
}

impl RunObserver for TextObserver {
    fn sync_started(&mut self, slug: &str) {
        println!("Syncing {slug}...");
    }

    fn sync_finished(&mut self, outcome: &SyncOutcome) {
        let icon = match outcome.status {
            OutcomeStatus::Succeeded => self.icons.check,
            OutcomeStatus::Skipped => self.icons.skip,
            OutcomeStatus::Failed => self.icons.cross,
        };
        println!("{icon} {}", outcome.slug);
    }
}
