//! Availability checking for volumes and syncs
//!
//! A volume proves it is intentionally designated by carrying a marker
//! file; a sync additionally requires role markers at its source and
//! destination paths. Anything missing makes the sync inactive for
//! this invocation — never an error, since volumes coming and going is
//! the expected steady state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::{Config, SyncConfig, Volume};
use crate::error::CaravanResult;
use crate::remote::{EndpointResolution, VolumeShell};
use crate::sync::rsync::resolve_path;

/// Marker proving a directory is an intentional caravan volume.
pub const VOLUME_MARKER: &str = ".caravan-vol";
/// Marker proving a sync path is an intended source.
pub const SOURCE_MARKER: &str = ".caravan-src";
/// Marker proving a sync path is an intended destination.
pub const DEST_MARKER: &str = ".caravan-dst";

/// Why a volume is (un)available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeReason {
    Ok,
    PathMissing,
    NotADirectory,
    MarkerNotFound,
    EndpointUnresolved,
    Unreachable,
}

/// Availability of one volume.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStatus {
    pub slug: String,
    pub available: bool,
    pub reason: VolumeReason,
}

impl VolumeStatus {
    fn new(slug: &str, reason: VolumeReason) -> Self {
        Self {
            slug: slug.to_string(),
            available: reason == VolumeReason::Ok,
            reason,
        }
    }
}

/// Why a sync is inactive. Empty reasons = runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncReason {
    Disabled,
    SourceUnavailable,
    DestinationUnavailable,
    SourceMarkerNotFound,
    DestinationMarkerNotFound,
}

/// Runnability of one sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub slug: String,
    pub active: bool,
    pub reasons: Vec<SyncReason>,
    pub source: VolumeStatus,
    pub destination: VolumeStatus,
}

/// Check one volume: path + marker locally, resolution + reachability
/// + marker over ssh.
pub fn check_volume(volume: &Volume, resolution: &EndpointResolution) -> VolumeStatus {
    match volume {
        Volume::Local(local) => {
            let path = Path::new(&local.path);
            if !path.exists() {
                return VolumeStatus::new(&local.slug, VolumeReason::PathMissing);
            }
            if !path.is_dir() {
                return VolumeStatus::new(&local.slug, VolumeReason::NotADirectory);
            }
            if !path.join(VOLUME_MARKER).exists() {
                return VolumeStatus::new(&local.slug, VolumeReason::MarkerNotFound);
            }
            VolumeStatus::new(&local.slug, VolumeReason::Ok)
        }
        Volume::Remote(remote) => {
            let Some(shell) = VolumeShell::for_volume(volume, resolution) else {
                return VolumeStatus::new(&remote.slug, VolumeReason::EndpointUnresolved);
            };
            let marker = format!("{}/{VOLUME_MARKER}", remote.path);
            let argv = vec!["test".to_string(), "-f".to_string(), marker];
            match shell.run(&argv) {
                Ok(out) if out.status.success() => {
                    VolumeStatus::new(&remote.slug, VolumeReason::Ok)
                }
                // ssh itself failing (exit 255) means we never reached
                // the host; any other nonzero exit is the test failing.
                Ok(out) if out.status.code() == Some(255) => {
                    VolumeStatus::new(&remote.slug, VolumeReason::Unreachable)
                }
                Ok(_) => VolumeStatus::new(&remote.slug, VolumeReason::MarkerNotFound),
                Err(_) => VolumeStatus::new(&remote.slug, VolumeReason::Unreachable),
            }
        }
    }
}

/// Check a role marker at a sync path.
fn check_role_marker(
    volume: &Volume,
    subdir: Option<&str>,
    marker: &str,
    resolution: &EndpointResolution,
) -> bool {
    let marker_path = format!("{}/{marker}", resolve_path(volume, subdir));
    match volume {
        Volume::Local(_) => Path::new(&marker_path).exists(),
        Volume::Remote(_) => match VolumeShell::for_volume(volume, resolution) {
            Some(shell) => shell.probe(&[
                "test".to_string(),
                "-f".to_string(),
                marker_path,
            ]),
            None => false,
        },
    }
}

/// Check one sync against pre-computed volume statuses.
pub fn check_sync(
    sync: &SyncConfig,
    config: &Config,
    volume_statuses: &BTreeMap<String, VolumeStatus>,
    resolution: &EndpointResolution,
) -> CaravanResult<SyncStatus> {
    let src_status = volume_statuses[&sync.source.volume].clone();
    let dst_status = volume_statuses[&sync.destination.volume].clone();

    let mut reasons = Vec::new();
    if !sync.enabled {
        reasons.push(SyncReason::Disabled);
    }
    if !src_status.available {
        reasons.push(SyncReason::SourceUnavailable);
    }
    if !dst_status.available {
        reasons.push(SyncReason::DestinationUnavailable);
    }

    // Role markers are only meaningful on volumes we can reach.
    if src_status.available {
        let src_vol = config.volume(&sync.source.volume)?;
        if !check_role_marker(
            src_vol,
            sync.source.subdir.as_deref(),
            SOURCE_MARKER,
            resolution,
        ) {
            reasons.push(SyncReason::SourceMarkerNotFound);
        }
    }
    if dst_status.available {
        let dst_vol = config.volume(&sync.destination.volume)?;
        if !check_role_marker(
            dst_vol,
            sync.destination.subdir.as_deref(),
            DEST_MARKER,
            resolution,
        ) {
            reasons.push(SyncReason::DestinationMarkerNotFound);
        }
    }

    Ok(SyncStatus {
        slug: sync.slug.clone(),
        active: reasons.is_empty(),
        reasons,
        source: src_status,
        destination: dst_status,
    })
}

/// Check all volumes and syncs, caching volume checks across syncs.
///
/// When `only` is given, just those syncs (and the volumes they
/// reference) are checked.
pub fn check_all(
    config: &Config,
    resolution: &EndpointResolution,
    only: Option<&[String]>,
) -> CaravanResult<(BTreeMap<String, VolumeStatus>, BTreeMap<String, SyncStatus>)> {
    let selected: Vec<&SyncConfig> = config
        .syncs
        .values()
        .filter(|s| only.is_none_or(|names| names.contains(&s.slug)))
        .collect();

    let mut volume_statuses: BTreeMap<String, VolumeStatus> = BTreeMap::new();
    for (slug, volume) in &config.volumes {
        let referenced = only.is_none()
            || selected
                .iter()
                .any(|s| &s.source.volume == slug || &s.destination.volume == slug);
        if referenced {
            volume_statuses.insert(slug.clone(), check_volume(volume, resolution));
        }
    }

    let mut sync_statuses = BTreeMap::new();
    for sync in selected {
        let status = check_sync(sync, config, &volume_statuses, resolution)?;
        sync_statuses.insert(sync.slug.clone(), status);
    }
    Ok((volume_statuses, sync_statuses))
}
