//! Rsync command building
//!
//! Pure argv construction for every local/remote topology. Nothing in
//! this module performs I/O: the orchestrator executes the result, the
//! script generator serializes it, and both therefore agree on every
//! flag for any given configuration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{Config, SnapshotMode, SyncConfig, SyncEndpoint, Volume};
use crate::error::CaravanResult;
use crate::remote::{
    build_ssh_base_args, build_ssh_e_option, format_remote_path, quote_command,
    EndpointResolution,
};

/// Default rsync flag set: archive mode with deletion propagation,
/// resumable partials, safe symlink handling, and marker protection.
pub const DEFAULT_RSYNC_OPTIONS: [&str; 7] = [
    "-a",
    "--delete",
    "--delete-excluded",
    "--partial-dir=.caravan-partial",
    "--safe-links",
    "--filter=P .caravan-*",
    "--exclude=.caravan-*",
];

/// Rsync progress reporting mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressMode {
    #[default]
    None,
    Overall,
    PerFile,
    Full,
}

impl ProgressMode {
    /// The rsync flags this mode maps to.
    pub fn flags(self) -> Vec<String> {
        let flags: &[&str] = match self {
            ProgressMode::None => &[],
            ProgressMode::Overall => &["--info=progress2", "--stats", "--human-readable"],
            ProgressMode::PerFile => &["-v", "--progress", "--human-readable"],
            ProgressMode::Full => &[
                "-v",
                "--progress",
                "--info=progress2",
                "--stats",
                "--human-readable",
            ],
        };
        flags.iter().map(|s| s.to_string()).collect()
    }
}

/// Knobs injected by the snapshot strategy and the CLI.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// `--link-dest` base, relative to the transfer destination.
    pub link_dest: Option<String>,
    /// Subpath under the destination sync path (`latest` or
    /// `snapshots/<name>`).
    pub dest_suffix: Option<String>,
    pub progress: ProgressMode,
}

/// Resolve the full path for a volume with an optional subdir.
pub fn resolve_path(volume: &Volume, subdir: Option<&str>) -> String {
    match subdir {
        Some(sub) => format!("{}/{sub}", volume.path()),
        None => volume.path().to_string(),
    }
}

/// Resolve a source path, reading from `latest/` when the source
/// endpoint is itself snapshotted.
pub fn resolve_source_path(volume: &Volume, source: &SyncEndpoint) -> String {
    let base = resolve_path(volume, source.subdir.as_deref());
    if source.snapshot_mode() != SnapshotMode::None {
        format!("{base}/latest")
    } else {
        base
    }
}

fn base_rsync_args(sync: &SyncConfig, opts: &BuildOptions) -> Vec<String> {
    let mut args = vec!["rsync".to_string()];
    match &sync.rsync_options {
        Some(options) => args.extend(options.iter().cloned()),
        None => args.extend(DEFAULT_RSYNC_OPTIONS.iter().map(|s| s.to_string())),
    }
    args.extend(sync.extra_rsync_options.iter().cloned());
    args.extend(opts.progress.flags());
    if let Some(link_dest) = &opts.link_dest {
        args.push(format!("--link-dest={link_dest}"));
    }
    args
}

fn filter_args(sync: &SyncConfig) -> Vec<String> {
    let mut args: Vec<String> = sync
        .filters
        .iter()
        .map(|rule| format!("--filter={}", rule.render()))
        .collect();
    if let Some(file) = &sync.filter_file {
        args.push(format!("--filter=merge {file}"));
    }
    args
}

fn dest_target(dst_path: &str, dest_suffix: Option<&str>) -> String {
    match dest_suffix {
        Some(suffix) => format!("{dst_path}/{suffix}/"),
        None => format!("{dst_path}/"),
    }
}

/// Build the rsync invocation for a sync, choosing the topology
/// variant from the resolved volume pair.
pub fn build_rsync_command(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    opts: &BuildOptions,
) -> CaravanResult<Vec<String>> {
    let src_vol = config.volume(&sync.source.volume)?;
    let dst_vol = config.volume(&sync.destination.volume)?;
    let src_path = resolve_source_path(src_vol, &sync.source);
    let dst_path = resolve_path(dst_vol, sync.destination.subdir.as_deref());

    let mut rsync_args = base_rsync_args(sync, opts);
    rsync_args.extend(filter_args(sync));

    match (src_vol, dst_vol) {
        (Volume::Remote(sv), Volume::Remote(dv)) => {
            let src_ep = resolution.require(&sv.slug)?;
            let dst_ep = resolution.require(&dv.slug)?;
            if src_ep.server.slug == dst_ep.server.slug {
                // One hop: run rsync on the endpoint with two local
                // paths, so data never round-trips the controller.
                rsync_args.push(format!("{src_path}/"));
                rsync_args.push(dest_target(&dst_path, opts.dest_suffix.as_deref()));
                let mut cmd = build_ssh_base_args(&dst_ep.server, &dst_ep.proxy_chain);
                cmd.push(quote_command(&rsync_args));
                Ok(cmd)
            } else {
                // Push from the source endpoint to the destination
                // endpoint over the far side's own ssh transport.
                rsync_args.extend(build_ssh_e_option(&dst_ep.server, &dst_ep.proxy_chain));
                rsync_args.push(format!("{src_path}/"));
                let dst_remote = format_remote_path(&dst_ep.server, &dst_path);
                rsync_args.push(dest_target(&dst_remote, opts.dest_suffix.as_deref()));
                let mut cmd = build_ssh_base_args(&src_ep.server, &src_ep.proxy_chain);
                cmd.push(quote_command(&rsync_args));
                Ok(cmd)
            }
        }
        (Volume::Remote(sv), Volume::Local(_)) => {
            let src_ep = resolution.require(&sv.slug)?;
            rsync_args.extend(build_ssh_e_option(&src_ep.server, &src_ep.proxy_chain));
            rsync_args.push(format!(
                "{}/",
                format_remote_path(&src_ep.server, &src_path)
            ));
            rsync_args.push(dest_target(&dst_path, opts.dest_suffix.as_deref()));
            Ok(rsync_args)
        }
        (Volume::Local(_), Volume::Remote(dv)) => {
            let dst_ep = resolution.require(&dv.slug)?;
            rsync_args.extend(build_ssh_e_option(&dst_ep.server, &dst_ep.proxy_chain));
            rsync_args.push(format!("{src_path}/"));
            let dst_remote = format_remote_path(&dst_ep.server, &dst_path);
            rsync_args.push(dest_target(&dst_remote, opts.dest_suffix.as_deref()));
            Ok(rsync_args)
        }
        (Volume::Local(_), Volume::Local(_)) => {
            rsync_args.push(format!("{src_path}/"));
            rsync_args.push(dest_target(&dst_path, opts.dest_suffix.as_deref()));
            Ok(rsync_args)
        }
    }
}
