//! Standalone shell script generation
//!
//! Compiles a configuration into a self-contained POSIX shell script
//! that performs the same sync operations as `caravan run`, with all
//! topology decisions baked in at generation time. The script reuses
//! the exact argv builders the live orchestrator executes, so the two
//! renderers cannot diverge; only `--dry-run` and `--progress` remain
//! runtime choices of the script itself.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::check::{DEST_MARKER, SOURCE_MARKER, VOLUME_MARKER};
use crate::config::{Config, SnapshotMode, SyncConfig, Volume};
use crate::error::CaravanResult;
use crate::remote::{
    build_ssh_base_args, quote_command, EndpointResolution, ResolvedEndpoint,
};
use crate::sync::ordering::sort_syncs;
use crate::sync::rsync::{build_rsync_command, BuildOptions, ProgressMode};
use crate::sync::btrfs;
use crate::sync::snapshot::{ln_sfn_args, ls_args, mkdir_p_args, readlink_args, rm_rf_args};

/// Options for script generation.
#[derive(Debug, Clone, Default)]
pub struct ScriptOptions {
    /// Config path recorded in the header comment.
    pub config_path: Option<PathBuf>,
    /// Where the script will live; required for relative paths.
    pub output_file: Option<PathBuf>,
    /// Rewrite local source volume paths relative to the script.
    pub relative_src: bool,
    /// Rewrite local destination volume paths relative to the script.
    pub relative_dst: bool,
}

/// Generate a standalone backup shell script.
pub fn generate_script(
    config: &Config,
    resolution: &EndpointResolution,
    options: &ScriptOptions,
    now: DateTime<Utc>,
) -> CaravanResult<String> {
    let vol_paths = build_vol_paths(config, options);
    let has_script_dir = vol_paths.values().any(|p| p.contains('$'));

    let mut out = String::new();
    render_header(&mut out, options, now);
    render_runtime(&mut out, has_script_dir);

    out.push_str("# Volume checks (informational)\n");
    for (slug, volume) in &config.volumes {
        out.push_str(&volume_check_line(slug, volume, &vol_paths, resolution)?);
        out.push('\n');
    }
    out.push('\n');

    let selected: Vec<&SyncConfig> = config.syncs.values().collect();
    let ordered = sort_syncs(&selected)?;
    for slug in &ordered {
        let sync = &config.syncs[slug];
        if sync.enabled {
            out.push_str(&render_sync_function(sync, config, resolution, &vol_paths)?);
        } else {
            out.push_str(&render_disabled_function(sync, config, resolution, &vol_paths)?);
        }
        out.push('\n');
    }

    render_main(&mut out, &ordered);
    Ok(out)
}

// ── Shell formatting helpers ─────────────────────────────────

/// Shell-quote (single quotes, no variable expansion).
fn sq(s: &str) -> String {
    shlex::try_quote(s)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Quote a path; double-quote when it embeds a runtime variable.
fn qp(s: &str) -> String {
    if s.contains('$') {
        format!("\"{s}\"")
    } else {
        sq(s)
    }
}

fn slug_to_fn(slug: &str) -> String {
    format!("sync_{}", slug.replace('-', "_"))
}

/// Format an argv with backslash continuations.
fn format_shell_command(cmd: &[String], cont_indent: &str) -> String {
    let parts: Vec<String> = cmd.iter().map(|a| qp(a)).collect();
    if parts.len() <= 3 {
        return parts.join(" ");
    }
    let sep = format!(" \\\n{cont_indent}");
    let mut result = parts[0].clone();
    result.push_str(&sep);
    result.push_str(&parts[1..].join(&sep));
    result
}

/// Shell expression running an argv on a resolved remote endpoint.
fn remote_expr(ep: &ResolvedEndpoint, argv: &[String]) -> String {
    let ssh = build_ssh_base_args(&ep.server, &ep.proxy_chain);
    let prefix: Vec<String> = ssh.iter().map(|a| sq(a)).collect();
    format!("{} {}", prefix.join(" "), sq(&quote_command(argv)))
}

/// Shell expression running an argv on a volume, local or remote.
/// Remote arguments may embed `$var` references meant to expand on
/// the controller; those are passed through double-quoted.
fn volume_expr(
    volume: &Volume,
    argv: &[String],
    resolution: &EndpointResolution,
) -> CaravanResult<String> {
    match volume {
        Volume::Local(_) => Ok(argv
            .iter()
            .map(|a| qp(a))
            .collect::<Vec<_>>()
            .join(" ")),
        Volume::Remote(remote) => {
            let ep = resolution.require(&remote.slug)?;
            if argv.iter().any(|a| a.contains('$')) {
                let ssh = build_ssh_base_args(&ep.server, &ep.proxy_chain);
                let prefix: Vec<String> = ssh.iter().map(|a| sq(a)).collect();
                Ok(format!("{} \"{}\"", prefix.join(" "), argv.join(" ")))
            } else {
                Ok(remote_expr(ep, argv))
            }
        }
    }
}

// ── Path helpers ─────────────────────────────────────────────

/// A relative path from `base_dir` to `target` (both absolute).
fn relative_path(target: &Path, base_dir: &Path) -> PathBuf {
    let target_parts: Vec<Component> = target.components().collect();
    let base_parts: Vec<Component> = base_dir.components().collect();
    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &target_parts[common..] {
        rel.push(part);
    }
    rel
}

/// Compute volume slug -> effective path, applying relativization for
/// local volumes when requested.
fn build_vol_paths(config: &Config, options: &ScriptOptions) -> BTreeMap<String, String> {
    let src_slugs: Vec<&str> = config
        .syncs
        .values()
        .map(|s| s.source.volume.as_str())
        .collect();
    let dst_slugs: Vec<&str> = config
        .syncs
        .values()
        .map(|s| s.destination.volume.as_str())
        .collect();

    let mut vol_paths = BTreeMap::new();
    for (slug, volume) in &config.volumes {
        let path = match volume {
            Volume::Remote(v) => v.path.clone(),
            Volume::Local(v) => {
                let relativize = (src_slugs.contains(&slug.as_str()) && options.relative_src)
                    || (dst_slugs.contains(&slug.as_str()) && options.relative_dst);
                match (&options.output_file, relativize) {
                    (Some(output), true) => {
                        let output_dir = output.parent().unwrap_or(Path::new("."));
                        let rel = relative_path(Path::new(&v.path), output_dir);
                        format!("${{CARAVAN_SCRIPT_DIR}}/{}", rel.display())
                    }
                    _ => v.path.clone(),
                }
            }
        };
        vol_paths.insert(slug.clone(), path);
    }
    vol_paths
}

fn vol_path(vol_paths: &BTreeMap<String, String>, slug: &str, subdir: Option<&str>) -> String {
    let base = &vol_paths[slug];
    match subdir {
        Some(sub) => format!("{base}/{sub}"),
        None => base.clone(),
    }
}

/// Replace a local volume's absolute path prefix with its effective
/// (possibly script-relative) path.
fn substitute_vol_path(
    arg: &str,
    volume: &Volume,
    vol_paths: &BTreeMap<String, String>,
) -> String {
    match volume {
        Volume::Remote(_) => arg.to_string(),
        Volume::Local(v) => arg.replacen(&v.path, &vol_paths[v.slug.as_str()], 1),
    }
}

// ── Script sections ──────────────────────────────────────────

fn render_header(out: &mut String, options: &ScriptOptions, now: DateTime<Utc>) {
    let timestamp = now.format("%Y-%m-%dT%H:%M:%SZ");
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!("# Generated by caravan at {timestamp}\n"));
    match &options.config_path {
        Some(path) => out.push_str(&format!("# Config: {}\n", path.display())),
        None => out.push_str("# Config: <default search path>\n"),
    }
    out.push_str(
        "#\n\
         # Self-contained backup script. All paths, endpoints and\n\
         # snapshot policies are baked in; regenerate after config\n\
         # changes.\n\n",
    );
}

fn render_runtime(out: &mut String, has_script_dir: bool) {
    out.push_str(
        "set -u\n\
         \n\
         CARAVAN_DRY_RUN=false\n\
         RSYNC_DRY_RUN_FLAG=\"\"\n\
         RSYNC_PROGRESS_FLAGS=\"\"\n\
         \n\
         usage() {\n\
         \x20   echo \"usage: $0 [-n|--dry-run] [-p|--progress none|overall|per-file|full]\" >&2\n\
         \x20   exit 2\n\
         }\n\
         \n\
         while [ $# -gt 0 ]; do\n\
         \x20   case \"$1\" in\n\
         \x20       -n|--dry-run)\n\
         \x20           CARAVAN_DRY_RUN=true\n\
         \x20           RSYNC_DRY_RUN_FLAG=\"--dry-run\"\n\
         \x20           ;;\n\
         \x20       -p|--progress)\n\
         \x20           shift\n\
         \x20           case \"${1:-}\" in\n\
         \x20               none) RSYNC_PROGRESS_FLAGS=\"\" ;;\n\
         \x20               overall) RSYNC_PROGRESS_FLAGS=\"--info=progress2 --stats --human-readable\" ;;\n\
         \x20               per-file) RSYNC_PROGRESS_FLAGS=\"-v --progress --human-readable\" ;;\n\
         \x20               full) RSYNC_PROGRESS_FLAGS=\"-v --progress --info=progress2 --stats --human-readable\" ;;\n\
         \x20               *) usage ;;\n\
         \x20           esac\n\
         \x20           ;;\n\
         \x20       *) usage ;;\n\
         \x20   esac\n\
         \x20   shift\n\
         done\n\
         \n\
         caravan_log() {\n\
         \x20   printf '%s %s\\n' \"$(date -u +%Y-%m-%dT%H:%M:%SZ)\" \"$*\"\n\
         }\n\n",
    );
    if has_script_dir {
        out.push_str("CARAVAN_SCRIPT_DIR=$(cd \"$(dirname \"$0\")\" && pwd)\n\n");
    }
}

fn volume_check_line(
    slug: &str,
    volume: &Volume,
    vol_paths: &BTreeMap<String, String>,
    resolution: &EndpointResolution,
) -> CaravanResult<String> {
    let marker = format!("{}/{VOLUME_MARKER}", vol_paths[slug]);
    let test = volume_expr(
        volume,
        &["test".to_string(), "-f".to_string(), marker.clone()],
        resolution,
    )?;
    Ok(format!(
        "{test} || caravan_log \"WARN: volume {slug}: marker {marker} not found\""
    ))
}

fn check_line(
    volume: &Volume,
    test_args: &[String],
    error_msg: &str,
    resolution: &EndpointResolution,
) -> CaravanResult<String> {
    let mut argv = vec!["test".to_string()];
    argv.extend(test_args.iter().cloned());
    let cmd = volume_expr(volume, &argv, resolution)?;
    Ok(format!(
        "{cmd} || {{ caravan_log \"ERROR: {error_msg}\"; return 1; }}"
    ))
}

fn which_line(
    volume: &Volume,
    tool: &str,
    error_msg: &str,
    resolution: &EndpointResolution,
) -> CaravanResult<String> {
    let cmd = match volume {
        Volume::Local(_) => format!("command -v {} >/dev/null 2>&1", sq(tool)),
        Volume::Remote(remote) => {
            let ep = resolution.require(&remote.slug)?;
            format!(
                "{} >/dev/null 2>&1",
                remote_expr(ep, &["which".to_string(), tool.to_string()])
            )
        }
    };
    Ok(format!(
        "{cmd} || {{ caravan_log \"ERROR: {error_msg}\"; return 1; }}"
    ))
}

fn preflight_lines(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
) -> CaravanResult<Vec<String>> {
    let src_vol = config.volume(&sync.source.volume)?;
    let dst_vol = config.volume(&sync.destination.volume)?;
    let src_path = vol_path(vol_paths, &sync.source.volume, sync.source.subdir.as_deref());
    let dst_path = vol_path(
        vol_paths,
        &sync.destination.volume,
        sync.destination.subdir.as_deref(),
    );

    let mut lines = Vec::new();
    let src_marker = format!("{src_path}/{SOURCE_MARKER}");
    lines.push(check_line(
        src_vol,
        &["-f".to_string(), src_marker.clone()],
        &format!("source marker {src_marker} not found"),
        resolution,
    )?);

    if sync.source.snapshot_mode() != SnapshotMode::None {
        for dir in ["latest", "snapshots"] {
            let path = format!("{src_path}/{dir}");
            lines.push(check_line(
                src_vol,
                &["-d".to_string(), path.clone()],
                &format!("source {dir}/ not found ({path})"),
                resolution,
            )?);
        }
    }

    let dst_marker = format!("{dst_path}/{DEST_MARKER}");
    lines.push(check_line(
        dst_vol,
        &["-f".to_string(), dst_marker.clone()],
        &format!("destination marker {dst_marker} not found"),
        resolution,
    )?);

    lines.push(which_line(
        src_vol,
        "rsync",
        "rsync not found on source",
        resolution,
    )?);
    lines.push(which_line(
        dst_vol,
        "rsync",
        "rsync not found on destination",
        resolution,
    )?);

    if sync.destination.snapshot_mode() == SnapshotMode::Btrfs {
        lines.push(which_line(
            dst_vol,
            "btrfs",
            "btrfs not found on destination",
            resolution,
        )?);
        for dir in ["latest", "snapshots"] {
            let path = format!("{dst_path}/{dir}");
            lines.push(check_line(
                dst_vol,
                &["-d".to_string(), path.clone()],
                &format!("destination {dir}/ not found ({path})"),
                resolution,
            )?);
        }
    }
    Ok(lines)
}

fn rsync_block(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
    dest_suffix: Option<&str>,
    has_link_dest: bool,
) -> CaravanResult<String> {
    let build = BuildOptions {
        link_dest: None,
        dest_suffix: dest_suffix.map(String::from),
        progress: ProgressMode::None,
    };
    let mut cmd = build_rsync_command(sync, config, resolution, &build)?;

    let src_vol = config.volume(&sync.source.volume)?;
    let dst_vol = config.volume(&sync.destination.volume)?;
    if !(src_vol.is_remote() && dst_vol.is_remote()) {
        let n = cmd.len();
        cmd[n - 2] = substitute_vol_path(&cmd[n - 2], src_vol, vol_paths);
        cmd[n - 1] = substitute_vol_path(&cmd[n - 1], dst_vol, vol_paths);
    }

    let indent = "    ";
    let formatted = format_shell_command(&cmd, indent);
    let mut runtime_vars = Vec::new();
    if has_link_dest {
        runtime_vars.push("${RSYNC_LINK_DEST:+\"$RSYNC_LINK_DEST\"}");
    }
    runtime_vars.push("${RSYNC_DRY_RUN_FLAG:+\"$RSYNC_DRY_RUN_FLAG\"}");
    runtime_vars.push("$RSYNC_PROGRESS_FLAGS");
    Ok(format!(
        "{formatted} \\\n{indent}{}",
        runtime_vars.join(&format!(" \\\n{indent}"))
    ))
}

struct SyncBlocks {
    preflight: Vec<String>,
    orphan_cleanup: Option<String>,
    link_dest: Option<String>,
    hl_mkdir: Option<String>,
    rsync: String,
    btrfs_snapshot: Option<String>,
    hl_symlink: Option<String>,
    prune: Option<String>,
    max_snapshots: Option<u32>,
}

fn build_sync_blocks(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
) -> CaravanResult<SyncBlocks> {
    let dst_vol = config.volume(&sync.destination.volume)?;
    let dest_path = vol_path(
        vol_paths,
        &sync.destination.volume,
        sync.destination.subdir.as_deref(),
    );
    let snaps_dir = format!("{dest_path}/snapshots");
    let latest_path = format!("{dest_path}/latest");
    let mode = sync.destination.snapshot_mode();
    let max_snapshots = sync.destination.max_snapshots();

    let preflight = preflight_lines(sync, config, resolution, vol_paths)?;
    let ls_expr = volume_expr(dst_vol, &ls_args(&snaps_dir), resolution)?;
    let readlink_expr = volume_expr(dst_vol, &readlink_args(&latest_path), resolution)?;

    let mut blocks = SyncBlocks {
        preflight,
        orphan_cleanup: None,
        link_dest: None,
        hl_mkdir: None,
        rsync: String::new(),
        btrfs_snapshot: None,
        hl_symlink: None,
        prune: None,
        max_snapshots,
    };

    match mode {
        SnapshotMode::HardLink => {
            let rm_expr = volume_expr(
                dst_vol,
                &rm_rf_args(&format!("{snaps_dir}/$snap")),
                resolution,
            )?;
            blocks.orphan_cleanup = Some(format!(
                "CARAVAN_LATEST_LINK=$({readlink_expr} 2>/dev/null || true)\n\
                 if [ -n \"$CARAVAN_LATEST_LINK\" ]; then\n\
                 \x20   CARAVAN_LATEST_NAME=\"${{CARAVAN_LATEST_LINK##*/}}\"\n\
                 \x20   for snap in $({ls_expr} 2>/dev/null | sort); do\n\
                 \x20       if [ \"$snap\" \\> \"$CARAVAN_LATEST_NAME\" ] && [ \"$CARAVAN_DRY_RUN\" = false ]; then\n\
                 \x20           caravan_log \"Removing orphaned snapshot: $snap\"\n\
                 \x20           {rm_expr}\n\
                 \x20       fi\n\
                 \x20   done\n\
                 fi"
            ));
            blocks.link_dest = Some(format!(
                "CARAVAN_LATEST_SNAP=$({ls_expr} 2>/dev/null | sort | tail -1)\n\
                 RSYNC_LINK_DEST=\"\"\n\
                 if [ -n \"$CARAVAN_LATEST_SNAP\" ]; then\n\
                 \x20   RSYNC_LINK_DEST=\"--link-dest=../$CARAVAN_LATEST_SNAP\"\n\
                 fi"
            ));
            let mkdir_expr = volume_expr(
                dst_vol,
                &mkdir_p_args(&format!("{snaps_dir}/$CARAVAN_TS")),
                resolution,
            )?;
            blocks.hl_mkdir = Some(format!(
                "CARAVAN_TS=$(date -u +%Y-%m-%dT%H:%M:%SZ)\n{mkdir_expr}"
            ));
            blocks.rsync = rsync_block(
                sync,
                config,
                resolution,
                vol_paths,
                Some("snapshots/$CARAVAN_TS"),
                true,
            )?;
            let ln_expr = volume_expr(
                dst_vol,
                &ln_sfn_args("snapshots/$CARAVAN_TS", &latest_path),
                resolution,
            )?;
            blocks.hl_symlink = Some(format!(
                "if [ \"$CARAVAN_DRY_RUN\" = false ]; then\n\x20   {ln_expr}\nfi"
            ));
            if let Some(max) = max_snapshots {
                let rm_expr = volume_expr(
                    dst_vol,
                    &rm_rf_args(&format!("{snaps_dir}/$snap")),
                    resolution,
                )?;
                blocks.prune = Some(prune_block(
                    &ls_expr,
                    Some(&readlink_expr),
                    &format!(
                        "caravan_log \"Pruning snapshot: $snap\"\n\
                         \x20               {rm_expr}"
                    ),
                    max,
                ));
            }
        }
        SnapshotMode::Btrfs => {
            blocks.rsync =
                rsync_block(sync, config, resolution, vol_paths, Some("latest"), false)?;
            let snap_expr = volume_expr(
                dst_vol,
                &btrfs::snapshot_create_args(&latest_path, &format!("{snaps_dir}/$CARAVAN_TS")),
                resolution,
            )?;
            blocks.btrfs_snapshot = Some(format!(
                "if [ \"$CARAVAN_DRY_RUN\" = false ]; then\n\
                 \x20   CARAVAN_TS=$(date -u +%Y-%m-%dT%H:%M:%SZ)\n\
                 \x20   {snap_expr}\n\
                 fi"
            ));
            if let Some(max) = max_snapshots {
                let prop_expr = volume_expr(
                    dst_vol,
                    &btrfs::property_rw_args(&format!("{snaps_dir}/$snap")),
                    resolution,
                )?;
                let del_expr = volume_expr(
                    dst_vol,
                    &btrfs::subvolume_delete_args(&format!("{snaps_dir}/$snap")),
                    resolution,
                )?;
                blocks.prune = Some(prune_block(
                    &ls_expr,
                    None,
                    &format!(
                        "caravan_log \"Pruning snapshot: $snap\"\n\
                         \x20               {prop_expr}\n\
                         \x20               {del_expr}"
                    ),
                    max,
                ));
            }
        }
        SnapshotMode::None => {
            blocks.rsync = rsync_block(sync, config, resolution, vol_paths, None, false)?;
        }
    }
    Ok(blocks)
}

fn prune_block(ls_expr: &str, readlink_expr: Option<&str>, delete_lines: &str, max: u32) -> String {
    let latest_guard = match readlink_expr {
        Some(expr) => format!(
            "\x20   CARAVAN_LATEST_LINK=$({expr} 2>/dev/null || true)\n\
             \x20   CARAVAN_LATEST_NAME=\"${{CARAVAN_LATEST_LINK##*/}}\"\n"
        ),
        None => "\x20   CARAVAN_LATEST_NAME=\"\"\n".to_string(),
    };
    format!(
        "if [ \"$CARAVAN_DRY_RUN\" = false ]; then\n\
         \x20   CARAVAN_SNAPS=$({ls_expr} 2>/dev/null | sort)\n\
         \x20   CARAVAN_COUNT=$(printf '%s\\n' \"$CARAVAN_SNAPS\" | grep -c . || true)\n\
         \x20   CARAVAN_EXCESS=$((CARAVAN_COUNT - {max}))\n\
         {latest_guard}\
         \x20   if [ \"$CARAVAN_EXCESS\" -gt 0 ]; then\n\
         \x20       printf '%s\\n' \"$CARAVAN_SNAPS\" | head -n \"$CARAVAN_EXCESS\" | while IFS= read -r snap; do\n\
         \x20           if [ -n \"$snap\" ] && [ \"$snap\" != \"$CARAVAN_LATEST_NAME\" ]; then\n\
         \x20               {delete_lines}\n\
         \x20           fi\n\
         \x20       done\n\
         \x20   fi\n\
         fi"
    )
}

fn push_block(out: &mut String, comment: &str, block: &str) {
    out.push('\n');
    out.push_str(&format!("    # {comment}\n"));
    for line in block.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn render_sync_body(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
) -> CaravanResult<String> {
    let blocks = build_sync_blocks(sync, config, resolution, vol_paths)?;
    let mut out = String::new();
    out.push_str(&format!("{}() {{\n", slug_to_fn(&sync.slug)));
    out.push_str(&format!(
        "    caravan_log \"Starting sync: {}\"\n",
        sync.slug
    ));

    push_block(&mut out, "Pre-flight checks", &blocks.preflight.join("\n"));
    if let Some(block) = &blocks.orphan_cleanup {
        push_block(&mut out, "Remove orphaned snapshots", block);
    }
    if let Some(block) = &blocks.link_dest {
        push_block(&mut out, "Link-dest resolution (newest snapshot)", block);
    }
    if let Some(block) = &blocks.hl_mkdir {
        push_block(&mut out, "Create snapshot directory", block);
    }
    push_block(&mut out, "Transfer", &blocks.rsync);
    if let Some(block) = &blocks.btrfs_snapshot {
        push_block(&mut out, "Btrfs snapshot (skipped on dry-run)", block);
    }
    if let Some(block) = &blocks.hl_symlink {
        push_block(&mut out, "Publish latest (skipped on dry-run)", block);
    }
    if let Some(block) = &blocks.prune {
        let max = blocks.max_snapshots.unwrap_or(0);
        push_block(
            &mut out,
            &format!("Prune old snapshots (max: {max})"),
            block,
        );
    }

    out.push('\n');
    out.push_str(&format!(
        "    caravan_log \"Completed sync: {}\"\n",
        sync.slug
    ));
    out.push_str("}\n");
    Ok(out)
}

fn render_sync_function(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
) -> CaravanResult<String> {
    render_sync_body(sync, config, resolution, vol_paths)
}

/// Disabled syncs are emitted inert: the function only logs, and the
/// real body follows commented out for reference.
fn render_disabled_function(
    sync: &SyncConfig,
    config: &Config,
    resolution: &EndpointResolution,
    vol_paths: &BTreeMap<String, String>,
) -> CaravanResult<String> {
    let mut enabled = sync.clone();
    enabled.enabled = true;
    let body = render_sync_body(&enabled, config, resolution, vol_paths)?;
    let commented: String = body
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect();
    Ok(format!(
        "{}() {{\n    caravan_log \"Skipping disabled sync: {}\"\n}}\n# Disabled; body kept for reference:\n{commented}",
        slug_to_fn(&sync.slug),
        sync.slug
    ))
}

fn render_main(out: &mut String, ordered: &[String]) {
    out.push_str("main() {\n");
    out.push_str("    caravan_log \"Caravan backup starting\"\n");
    out.push_str(
        "    if [ \"$CARAVAN_DRY_RUN\" = true ]; then\n\
         \x20       caravan_log \"Dry-run mode: no data will be written\"\n\
         \x20   fi\n",
    );
    out.push_str("    FAILURES=0\n");
    for slug in ordered {
        out.push_str(&format!(
            "    {} || FAILURES=$((FAILURES + 1))\n",
            slug_to_fn(slug)
        ));
    }
    out.push_str(
        "    if [ \"$FAILURES\" -gt 0 ]; then\n\
         \x20       caravan_log \"Completed with $FAILURES failed sync(s)\"\n\
         \x20       exit 1\n\
         \x20   fi\n\
         \x20   caravan_log \"All syncs completed\"\n\
         }\n\
         \n\
         main\n",
    );
}
