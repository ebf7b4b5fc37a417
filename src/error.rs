//! Error types for Caravan
//!
//! Configuration problems are fatal and abort before any sync runs;
//! everything that can go wrong per-sync (unavailable volumes, transfer
//! failures, snapshot failures) is carried as structured data on the
//! sync outcome instead, so one bad sync never takes down the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Caravan operations
pub type CaravanResult<T> = Result<T, CaravanError>;

/// Main error type for Caravan operations
#[derive(Error, Debug)]
pub enum CaravanError {
    /// No config file at any of the searched locations
    #[error("no config file found, searched: {}", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    ConfigNotFound { searched: Vec<PathBuf> },

    /// Config file exists but does not parse
    #[error("invalid config in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Identifier does not match the slug shape
    #[error("invalid slug '{slug}' for {kind}: must be kebab-case [a-z0-9]+(-[a-z0-9]+)*, 1-50 chars")]
    InvalidSlug { kind: &'static str, slug: String },

    /// An endpoint is missing a required field after `extends`
    /// materialization
    #[error("endpoint '{endpoint}' is missing required field '{field}'")]
    MissingEndpointField {
        endpoint: String,
        field: &'static str,
    },

    /// An endpoint references an unknown endpoint (extends or proxy-jump)
    #[error("endpoint '{endpoint}' references unknown endpoint '{referenced}' via {field}")]
    UnknownEndpoint {
        endpoint: String,
        referenced: String,
        field: &'static str,
    },

    /// A volume references an unknown ssh endpoint
    #[error("volume '{volume}' references unknown ssh-endpoint '{endpoint}'")]
    UnknownVolumeEndpoint { volume: String, endpoint: String },

    /// A sync references an unknown volume
    #[error("sync '{sync}' references unknown {role} volume '{volume}'")]
    UnknownSyncVolume {
        sync: String,
        role: &'static str,
        volume: String,
    },

    /// Circular `extends` chain between endpoints
    #[error("circular extends chain: {}", members.join(" -> "))]
    CyclicExtends { members: Vec<String> },

    /// Circular proxy-jump chain between endpoints
    #[error("circular proxy-jump chain: {}", members.join(" -> "))]
    CyclicProxyJump { members: Vec<String> },

    /// Syncs feed each other's endpoints in a loop
    #[error("cyclic sync dependency: {}", members.join(" -> "))]
    CyclicSyncDependency { members: Vec<String> },

    /// `proxy-jump` and `proxy-jumps` set on the same endpoint
    #[error("endpoint '{endpoint}': proxy-jump and proxy-jumps are mutually exclusive")]
    ProxyJumpExclusive { endpoint: String },

    /// Both snapshot strategies enabled on one sync endpoint
    #[error("sync '{sync}': btrfs-snapshots and hard-link-snapshots are mutually exclusive")]
    SnapshotExclusive { sync: String },

    /// No candidate endpoint for a remote volume survived DNS filtering
    #[error("volume '{volume}': no reachable ssh endpoint among [{}]", candidates.join(", "))]
    NoReachableEndpoint {
        volume: String,
        candidates: Vec<String>,
    },

    /// Snapshot creation or publication failed for a sync
    #[error("sync '{sync}': snapshot operation failed: {message}")]
    Snapshot { sync: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaravanError {
    /// Whether this error is a configuration error (exit code 2
    /// territory, reported before any sync runs).
    pub fn is_config(&self) -> bool {
        !matches!(
            self,
            Self::NoReachableEndpoint { .. } | Self::Snapshot { .. } | Self::Io(_)
        )
    }
}
