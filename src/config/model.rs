//! Typed configuration records
//!
//! These are the immutable records the rest of Caravan consumes: ssh
//! endpoints (already materialized through `extends`), volumes, and
//! syncs. Raw deserialization shapes live here too; the load-time
//! validation that turns them into a [`Config`] is in
//! [`crate::config::resolve`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CaravanError, CaravanResult};

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_port() -> u16 {
    22
}

/// Check an identifier against the slug shape:
/// `[a-z0-9]+(-[a-z0-9]+)*`, 1-50 characters.
pub fn is_valid_slug(s: &str) -> bool {
    if s.is_empty() || s.len() > 50 {
        return false;
    }
    let mut prev_dash = true; // leading dash is invalid
    for c in s.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_dash = false,
            '-' if !prev_dash => prev_dash = true,
            _ => return false,
        }
    }
    !prev_dash // trailing dash is invalid
}

/// SSH connection options, mapped 1:1 onto ssh(1) `-o` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionOptions {
    /// ssh: ConnectTimeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    /// ssh: Compression
    #[serde(default)]
    pub compress: bool,

    /// ssh: ServerAliveInterval
    #[serde(default)]
    pub server_alive_interval: Option<u32>,

    /// ssh: StrictHostKeyChecking
    #[serde(default = "default_true")]
    pub strict_host_key_checking: bool,

    /// ssh: UserKnownHostsFile
    #[serde(default)]
    pub known_hosts_file: Option<String>,

    /// ssh: ForwardAgent
    #[serde(default)]
    pub forward_agent: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            compress: false,
            server_alive_interval: None,
            strict_host_key_checking: true,
            known_hosts_file: None,
            forward_agent: false,
        }
    }
}

/// Raw endpoint as written in the config file.
///
/// Every field is optional so that `extends` children can leave gaps
/// for the parent to fill. [`crate::config::resolve`] materializes
/// these into [`Endpoint`] records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointSpec {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub connection_options: Option<ConnectionOptions>,
    #[serde(default)]
    pub proxy_jump: Option<String>,
    #[serde(default)]
    pub proxy_jumps: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub extends: Option<String>,
}

/// A fully-materialized ssh endpoint (inheritance resolved, cycles
/// rejected). Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Endpoint {
    pub slug: String,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub key: Option<String>,
    pub connection_options: ConnectionOptions,
    /// Bastion chain, in hop order. Empty when connecting directly.
    pub proxy_jumps: Vec<String>,
    pub location: Option<String>,
}

impl Endpoint {
    pub fn default_port() -> u16 {
        default_port()
    }
}

/// A local filesystem volume, proven intentional by its marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalVolume {
    #[serde(default)]
    pub slug: String,
    pub path: String,
}

/// A volume reachable over ssh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteVolume {
    #[serde(default)]
    pub slug: String,
    /// Primary endpoint, used when no candidate list is declared.
    pub ssh_endpoint: String,
    /// Ordered candidate endpoints for run-time selection.
    #[serde(default)]
    pub ssh_endpoints: Option<Vec<String>>,
    pub path: String,
}

impl RemoteVolume {
    /// Candidate endpoints in declared order (singleton primary when
    /// no list is given).
    pub fn candidates(&self) -> Vec<&str> {
        match &self.ssh_endpoints {
            Some(list) if !list.is_empty() => list.iter().map(String::as_str).collect(),
            _ => vec![self.ssh_endpoint.as_str()],
        }
    }
}

/// A storage location eligible to be a sync endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Volume {
    Local(LocalVolume),
    Remote(RemoteVolume),
}

impl Volume {
    pub fn slug(&self) -> &str {
        match self {
            Volume::Local(v) => &v.slug,
            Volume::Remote(v) => &v.slug,
        }
    }

    pub(crate) fn set_slug(&mut self, slug: &str) {
        match self {
            Volume::Local(v) => v.slug = slug.to_string(),
            Volume::Remote(v) => v.slug = slug.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Volume::Local(v) => &v.path,
            Volume::Remote(v) => &v.path,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Volume::Remote(_))
    }
}

/// Snapshot strategy settings on a sync endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_snapshots: Option<u32>,
}

/// Which snapshot strategy a sync endpoint uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotMode {
    None,
    Btrfs,
    HardLink,
}

/// One side of a sync: a volume reference plus an optional subdir and
/// snapshot settings. Sources with snapshots enabled are read from
/// their `latest/` tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncEndpoint {
    pub volume: String,
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default)]
    pub btrfs_snapshots: SnapshotConfig,
    #[serde(default)]
    pub hard_link_snapshots: SnapshotConfig,
}

impl SyncEndpoint {
    pub fn snapshot_mode(&self) -> SnapshotMode {
        if self.btrfs_snapshots.enabled {
            SnapshotMode::Btrfs
        } else if self.hard_link_snapshots.enabled {
            SnapshotMode::HardLink
        } else {
            SnapshotMode::None
        }
    }

    pub fn max_snapshots(&self) -> Option<u32> {
        match self.snapshot_mode() {
            SnapshotMode::Btrfs => self.btrfs_snapshots.max_snapshots,
            SnapshotMode::HardLink => self.hard_link_snapshots.max_snapshots,
            SnapshotMode::None => None,
        }
    }

    /// Identity of the storage location this endpoint addresses, used
    /// for sync dependency ordering.
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.volume.as_str(), self.subdir.as_deref())
    }
}

/// A filter rule: either a raw rsync filter string or a structured
/// include/exclude pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRule {
    Raw(String),
    Include { include: String },
    Exclude { exclude: String },
}

impl FilterRule {
    /// Normalize to the rsync filter-rule syntax.
    pub fn render(&self) -> String {
        match self {
            FilterRule::Raw(rule) => rule.clone(),
            FilterRule::Include { include } => format!("+ {include}"),
            FilterRule::Exclude { exclude } => format!("- {exclude}"),
        }
    }
}

/// A configured source→destination sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    #[serde(default)]
    pub slug: String,
    pub source: SyncEndpoint,
    pub destination: SyncEndpoint,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Full replacement for the default rsync flag set.
    #[serde(default)]
    pub rsync_options: Option<Vec<String>>,
    /// Flags appended after the (default or overridden) flag set.
    #[serde(default)]
    pub extra_rsync_options: Vec<String>,
    /// Filter rules in declaration order.
    #[serde(default)]
    pub filters: Vec<FilterRule>,
    /// Merged external filter file, applied after inline rules.
    #[serde(default)]
    pub filter_file: Option<String>,
}

/// Raw top-level config file shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(default)]
    pub ssh_endpoints: BTreeMap<String, EndpointSpec>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Volume>,
    #[serde(default)]
    pub syncs: BTreeMap<String, SyncConfig>,
}

/// Validated, materialized configuration. Construction goes through
/// [`crate::config::resolve::validate`], which guarantees every cross
/// reference below resolves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub ssh_endpoints: BTreeMap<String, Endpoint>,
    pub volumes: BTreeMap<String, Volume>,
    pub syncs: BTreeMap<String, SyncConfig>,
}

impl Config {
    pub fn endpoint(&self, slug: &str) -> CaravanResult<&Endpoint> {
        self.ssh_endpoints
            .get(slug)
            .ok_or_else(|| CaravanError::UnknownEndpoint {
                endpoint: String::new(),
                referenced: slug.to_string(),
                field: "lookup",
            })
    }

    pub fn volume(&self, slug: &str) -> CaravanResult<&Volume> {
        self.volumes
            .get(slug)
            .ok_or_else(|| CaravanError::UnknownSyncVolume {
                sync: String::new(),
                role: "referenced",
                volume: slug.to_string(),
            })
    }

    /// Proxy chain for an endpoint, in hop order.
    pub fn proxy_chain(&self, endpoint: &Endpoint) -> CaravanResult<Vec<Endpoint>> {
        endpoint
            .proxy_jumps
            .iter()
            .map(|slug| self.endpoint(slug).cloned())
            .collect()
    }
}
