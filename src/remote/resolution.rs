//! Endpoint resolution: pick one ssh endpoint per remote volume
//!
//! Resolution happens once per invocation and the result is handed to
//! every component (checks, transfers, snapshots, script generation),
//! so a volume never flips endpoints mid-run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{Config, Endpoint, RemoteVolume, Volume};
use crate::error::{CaravanError, CaravanResult};
use crate::net;

/// Preferred network reachability for endpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPreference {
    Private,
    Public,
}

/// Run-time endpoint selection hints.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    /// Keep candidates at any of these locations (unless none match).
    pub locations: Vec<String>,
    /// Prefer private (LAN) or public (WAN) endpoints.
    pub network: Option<NetworkPreference>,
}

impl EndpointFilter {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.network.is_none()
    }
}

/// An endpoint picked for a volume, with its proxy chain materialized.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEndpoint {
    pub server: Endpoint,
    pub proxy_chain: Vec<Endpoint>,
}

/// Per-volume resolution results for one invocation.
#[derive(Debug, Default)]
pub struct EndpointResolution {
    resolved: BTreeMap<String, ResolvedEndpoint>,
    /// Volume slug -> candidate endpoints that all failed DNS.
    unresolved: BTreeMap<String, Vec<String>>,
}

impl EndpointResolution {
    pub fn get(&self, volume_slug: &str) -> Option<&ResolvedEndpoint> {
        self.resolved.get(volume_slug)
    }

    /// The endpoint for a volume, or the structured resolution error.
    pub fn require(&self, volume_slug: &str) -> CaravanResult<&ResolvedEndpoint> {
        self.resolved
            .get(volume_slug)
            .ok_or_else(|| CaravanError::NoReachableEndpoint {
                volume: volume_slug.to_string(),
                candidates: self
                    .unresolved
                    .get(volume_slug)
                    .cloned()
                    .unwrap_or_default(),
            })
    }

    pub fn failed_candidates(&self, volume_slug: &str) -> Option<&[String]> {
        self.unresolved.get(volume_slug).map(Vec::as_slice)
    }
}

/// DNS probe signature: `Some(is_private)` when the host resolves,
/// `None` when it does not. Injectable for tests.
pub type HostProbe<'a> = &'a dyn Fn(&str) -> Option<bool>;

/// Select one endpoint for a remote volume.
///
/// Candidates whose host does not resolve are dropped first; the
/// location and network hints then narrow the set, but never to
/// emptiness (a hint that matches nothing is ignored). The first
/// survivor in declared order wins. An empty set after DNS filtering
/// is a [`CaravanError::NoReachableEndpoint`].
pub fn select_endpoint(
    config: &Config,
    volume: &RemoteVolume,
    filter: &EndpointFilter,
    probe: HostProbe,
) -> CaravanResult<Endpoint> {
    let candidates = volume.candidates();

    let mut reachable: Vec<(&str, bool)> = Vec::new();
    for slug in &candidates {
        let endpoint = config.endpoint(slug)?;
        if let Some(is_private) = probe(&endpoint.host) {
            reachable.push((*slug, is_private));
        }
    }
    if reachable.is_empty() {
        return Err(CaravanError::NoReachableEndpoint {
            volume: volume.slug.clone(),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        });
    }

    if !filter.locations.is_empty() {
        let by_location: Vec<(&str, bool)> = reachable
            .iter()
            .filter(|(slug, _)| {
                config
                    .ssh_endpoints
                    .get(*slug)
                    .and_then(|e| e.location.as_ref())
                    .is_some_and(|loc| filter.locations.contains(loc))
            })
            .copied()
            .collect();
        if !by_location.is_empty() {
            reachable = by_location;
        }
    }

    if let Some(network) = filter.network {
        let want_private = network == NetworkPreference::Private;
        let by_network: Vec<(&str, bool)> = reachable
            .iter()
            .filter(|(_, is_private)| *is_private == want_private)
            .copied()
            .collect();
        if !by_network.is_empty() {
            reachable = by_network;
        }
    }

    config.endpoint(reachable[0].0).cloned()
}

/// Resolve endpoints for every remote volume, using live DNS.
pub fn resolve_all_endpoints(config: &Config, filter: &EndpointFilter) -> EndpointResolution {
    resolve_all_endpoints_with_probe(config, filter, &net::is_private_host)
}

/// Resolve endpoints for every remote volume with an injectable DNS
/// probe. Local volumes do not appear in the result.
pub fn resolve_all_endpoints_with_probe(
    config: &Config,
    filter: &EndpointFilter,
    probe: HostProbe,
) -> EndpointResolution {
    let mut resolution = EndpointResolution::default();
    for volume in config.volumes.values() {
        let Volume::Remote(remote) = volume else {
            continue;
        };
        match select_endpoint(config, remote, filter, probe) {
            Ok(server) => {
                let proxy_chain = config.proxy_chain(&server).unwrap_or_default();
                resolution
                    .resolved
                    .insert(remote.slug.clone(), ResolvedEndpoint {
                        server,
                        proxy_chain,
                    });
            }
            Err(_) => {
                resolution.unresolved.insert(
                    remote.slug.clone(),
                    remote.candidates().iter().map(|s| s.to_string()).collect(),
                );
            }
        }
    }
    resolution
}
