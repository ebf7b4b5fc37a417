//! Load-time validation and `extends` materialization
//!
//! Everything that can be rejected before a single sync runs is
//! rejected here: slug shapes, dangling cross references, `extends`
//! cycles, proxy-jump cycles, and snapshot-strategy exclusivity. The
//! output is a [`Config`] whose endpoint records are fully
//! materialized, so no other component ever sees an `extends` field.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::model::{
    is_valid_slug, Config, ConfigFile, Endpoint, EndpointSpec, SyncEndpoint, Volume,
};
use crate::error::{CaravanError, CaravanResult};

/// Validate a raw config file and materialize it into a [`Config`].
pub fn validate(raw: ConfigFile) -> CaravanResult<Config> {
    for slug in raw.ssh_endpoints.keys() {
        check_slug("ssh-endpoint", slug)?;
    }
    for slug in raw.volumes.keys() {
        check_slug("volume", slug)?;
    }
    for slug in raw.syncs.keys() {
        check_slug("sync", slug)?;
    }

    for (slug, spec) in &raw.ssh_endpoints {
        if spec.proxy_jump.is_some() && spec.proxy_jumps.is_some() {
            return Err(CaravanError::ProxyJumpExclusive {
                endpoint: slug.clone(),
            });
        }
    }

    let ssh_endpoints = materialize_endpoints(&raw.ssh_endpoints)?;
    check_proxy_chains(&ssh_endpoints)?;

    let mut volumes = raw.volumes;
    for (slug, vol) in &mut volumes {
        vol.set_slug(slug);
        if let Volume::Remote(remote) = vol {
            for endpoint in remote.candidates() {
                if !ssh_endpoints.contains_key(endpoint) {
                    return Err(CaravanError::UnknownVolumeEndpoint {
                        volume: slug.clone(),
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        }
    }

    let mut syncs = raw.syncs;
    for (slug, sync) in &mut syncs {
        sync.slug = slug.clone();
        check_sync_endpoint(slug, "source", &sync.source, &volumes)?;
        check_sync_endpoint(slug, "destination", &sync.destination, &volumes)?;
    }

    Ok(Config {
        ssh_endpoints,
        volumes,
        syncs,
    })
}

fn check_slug(kind: &'static str, slug: &str) -> CaravanResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(CaravanError::InvalidSlug {
            kind,
            slug: slug.to_string(),
        })
    }
}

fn check_sync_endpoint(
    sync: &str,
    role: &'static str,
    endpoint: &SyncEndpoint,
    volumes: &BTreeMap<String, Volume>,
) -> CaravanResult<()> {
    if !volumes.contains_key(&endpoint.volume) {
        return Err(CaravanError::UnknownSyncVolume {
            sync: sync.to_string(),
            role,
            volume: endpoint.volume.clone(),
        });
    }
    if endpoint.btrfs_snapshots.enabled && endpoint.hard_link_snapshots.enabled {
        return Err(CaravanError::SnapshotExclusive {
            sync: sync.to_string(),
        });
    }
    Ok(())
}

/// Resolve `extends` inheritance into materialized endpoint records.
///
/// A child's unset fields take the parent's values, recursively. A
/// child that sets either proxy field suppresses the other inherited
/// proxy field, so the exclusivity invariant survives inheritance.
fn materialize_endpoints(
    specs: &BTreeMap<String, EndpointSpec>,
) -> CaravanResult<BTreeMap<String, Endpoint>> {
    let mut merged: BTreeMap<String, EndpointSpec> = BTreeMap::new();
    for slug in specs.keys() {
        let mut chain = Vec::new();
        resolve_spec(slug, specs, &mut merged, &mut chain)?;
    }

    let mut out = BTreeMap::new();
    for (slug, spec) in merged {
        let Some(host) = spec.host else {
            return Err(CaravanError::MissingEndpointField {
                endpoint: slug,
                field: "host",
            });
        };
        let proxy_jumps = match (spec.proxy_jump, spec.proxy_jumps) {
            (Some(hop), _) => vec![hop],
            (None, Some(hops)) => hops,
            (None, None) => Vec::new(),
        };
        out.insert(
            slug.clone(),
            Endpoint {
                slug,
                host,
                port: spec.port.unwrap_or_else(Endpoint::default_port),
                user: spec.user,
                key: spec.key,
                connection_options: spec.connection_options.unwrap_or_default(),
                proxy_jumps,
                location: spec.location,
            },
        );
    }
    Ok(out)
}

fn resolve_spec(
    slug: &str,
    specs: &BTreeMap<String, EndpointSpec>,
    merged: &mut BTreeMap<String, EndpointSpec>,
    chain: &mut Vec<String>,
) -> CaravanResult<EndpointSpec> {
    if let Some(done) = merged.get(slug) {
        return Ok(done.clone());
    }
    let spec = &specs[slug];
    let Some(parent_slug) = spec.extends.clone() else {
        merged.insert(slug.to_string(), spec.clone());
        return Ok(spec.clone());
    };

    if chain.iter().any(|s| s == &parent_slug) || parent_slug == slug {
        let mut members = chain.clone();
        members.push(slug.to_string());
        members.push(parent_slug);
        return Err(CaravanError::CyclicExtends { members });
    }
    if !specs.contains_key(&parent_slug) {
        return Err(CaravanError::UnknownEndpoint {
            endpoint: slug.to_string(),
            referenced: parent_slug,
            field: "extends",
        });
    }

    chain.push(slug.to_string());
    let parent = resolve_spec(&parent_slug, specs, merged, chain)?;
    chain.pop();

    let result = merge_specs(&parent, spec);
    merged.insert(slug.to_string(), result.clone());
    Ok(result)
}

fn merge_specs(parent: &EndpointSpec, child: &EndpointSpec) -> EndpointSpec {
    let child_sets_proxy = child.proxy_jump.is_some() || child.proxy_jumps.is_some();
    EndpointSpec {
        host: child.host.clone().or_else(|| parent.host.clone()),
        port: child.port.or(parent.port),
        user: child.user.clone().or_else(|| parent.user.clone()),
        key: child.key.clone().or_else(|| parent.key.clone()),
        connection_options: child
            .connection_options
            .clone()
            .or_else(|| parent.connection_options.clone()),
        proxy_jump: if child_sets_proxy {
            child.proxy_jump.clone()
        } else {
            parent.proxy_jump.clone()
        },
        proxy_jumps: if child_sets_proxy {
            child.proxy_jumps.clone()
        } else {
            parent.proxy_jumps.clone()
        },
        location: child.location.clone().or_else(|| parent.location.clone()),
        extends: None,
    }
}

/// Reject unknown proxy-jump targets and transitive proxy cycles.
fn check_proxy_chains(endpoints: &BTreeMap<String, Endpoint>) -> CaravanResult<()> {
    for (slug, endpoint) in endpoints {
        for hop in &endpoint.proxy_jumps {
            if !endpoints.contains_key(hop) {
                return Err(CaravanError::UnknownEndpoint {
                    endpoint: slug.clone(),
                    referenced: hop.clone(),
                    field: "proxy-jump",
                });
            }
        }

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        visited.insert(slug);
        let mut path = vec![slug.clone()];
        let mut queue: Vec<&str> = endpoint.proxy_jumps.iter().map(String::as_str).collect();
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                path.push(current.to_string());
                return Err(CaravanError::CyclicProxyJump { members: path });
            }
            path.push(current.to_string());
            if let Some(next) = endpoints.get(current) {
                queue.extend(next.proxy_jumps.iter().map(String::as_str));
            }
        }
    }
    Ok(())
}
