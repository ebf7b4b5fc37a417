//! Sync dependency ordering
//!
//! When one sync's destination feeds another sync's source (same
//! volume and subdir), the writer must run first or the reader copies
//! stale data. Syncs are ordered with a topological sort; ties break
//! alphabetically so runs are deterministic. A dependency cycle is a
//! configuration error.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::SyncConfig;
use crate::error::{CaravanError, CaravanResult};

type EndpointKey<'a> = (&'a str, Option<&'a str>);

/// Order syncs so that writers precede readers of the same endpoint.
pub fn sort_syncs(syncs: &[&SyncConfig]) -> CaravanResult<Vec<String>> {
    // Endpoint -> syncs writing to it
    let mut writers: BTreeMap<EndpointKey, Vec<&str>> = BTreeMap::new();
    for sync in syncs {
        writers
            .entry(sync.destination.key())
            .or_default()
            .push(&sync.slug);
    }

    // Sync -> predecessors (writers of its source endpoint)
    let mut deps: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for sync in syncs {
        let preds: BTreeSet<&str> = writers
            .get(&sync.source.key())
            .map(|w| {
                w.iter()
                    .copied()
                    .filter(|writer| *writer != sync.slug)
                    .collect()
            })
            .unwrap_or_default();
        deps.insert(&sync.slug, preds);
    }

    let mut ordered = Vec::with_capacity(syncs.len());
    let mut remaining: BTreeMap<&str, BTreeSet<&str>> = deps;
    while !remaining.is_empty() {
        let Some(next) = remaining
            .iter()
            .find(|(_, preds)| preds.is_empty())
            .map(|(slug, _)| *slug)
        else {
            let members: Vec<String> = remaining.keys().map(|s| s.to_string()).collect();
            return Err(CaravanError::CyclicSyncDependency { members });
        };
        remaining.remove(next);
        for preds in remaining.values_mut() {
            preds.remove(next);
        }
        ordered.push(next.to_string());
    }
    Ok(ordered)
}
