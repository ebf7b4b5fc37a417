//! Properties of the retention bound.

use proptest::prelude::*;

use caravan::sync::snapshot::prune_candidates;

/// Sorted, unique snapshot names.
fn snapshot_set() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set(0u32..500, 0..40).prop_map(|days| {
        days.into_iter()
            .map(|d| format!("2026-{:03}T00:00:00Z", d))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the snapshot `latest` references is never a prune
    /// candidate, and candidates always come from the declared set.
    #[test]
    fn latest_is_never_pruned(
        snapshots in snapshot_set(),
        latest_index in proptest::option::of(0usize..40),
        max in 1u32..10,
    ) {
        let latest = latest_index
            .and_then(|i| snapshots.get(i % snapshots.len().max(1)))
            .cloned();
        let candidates = prune_candidates(&snapshots, latest.as_deref(), max);

        for candidate in &candidates {
            prop_assert!(snapshots.contains(candidate));
            prop_assert_ne!(Some(candidate.as_str()), latest.as_deref());
        }
    }

    /// PROPERTY: when `latest` references the newest snapshot (the
    /// steady state), exactly the k most recent snapshots remain.
    #[test]
    fn retained_set_is_the_k_most_recent(
        snapshots in snapshot_set(),
        max in 1u32..10,
    ) {
        let latest = snapshots.last().cloned();
        let candidates = prune_candidates(&snapshots, latest.as_deref(), max);
        let remaining: Vec<&String> = snapshots
            .iter()
            .filter(|s| !candidates.contains(s))
            .collect();

        let k = (max as usize).min(snapshots.len());
        prop_assert_eq!(remaining.len(), k);
        let expected: Vec<&String> = snapshots[snapshots.len() - k..].iter().collect();
        prop_assert_eq!(remaining, expected);
    }

    /// PROPERTY: the retained count never drops below the bound, and
    /// pruning removes oldest-first.
    #[test]
    fn retention_bound_holds(
        snapshots in snapshot_set(),
        latest_index in proptest::option::of(0usize..40),
        max in 1u32..10,
    ) {
        let latest = latest_index
            .and_then(|i| snapshots.get(i % snapshots.len().max(1)))
            .cloned();
        let candidates = prune_candidates(&snapshots, latest.as_deref(), max);
        let remaining = snapshots.len() - candidates.len();

        if snapshots.len() >= max as usize {
            prop_assert!(remaining >= max as usize);
        } else {
            prop_assert!(candidates.is_empty());
        }

        // oldest-first: every candidate is older than every retained
        // snapshot other than latest
        for candidate in &candidates {
            for retained in snapshots.iter().filter(|s| !candidates.contains(s)) {
                if Some(retained.as_str()) != latest.as_deref() {
                    prop_assert!(candidate < retained);
                }
            }
        }
    }
}
