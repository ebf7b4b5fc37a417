//! Properties of filter normalization and command building.

use std::collections::BTreeMap;

use proptest::prelude::*;

use caravan::config::{
    Config, FilterRule, LocalVolume, SnapshotConfig, SyncConfig, SyncEndpoint, Volume,
};
use caravan::remote::EndpointResolution;
use caravan::sync::{build_rsync_command, BuildOptions};

fn pattern() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_.*/]{1,12}").unwrap()
}

fn filter_rule() -> impl Strategy<Value = FilterRule> {
    prop_oneof![
        pattern().prop_map(|p| FilterRule::Include { include: p }),
        pattern().prop_map(|p| FilterRule::Exclude { exclude: p }),
        pattern().prop_map(|p| FilterRule::Raw(format!("P {p}"))),
    ]
}

fn local_config(filters: Vec<FilterRule>, filter_file: Option<String>) -> Config {
    let endpoint = |volume: &str| SyncEndpoint {
        volume: volume.to_string(),
        subdir: None,
        btrfs_snapshots: SnapshotConfig::default(),
        hard_link_snapshots: SnapshotConfig::default(),
    };
    let sync = SyncConfig {
        slug: "docs-usb".to_string(),
        source: endpoint("docs"),
        destination: endpoint("usb"),
        enabled: true,
        rsync_options: None,
        extra_rsync_options: Vec::new(),
        filters,
        filter_file,
    };
    Config {
        ssh_endpoints: BTreeMap::new(),
        volumes: BTreeMap::from([
            (
                "docs".to_string(),
                Volume::Local(LocalVolume {
                    slug: "docs".to_string(),
                    path: "/home/me/docs".to_string(),
                }),
            ),
            (
                "usb".to_string(),
                Volume::Local(LocalVolume {
                    slug: "usb".to_string(),
                    path: "/media/usb".to_string(),
                }),
            ),
        ]),
        syncs: BTreeMap::from([("docs-usb".to_string(), sync)]),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: normalization maps structured rules to `+ `/`- `
    /// prefixes and never alters raw rules.
    #[test]
    fn normalization_shape(rule in filter_rule()) {
        let rendered = rule.render();
        match rule {
            FilterRule::Include { include } => {
                prop_assert_eq!(rendered, format!("+ {include}"));
            }
            FilterRule::Exclude { exclude } => {
                prop_assert_eq!(rendered, format!("- {exclude}"));
            }
            FilterRule::Raw(raw) => prop_assert_eq!(rendered, raw),
        }
    }

    /// PROPERTY: the built command carries filters in declaration
    /// order, with the merge file last, after the built-in marker
    /// protection rules.
    #[test]
    fn filter_order_is_preserved(
        rules in proptest::collection::vec(filter_rule(), 0..6),
        use_file in proptest::bool::ANY,
    ) {
        let filter_file = use_file.then(|| "/home/me/.caravan-filter".to_string());
        let config = local_config(rules.clone(), filter_file.clone());
        let resolution = EndpointResolution::default();
        let cmd = build_rsync_command(
            &config.syncs["docs-usb"],
            &config,
            &resolution,
            &BuildOptions::default(),
        )
        .unwrap();

        let mut expected: Vec<String> = vec!["--filter=P .caravan-*".to_string()];
        expected.extend(rules.iter().map(|r| format!("--filter={}", r.render())));
        if let Some(file) = &filter_file {
            expected.push(format!("--filter=merge {file}"));
        }
        let actual: Vec<&String> =
            cmd.iter().filter(|a| a.starts_with("--filter=")).collect();
        prop_assert_eq!(actual, expected.iter().collect::<Vec<_>>());

        // source and destination always close the argv, slash-terminated
        prop_assert_eq!(&cmd[cmd.len() - 2], "/home/me/docs/");
        prop_assert_eq!(&cmd[cmd.len() - 1], "/media/usb/");
    }
}
