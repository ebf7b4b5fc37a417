//! Properties of the endpoint selection algorithm.

use std::collections::BTreeMap;

use proptest::prelude::*;

use caravan::config::{
    Config, ConnectionOptions, Endpoint, RemoteVolume, Volume,
};
use caravan::remote::{select_endpoint, EndpointFilter, NetworkPreference};

/// One candidate endpoint: DNS result (None = unresolvable) and an
/// optional location tag.
#[derive(Debug, Clone)]
struct Candidate {
    dns: Option<bool>,
    location: Option<&'static str>,
}

fn candidate() -> impl Strategy<Value = Candidate> {
    (
        prop_oneof![Just(None), Just(Some(true)), Just(Some(false))],
        prop_oneof![Just(None), Just(Some("home")), Just(Some("office"))],
    )
        .prop_map(|(dns, location)| Candidate { dns, location })
}

fn build_config(candidates: &[Candidate]) -> (Config, RemoteVolume, BTreeMap<String, bool>) {
    let mut endpoints = BTreeMap::new();
    let mut dns = BTreeMap::new();
    let mut slugs = Vec::new();
    for (i, c) in candidates.iter().enumerate() {
        let slug = format!("ep{i}");
        let host = format!("host{i}.example");
        if let Some(is_private) = c.dns {
            dns.insert(host.clone(), is_private);
        }
        endpoints.insert(
            slug.clone(),
            Endpoint {
                slug: slug.clone(),
                host,
                port: 22,
                user: None,
                key: None,
                connection_options: ConnectionOptions::default(),
                proxy_jumps: Vec::new(),
                location: c.location.map(String::from),
            },
        );
        slugs.push(slug);
    }
    let volume = RemoteVolume {
        slug: "vol".to_string(),
        ssh_endpoint: slugs[0].clone(),
        ssh_endpoints: Some(slugs),
        path: "/srv".to_string(),
    };
    let config = Config {
        ssh_endpoints: endpoints,
        volumes: BTreeMap::from([("vol".to_string(), Volume::Remote(volume.clone()))]),
        syncs: BTreeMap::new(),
    };
    (config, volume, dns)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: selection succeeds iff any candidate resolves, and
    /// always picks a resolvable candidate from the declared list.
    #[test]
    fn selection_is_sound(
        candidates in proptest::collection::vec(candidate(), 1..6),
        use_location in proptest::bool::ANY,
        network in prop_oneof![
            Just(None),
            Just(Some(NetworkPreference::Private)),
            Just(Some(NetworkPreference::Public)),
        ],
    ) {
        let (config, volume, dns) = build_config(&candidates);
        let filter = EndpointFilter {
            locations: if use_location { vec!["home".to_string()] } else { Vec::new() },
            network,
        };
        let probe = |host: &str| dns.get(host).copied();

        let any_resolvable = candidates.iter().any(|c| c.dns.is_some());
        let result = select_endpoint(&config, &volume, &filter, &probe);
        prop_assert_eq!(result.is_ok(), any_resolvable);

        if let Ok(picked) = result {
            // among declared candidates and resolvable
            prop_assert!(config.ssh_endpoints.contains_key(&picked.slug));
            prop_assert!(dns.contains_key(&picked.host));
        }
    }

    /// PROPERTY: a location hint that matches at least one resolvable
    /// candidate is always honored.
    #[test]
    fn matching_location_hint_is_honored(
        candidates in proptest::collection::vec(candidate(), 1..6),
    ) {
        let (config, volume, dns) = build_config(&candidates);
        let filter = EndpointFilter {
            locations: vec!["home".to_string()],
            network: None,
        };
        let probe = |host: &str| dns.get(host).copied();

        let hint_matches = candidates
            .iter()
            .any(|c| c.dns.is_some() && c.location == Some("home"));
        if let Ok(picked) = select_endpoint(&config, &volume, &filter, &probe) {
            if hint_matches {
                prop_assert_eq!(picked.location.as_deref(), Some("home"));
            }
        }
    }

    /// PROPERTY: with no hints, the first resolvable candidate in
    /// declared order wins.
    #[test]
    fn first_declared_resolvable_wins(
        candidates in proptest::collection::vec(candidate(), 1..6),
    ) {
        let (config, volume, dns) = build_config(&candidates);
        let probe = |host: &str| dns.get(host).copied();

        let expected = candidates.iter().position(|c| c.dns.is_some());
        match select_endpoint(&config, &volume, &EndpointFilter::default(), &probe) {
            Ok(picked) => {
                let index: usize = picked.slug.trim_start_matches("ep").parse().unwrap();
                prop_assert_eq!(Some(index), expected);
            }
            Err(_) => prop_assert!(expected.is_none()),
        }
    }
}
