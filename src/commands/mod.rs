//! Command implementations for the caravan binary.

pub mod check;
pub mod prune;
pub mod run;
pub mod script;
pub mod show;

use caravan::output::print_config_error;
use caravan::{CaravanError, Config, EndpointFilter, NetworkPreference};

use crate::cli::Cli;

/// Load configuration or exit with code 2, the configuration-error
/// exit status.
pub(crate) fn load_config_or_exit(cli: &Cli) -> Config {
    match caravan::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            print_config_error(&err);
            std::process::exit(2);
        }
    }
}

/// Fatal error encountered mid-command: configuration errors exit 2,
/// everything else exits 1.
pub(crate) fn fatal(err: CaravanError) -> ! {
    print_config_error(&err);
    std::process::exit(if err.is_config() { 2 } else { 1 });
}

/// Endpoint selection hints from the global CLI flags.
pub(crate) fn endpoint_filter(cli: &Cli) -> EndpointFilter {
    let network = if cli.private {
        Some(NetworkPreference::Private)
    } else if cli.public {
        Some(NetworkPreference::Public)
    } else {
        None
    };
    EndpointFilter {
        locations: cli.locations.clone(),
        network,
    }
}

/// `--sync` selections, or `None` for all syncs.
pub(crate) fn only_syncs(sync: &[String]) -> Option<Vec<String>> {
    if sync.is_empty() {
        None
    } else {
        Some(sync.to_vec())
    }
}
