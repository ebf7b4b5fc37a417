use anyhow::Result;

use caravan::check::check_all;
use caravan::output::{print_prune_results, Icons};
use caravan::{prune_all_syncs, resolve_all_endpoints};

use crate::cli::{Cli, OutputFormat};
use crate::commands::{endpoint_filter, fatal, load_config_or_exit, only_syncs};

pub fn cmd_prune(cli: &Cli, dry_run: bool, sync: &[String]) -> Result<()> {
    let config = load_config_or_exit(cli);
    let resolution = resolve_all_endpoints(&config, &endpoint_filter(cli));
    let only = only_syncs(sync);
    let (_, syncs) = match check_all(&config, &resolution, only.as_deref()) {
        Ok(result) => result,
        Err(err) => fatal(err),
    };

    let outcomes =
        match prune_all_syncs(&config, &syncs, &resolution, dry_run, only.as_deref()) {
            Ok(outcomes) => outcomes,
            Err(err) => fatal(err),
        };

    match cli.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        OutputFormat::Human => {
            print_prune_results(&outcomes, &Icons::auto());
        }
    }

    if outcomes.iter().any(|o| !o.warnings.is_empty()) {
        std::process::exit(1);
    }
    Ok(())
}
