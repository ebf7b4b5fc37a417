use anyhow::Result;

use caravan::check::check_all;
use caravan::output::{print_check, Icons};
use caravan::resolve_all_endpoints;

use crate::cli::{Cli, OutputFormat};
use crate::commands::{endpoint_filter, fatal, load_config_or_exit};

pub fn cmd_check(cli: &Cli, strict: bool) -> Result<()> {
    let config = load_config_or_exit(cli);
    let resolution = resolve_all_endpoints(&config, &endpoint_filter(cli));
    let (volumes, syncs) = match check_all(&config, &resolution, None) {
        Ok(result) => result,
        Err(err) => fatal(err),
    };

    match cli.output {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "volumes": volumes.values().collect::<Vec<_>>(),
                "syncs": syncs.values().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Human => {
            print_check(volumes.values(), syncs.values(), &Icons::auto());
        }
    }

    if strict && syncs.values().any(|s| !s.active) {
        std::process::exit(1);
    }
    Ok(())
}
