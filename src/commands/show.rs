use anyhow::Result;

use caravan::output::print_config;
use caravan::resolve_all_endpoints;

use crate::cli::{Cli, OutputFormat};
use crate::commands::{endpoint_filter, load_config_or_exit};

pub fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = load_config_or_exit(cli);
    match cli.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Human => {
            let resolution = resolve_all_endpoints(&config, &endpoint_filter(cli));
            print_config(&config, &resolution);
        }
    }
    Ok(())
}
