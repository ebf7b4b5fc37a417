//! Caravan CLI - backup orchestrator for volumes that come and go
//!
//! Usage: caravan <COMMAND>
//!
//! Commands:
//!   check   Check availability of volumes and syncs
//!   run     Run backup syncs
//!   prune   Prune snapshots beyond the retention bound
//!   script  Generate a standalone backup shell script
//!   config  Configuration commands

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Check { strict } => commands::check::cmd_check(&cli, *strict),
        Commands::Run {
            dry_run,
            sync,
            progress,
            no_prune,
        } => commands::run::cmd_run(&cli, *dry_run, sync, *progress, *no_prune),
        Commands::Prune { dry_run, sync } => commands::prune::cmd_prune(&cli, *dry_run, sync),
        Commands::Script {
            output_file,
            relative_src,
            relative_dst,
        } => commands::script::cmd_script(&cli, output_file.as_ref(), *relative_src, *relative_dst),
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::show::cmd_config_show(&cli),
        },
    }
}
