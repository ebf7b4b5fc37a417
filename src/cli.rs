use std::path::PathBuf;

use caravan::ProgressMode;
use clap::{Parser, Subcommand, ValueEnum};

/// Output format for rendering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Caravan - backup orchestrator for volumes that come and go
#[derive(Parser, Debug)]
#[command(name = "caravan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Prefer endpoints at these locations
    #[arg(short, long = "locations", global = true)]
    pub locations: Vec<String>,

    /// Prefer private (LAN) endpoints
    #[arg(long, global = true, conflicts_with = "public")]
    pub private: bool,

    /// Prefer public (WAN) endpoints
    #[arg(long, global = true)]
    pub public: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check availability of volumes and syncs
    Check {
        /// Exit non-zero on any inactive sync
        #[arg(long)]
        strict: bool,
    },

    /// Run backup syncs
    Run {
        /// Build and report commands without executing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Sync slug(s) to run (default: all)
        #[arg(short, long = "sync")]
        sync: Vec<String>,

        /// Rsync progress reporting
        #[arg(short, long, value_enum, default_value_t = ProgressMode::None)]
        progress: ProgressMode,

        /// Skip retention pruning after successful syncs
        #[arg(long)]
        no_prune: bool,
    },

    /// Prune snapshots beyond the retention bound
    Prune {
        /// Report what would be deleted without deleting
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Sync slug(s) to prune (default: all)
        #[arg(short, long = "sync")]
        sync: Vec<String>,
    },

    /// Generate a standalone backup shell script
    Script {
        /// Write the script to a file (made executable)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,

        /// Make local source paths relative to the script location
        #[arg(long, requires = "output_file")]
        relative_src: bool,

        /// Make local destination paths relative to the script location
        #[arg(long, requires = "output_file")]
        relative_dst: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the parsed, materialized configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check() {
        let cli = Cli::try_parse_from(["caravan", "check", "--strict"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { strict: true }));
    }

    #[test]
    fn parse_run_with_args() {
        let cli = Cli::try_parse_from([
            "caravan",
            "run",
            "--dry-run",
            "--sync",
            "docs-usb",
            "--sync",
            "docs-nas",
            "--progress",
            "overall",
            "--no-prune",
        ])
        .unwrap();
        if let Commands::Run {
            dry_run,
            sync,
            progress,
            no_prune,
        } = cli.command
        {
            assert!(dry_run);
            assert_eq!(sync, vec!["docs-usb", "docs-nas"]);
            assert_eq!(progress, ProgressMode::Overall);
            assert!(no_prune);
        } else {
            panic!("expected Run command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "caravan",
            "--config",
            "/etc/caravan/config.toml",
            "--output",
            "json",
            "-l",
            "home",
            "--private",
            "check",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/caravan/config.toml")));
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.locations, vec!["home"]);
        assert!(cli.private);
    }

    #[test]
    fn private_and_public_conflict() {
        assert!(Cli::try_parse_from(["caravan", "--private", "--public", "check"]).is_err());
    }

    #[test]
    fn relative_paths_require_output_file() {
        assert!(Cli::try_parse_from(["caravan", "script", "--relative-src"]).is_err());
        assert!(Cli::try_parse_from([
            "caravan",
            "script",
            "--relative-src",
            "--output-file",
            "backup.sh"
        ])
        .is_ok());
    }

    #[test]
    fn parse_config_show() {
        let cli = Cli::try_parse_from(["caravan", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }
}
