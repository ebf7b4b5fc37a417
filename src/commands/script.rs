use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use caravan::{generate_script, resolve_all_endpoints, ScriptOptions};

use crate::cli::Cli;
use crate::commands::{endpoint_filter, fatal, load_config_or_exit};

pub fn cmd_script(
    cli: &Cli,
    output_file: Option<&PathBuf>,
    relative_src: bool,
    relative_dst: bool,
) -> Result<()> {
    let config = load_config_or_exit(cli);
    let resolution = resolve_all_endpoints(&config, &endpoint_filter(cli));

    let options = ScriptOptions {
        config_path: cli.config.clone(),
        output_file: output_file.map(|p| {
            p.canonicalize()
                .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default().join(p))
        }),
        relative_src,
        relative_dst,
    };
    let script = match generate_script(&config, &resolution, &options, Utc::now()) {
        Ok(script) => script,
        Err(err) => fatal(err),
    };

    match output_file {
        Some(path) => {
            fs::write(path, &script)?;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(perms.mode() | 0o755);
            fs::set_permissions(path, perms)?;
            eprintln!("Written to {}", path.display());
        }
        None => print!("{script}"),
    }
    Ok(())
}
