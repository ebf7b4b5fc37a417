use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use caravan::check::check_all;
use caravan::output::{print_run_results, Icons, TextObserver};
use caravan::sync::NullObserver;
use caravan::{resolve_all_endpoints, run_all_syncs, ProgressMode, RunOptions};

use crate::cli::{Cli, OutputFormat};
use crate::commands::{endpoint_filter, fatal, load_config_or_exit, only_syncs};

pub fn cmd_run(
    cli: &Cli,
    dry_run: bool,
    sync: &[String],
    progress: ProgressMode,
    no_prune: bool,
) -> Result<()> {
    let config = load_config_or_exit(cli);
    let resolution = resolve_all_endpoints(&config, &endpoint_filter(cli));
    let only = only_syncs(sync);
    let (volumes, syncs) = match check_all(&config, &resolution, only.as_deref()) {
        Ok(result) => result,
        Err(err) => fatal(err),
    };

    // A signal stops the run between syncs; the in-flight rsync dies
    // with the process group and takes the normal failure path, so
    // nothing partial is ever published.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl+C handler");
    }

    let options = RunOptions {
        dry_run,
        no_prune,
        progress,
        only,
        cancel: Some(cancel),
    };

    let human = cli.output == OutputFormat::Human;
    let outcomes = {
        let mut text_observer = TextObserver::new(Icons::auto());
        let mut null_observer = NullObserver;
        let observer: &mut dyn caravan::sync::RunObserver = if human {
            &mut text_observer
        } else {
            &mut null_observer
        };
        match run_all_syncs(&config, &syncs, &resolution, &options, observer) {
            Ok(outcomes) => outcomes,
            Err(err) => fatal(err),
        }
    };

    match cli.output {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "volumes": volumes.values().collect::<Vec<_>>(),
                "syncs": syncs.values().collect::<Vec<_>>(),
                "results": outcomes,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Human => {
            println!();
            print_run_results(&outcomes, dry_run, &Icons::auto());
        }
    }

    if outcomes.iter().any(|o| o.failed()) {
        std::process::exit(1);
    }
    Ok(())
}
