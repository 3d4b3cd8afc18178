//! nupkg-restore - Main entry point

use clap::Parser;
use nupkg_restore::cli::Cli;
use nupkg_restore::reference_set::load_references;
use nupkg_restore::{Restorer, Result, cancel_on_signal, report};
use std::process;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!(error = %e, "restore failed");
            eprintln!("Error: {e}");
            1
        }
    };
    process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,nupkg_restore=debug"
    } else {
        "error"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logging is optional; a second initialization attempt is not fatal
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Returns whether every package was skipped or restored
async fn run(cli: Cli) -> Result<bool> {
    let config = cli.into_config()?;
    config.validate()?;

    let references = load_references(&config.packages_file).await?;
    println!(
        "Restoring {} package(s) from {} into {}",
        references.len(),
        config.source,
        config.feed_dir.display()
    );

    let verbose = config.verbose;
    let restorer = Restorer::from_config(config)?;

    let mut events = restorer.subscribe();
    let printer = tokio::spawn(async move {
        let mut dropped = false;
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = report::render(&event, verbose) {
                        line.print();
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "console subscriber lagged");
                    report::events_dropped(skipped).print();
                    dropped = true;
                }
                Err(RecvError::Closed) => break,
            }
        }
        dropped
    });

    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());
    let result = restorer.run_all(references, &cancel).await;
    signals.abort();

    // Dropping the last sender closes the event channel and ends the printer
    drop(restorer);
    let dropped = printer.await.unwrap_or(true);

    let report = result?;
    if dropped {
        for line in report::failures(&report) {
            line.print();
        }
    }
    if cancel.is_cancelled() {
        eprintln!("Restore cancelled.");
        return Ok(false);
    }
    Ok(report.is_success())
}
