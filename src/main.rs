//! uiflow - resilient UI flows for mobile apps over WebDriver
//!
//! Runs YAML flow files against an Appium-compatible automation server,
//! trying several locators per step and capturing a screenshot after each.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use uiflow::engine::EndpointSlot;
use uiflow::{cli, commands, common::logging, Error};
use commands::Commands;

/// How long an interrupted run waits for its session to close
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "uiflow", about = "Resilient mobile UI flow runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output and debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write full logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _guard = logging::init_cli(cli.verbose, cli.log_file.as_deref());

    let result = tokio::select! {
        result = cli::dispatch(cli.command, cli.verbose) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, closing the open session");
            Err(Error::Interrupted)
        }
    };

    if let Err(e) = result {
        if matches!(e, Error::Interrupted)
            && tokio::time::timeout(INTERRUPT_GRACE, EndpointSlot::global().released())
                .await
                .is_err()
        {
            tracing::warn!("Session did not close within {} s", INTERRUPT_GRACE.as_secs());
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
