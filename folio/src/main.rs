use std::process::ExitCode;

use clap::Parser;
use folio::cli::Cli;
use folio::output::Output;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let output = Output::new(cli.json, cli.quiet);
    match folio::run(cli, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command failed: {:?}", e);
            output.failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. `RUST_LOG` takes precedence over `-v`/`-q`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
