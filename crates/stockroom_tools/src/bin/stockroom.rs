#![forbid(unsafe_code)]

use std::time::Duration;

use clap::Parser;
use stockroom_adapter::client::HttpBackend;
use stockroom_adapter::config::{ConsoleConfig, ServerConfig};
use stockroom_adapter::local::LocalBackend;
use stockroom_adapter::local_now;
use stockroom_adapter::telemetry::init_tracing;
use stockroom_os::console::{ConsoleBackend, ConsoleRuntime};
use stockroom_tools::console_cli::{execute_console_command, Cli, Command};
use tracing::debug;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let config = ConsoleConfig::from_env()?;
    init_tracing("warn", config.log_json, std::io::stderr);

    match &cli.local {
        Some(journal) => {
            debug!(journal = %journal.display(), "console using local store");
            let tax_rate = ServerConfig::from_env()?.tax_rate;
            let backend = LocalBackend::open(tax_rate, journal.clone())?;
            drive(&ConsoleRuntime::new(backend), &cli.command, config.refresh)
        }
        None => {
            debug!(
                products = %config.urls.products,
                purchasing = %config.urls.purchasing,
                "console using http services"
            );
            drive(
                &ConsoleRuntime::new(HttpBackend::from_config(&config)),
                &cli.command,
                config.refresh,
            )
        }
    }
}

fn drive<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    command: &Command,
    refresh: Duration,
) -> Result<(), String> {
    let watch = matches!(command, Command::Dashboard { watch: true });
    loop {
        let output = execute_console_command(console, command, local_now())?;
        if !output.is_empty() {
            println!("{output}");
        }
        if !watch {
            return Ok(());
        }
        println!();
        std::thread::sleep(refresh);
    }
}
