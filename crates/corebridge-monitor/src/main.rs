use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod server;

use config::{MonitorConfig, OutputFormat};

#[derive(Parser)]
#[command(
    name = "corebridge-monitor",
    about = "Receive and print log frames sent by corebridge hosts"
)]
struct Cli {
    /// Pipe name to listen on (a Windows pipe name, or a socket path on Unix)
    #[arg(long)]
    pipe: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Config file (default: <config dir>/corebridge/monitor.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON frames
    fmt()
        .with_env_filter(
            EnvFilter::try_from_env("COREBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = MonitorConfig::load(cli.config.as_deref())?;

    let Some(pipe) = cli.pipe.or(file.pipe) else {
        bail!("No pipe given: pass --pipe or set `pipe` in monitor.toml");
    };
    let format = cli.format.unwrap_or(file.format);

    tracing::info!(pipe = %pipe, format = ?format, "Starting corebridge monitor");

    let (tx, mut rx) = mpsc::channel(256);
    let printer = tokio::spawn(async move {
        let stdout = std::io::stdout();
        while let Some(message) = rx.recv().await {
            if let Err(e) = server::report(format, &message, &mut stdout.lock()) {
                tracing::warn!(error = %e, "Failed to report frame");
            }
        }
    });

    tokio::select! {
        result = server::serve(&pipe, tx) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Monitor shutting down"),
    }

    printer.abort();
    Ok(())
}
