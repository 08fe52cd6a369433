use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use status_echo::config::Config;
use status_echo::server::reactor::Reactor;

/// Readiness-multiplexed HTTP status echo server.
#[derive(Debug, Parser)]
#[command(name = "status-echo", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen backlog depth
    #[arg(long)]
    backlog: Option<i32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }
    if let Some(backlog) = cli.backlog {
        cfg.server.backlog = backlog;
    }
    cfg.server.validate()?;

    let mut reactor = Reactor::bind(&cfg.server)?;

    let shutdown = reactor.shutdown_handle();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        shutdown.shutdown();
    })
    .context("failed to install signal handler")?;

    reactor.run().context("event loop failed")?;
    Ok(())
}
