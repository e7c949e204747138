//! `jstd-server` entry point.
//!
//! Loads the TOML config, applies command-line overrides, and serves until
//! Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use jstd_server::{FileSetServer, FileSetService, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "jstd-server", version, about = "Serve test files to captured browsers")]
struct Cli {
    /// Config file (default: $JSTD_SERVER_CONFIG or ~/.config/jstd/server.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (0 for an ephemeral port)
    #[arg(long)]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Run every test file in its own test case
    #[arg(long)]
    isolate_tests: bool,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if self.isolate_tests {
            config.isolate_tests = true;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    run_server(config)
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("jstd-server v{} starting", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(FileSetService::from_config(&config));
    let server = FileSetServer::bind(&config.bind_addr(), service)?
        .with_max_body_bytes(config.max_body_bytes);

    // Shutdown coordination via watch channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Signal received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    server.serve(config.workers, shutdown_rx).await?;

    tracing::info!("jstd-server exiting cleanly");
    Ok(())
}
