//! RepoMesh entry point: loads configuration, connects to `SQLite`, runs
//! migrations, wires the [`Coordinator`], and serves the JSON-RPC tool
//! surface over stdio.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use repomesh::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl};
use repomesh::infrastructure::{ConfigLoader, DatabaseConnection};
use repomesh::mcp::Dispatcher;
use repomesh::Coordinator;

#[derive(Parser)]
#[command(name = "repomesh", about = "Coordination engine for a fleet of autonomous coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations and exit.
    Migrate,
    /// Run startup migrations, start any autostart background loops, and
    /// serve newline-delimited JSON-RPC requests over stdin/stdout until
    /// stdin closes.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;

    let log_config = LogConfig {
        level: config.logging.level.clone(),
        format: if config.logging.format == "json" { LogFormat::Json } else { LogFormat::Pretty },
        ..LogConfig::default()
    };
    let _logger = LoggerImpl::init(&log_config).context("failed to initialize logging")?;

    let db = DatabaseConnection::new(&config.database.url).await.context("failed to connect to database")?;
    db.migrate().await.context("failed to run database migrations")?;

    match cli.command {
        Commands::Migrate => {
            tracing::info!("migrations applied");
            Ok(())
        }
        Commands::Serve => serve(db, config).await,
    }
}

async fn serve(db: DatabaseConnection, config: repomesh::domain::models::Config) -> Result<()> {
    let coordinator = Arc::new(Coordinator::new(db.pool().clone(), config));
    coordinator.start_configured_runtimes().await;

    let dispatcher = Dispatcher::new(coordinator.clone());
    tracing::info!("repomesh serving JSON-RPC over stdio");

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = dispatcher.handle_message(&line).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    coordinator.stop_runtimes().await;
    Ok(())
}
