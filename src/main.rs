//! filecourier - file delivery agent
//!
//! CLI entry point: loads configuration, restores persisted state, and runs
//! the scan/dispatch loop.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{info, warn};

use filecourier::cli::{Cli, Command, OutputFormat};
use filecourier::config::Config;
use filecourier::dispatch::{DispatchConfig, Dispatcher};
use filecourier::domain::FileStatus;
use filecourier::state::{self, StateStore};
use filecourier::upload;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).wrap_err("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).wrap_err("Failed to load configuration")?;

    match cli.command {
        Command::Run => cmd_run(&config).await,
        Command::Once => cmd_once(&config).await,
        Command::State { format } => cmd_state(&config, format).await,
    }
}

/// Load state, run recovery, and build the dispatcher
async fn init_agent(config: &Config) -> Result<(Arc<StateStore>, Dispatcher)> {
    config.validate()?;

    if !config.dirs.watch.is_dir() {
        return Err(eyre::eyre!(
            "Watched directory does not exist: {}",
            config.dirs.watch.display()
        ));
    }

    let store = Arc::new(StateStore::load(&config.state.path).await?);

    let recovered = state::recover(&store).await?;
    if recovered > 0 {
        warn!(recovered, "Re-queued files left mid-delivery by a previous run");
    }

    let uploader = upload::create_uploader(&config.upload)?;
    info!(protocol = %config.upload.protocol, "Uploader initialized");

    let dispatcher = Dispatcher::new(DispatchConfig::from_config(config), store.clone(), uploader);

    Ok((store, dispatcher))
}

/// Run the agent loop until a shutdown signal arrives
async fn cmd_run(config: &Config) -> Result<()> {
    let (_store, dispatcher) = init_agent(config).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => warn!("SIGINT received"),
                _ = sigterm.recv() => warn!("SIGTERM received"),
            }
            let _ = shutdown_tx.send(()).await;
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            warn!("Ctrl+C received");
            let _ = shutdown_tx.send(()).await;
        });
    }

    info!("Agent running. Press Ctrl+C to stop.");
    dispatcher.run(shutdown_rx).await
}

/// Run exactly one scan/dispatch cycle
async fn cmd_once(config: &Config) -> Result<()> {
    let (store, dispatcher) = init_agent(config).await?;

    dispatcher.run_cycle().await?;
    store.save().await?;

    Ok(())
}

/// Print the persisted delivery state
async fn cmd_state(config: &Config, format: OutputFormat) -> Result<()> {
    let store = StateStore::load(&config.state.path).await?;
    let records = store.snapshot().await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No delivery records at {}", config.state.path.display());
                return Ok(());
            }

            let count_in = |status: FileStatus| {
                records.values().filter(|r| r.status == status).count()
            };

            println!("Delivery state ({})", config.state.path.display());
            println!("----------------");
            println!("Pending:    {}", count_in(FileStatus::Pending));
            println!("Processing: {}", count_in(FileStatus::Processing));
            println!("Completed:  {}", count_in(FileStatus::Completed));
            println!("Failed:     {}", count_in(FileStatus::Failed));
            println!();

            let mut paths: Vec<_> = records.keys().collect();
            paths.sort();
            for path in paths {
                let record = &records[path];
                if record.error.is_empty() {
                    println!("  {}  {}  retries={}", record.status, path, record.retry_count);
                } else {
                    println!(
                        "  {}  {}  retries={}  error={}",
                        record.status, path, record.retry_count, record.error
                    );
                }
            }
        }
    }

    Ok(())
}
