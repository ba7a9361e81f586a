//! Salescast CLI: serve the API, run the pipeline, inspect results.
//!
//! Commands:
//! - `serve`: HTTP API plus background run workers
//! - `train`: run the pipeline once in the foreground and print the summary
//! - `show`: print the latest stored forecast for a granularity
//! - `history`: print recent run summaries from the JSONL history

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use salescast_core::domain::Granularity;
use salescast_core::store::ForecastStore;
use salescast_runner::{execute, RunHistory, RunQueue, RunTicket, ServiceConfig, Services};
use salescast_server::AppState;

const DEFAULT_LOG_FILTER: &str = "salescast=info,tower_http=info";

#[derive(Parser)]
#[command(name = "salescast", about = "Salescast: sales forecast pipeline and API")]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and process triggered runs in the background.
    Serve,
    /// Run the pipeline once and print the run summary as JSON.
    Train,
    /// Print the latest stored forecast.
    Show {
        /// monthly or yearly.
        #[arg(long)]
        granularity: Granularity,
    },
    /// Print recent run summaries, newest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Serve => run_serve(&config),
        Commands::Train => run_train(&config),
        Commands::Show { granularity } => run_show(&config, granularity),
        Commands::History { limit } => run_history(&config, limit),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .init();
}

fn run_serve(config: &ServiceConfig) -> Result<()> {
    if config.training_key().is_none() {
        error!("TRAINING_API_KEY is not configured; POST /train_and_store will answer 500");
    }

    // Blocking HTTP clients live inside `services`; build them, and drop them,
    // outside the async runtime.
    let services = Services::build(config)?;
    let queue = Arc::new(RunQueue::start(
        Arc::clone(&services.pipeline),
        services.history.clone(),
        config.runs.workers,
    )?);
    let state = AppState::new(
        Arc::clone(&services.store),
        Arc::clone(&queue) as Arc<dyn salescast_server::RunTrigger>,
        config.training_key(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;
    let address = config.bind_address();
    let served: Result<()> = runtime.block_on(async move {
        let listener = TcpListener::bind(address.as_str())
            .await
            .with_context(|| format!("binding {address}"))?;
        salescast_server::serve(listener, state, shutdown_signal())
            .await
            .context("serving HTTP")
    });
    drop(runtime);

    info!("HTTP server stopped, waiting for queued runs");
    queue.shutdown();
    drop(services);
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

fn run_train(config: &ServiceConfig) -> Result<()> {
    let services = Services::build(config)?;
    let summary = execute(&services.pipeline, services.history.as_deref(), &RunTicket::new());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_show(config: &ServiceConfig, granularity: Granularity) -> Result<()> {
    let services = Services::build(config)?;
    match services.store.get_latest(granularity)? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("no forecast stored for {granularity}"),
    }
}

fn run_history(config: &ServiceConfig, limit: usize) -> Result<()> {
    let Some(path) = &config.runs.history_path else {
        bail!("runs.history_path is not configured");
    };
    let history = RunHistory::new(path.clone());
    for summary in history
        .recent(limit)
        .with_context(|| format!("reading {}", path.display()))?
    {
        println!(
            "{}  {:>6} ms  {:>6} records  {}{}",
            summary.run_id,
            summary.duration_ms,
            summary.record_count,
            summary.outcome_line(),
            if summary.errors.is_empty() {
                String::new()
            } else {
                format!("  errors: {}", summary.errors.join("; "))
            }
        );
    }
    Ok(())
}
