//! meta-bundler entry point.
//!
//! ## CLI Subcommands
//!
//! - `meta-bundler` or `meta-bundler serve` - Run ingress and the cycle scheduler (default)
//! - `meta-bundler config show` - Print the effective configuration as JSON

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::net::TcpListener;

use meta_bundler::chain::JsonRpcClient;
use meta_bundler::config::{self, ConfigError};
use meta_bundler::outcome::FailureLog;
use meta_bundler::telemetry::{self, LogError};
use meta_bundler::Bundler;

#[derive(Parser)]
#[command(name = "meta-bundler", version, about = "Batches user operations into EntryPoint handleOps calls")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run ingress and the cycle scheduler until interrupted
    Serve,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
}

#[derive(Debug, Error)]
enum ServeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LogError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scheduler task failed: {0}")]
    Scheduler(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => match serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Command::Config { action: ConfigCommand::Show } => show_config(),
    }
}

fn show_config() -> ExitCode {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&cfg.effective_config()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to render configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), ServeError> {
    let cfg = config::load()?;
    telemetry::init_logging(&cfg.log)?;

    tracing::info!(
        entry_point = %cfg.entry_point,
        operator = %cfg.operator,
        rpc_url = %cfg.rpc_url,
        correlation = %cfg.correlation,
        "bundler starting"
    );

    let client = Arc::new(JsonRpcClient::new(cfg.rpc_config()));
    let bundler = Bundler::new(cfg.engine_config(), client, FailureLog::new(&cfg.failure_log));

    let listener = TcpListener::bind(cfg.listen_addr).await?;
    let scheduler = bundler.start_scheduler(cfg.interval);
    tracing::info!(addr = %cfg.listen_addr, "ingress listening");

    axum::serve(listener, bundler.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ingress closed, waiting for in-flight cycle");
    scheduler.shutdown().await?;
    tracing::info!(unsubmitted = bundler.queue.len(), "bundler stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
