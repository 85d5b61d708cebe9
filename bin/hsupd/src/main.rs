//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "binary"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Binary entrypoint for the HSUP daemon."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
mod bootstrap;

use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use hsup_common::config::AppConfig;
use hsup_common::logging::init_tracing;
use hsup_common::version::VersionInfo;
use hsup_core::ConfigStore;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = env!("CARGO_PKG_VERSION"),
    about = "HSUP host supervisor daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the supervisor")]
    Run,
    #[command(about = "Fetch the update feed once and print the advertised tags")]
    CheckUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("/etc/hsup/hsup.toml"));
    candidates.push(PathBuf::from("configs/hsup.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("hsupd", &config.logging)?;
    info!(
        version = %version.cli_string(),
        source = %loaded.source.display(),
        "configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await?,
        Commands::CheckUpdate => check_update(&config).await?,
    }

    Ok(())
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let orchestrator = bootstrap::build_orchestrator(&config)?;

    let outcome = tokio::select! {
        result = orchestrator.start() => result,
        _ = shutdown_signal() => {
            info!(stage = ?orchestrator.stage(), "termination signal received");
            Ok(())
        }
    };
    orchestrator.stop().await;

    if let Err(err) = &outcome {
        error!(error = %err, "supervisor startup failed");
    }
    outcome.context("supervisor terminated with an error")
}

async fn check_update(config: &AppConfig) -> Result<()> {
    let (_session, system) = bootstrap::system_configuration(config)?;
    if !system.fetch_update_infos().await {
        warn!(url = %config.update.url, "update feed unavailable");
        anyhow::bail!("unable to fetch update infos from {}", config.update.url);
    }
    let data = system.snapshot();
    println!(
        "Home Assistant: installed {} / latest {}\nSupervisor: latest {}",
        data.homeassistant_tag.as_deref().unwrap_or("none"),
        data.current_homeassistant.as_deref().unwrap_or("none"),
        data.current_supervisor.as_deref().unwrap_or("none"),
    );
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = ctrl_c() => {},
            _ = terminate() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
    }
}

async fn ctrl_c() {
    signal_received(signal::ctrl_c(), "Ctrl+C").await;
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            signal_received(
                async move {
                    term.recv().await;
                    Ok(())
                },
                "SIGTERM",
            )
            .await
        }
        Err(err) => signal_received(async { Err(err) }, "SIGTERM").await,
    }
}

/// Resolves once `listener` reports its signal. A handler that cannot be
/// installed never resolves, so it cannot trigger shutdown on its own.
async fn signal_received<F>(listener: F, handler: &'static str)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = listener.await {
        warn!(?err, handler, "failed to install signal handler");
        std::future::pending::<()>().await;
    }
}
