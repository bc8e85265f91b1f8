//! runbox server binary
//!
//! Loads the sandbox configuration (YAML file, then `RUNBOX_*` environment
//! variables, then command-line flags) and serves `/execute` until Ctrl+C or
//! SIGTERM.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use runbox_core::{ConfigLoader, SandboxConfig};
use runbox_server::{shutdown_signal, SandboxServer};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "runbox server - run submitted code in disposable processes")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Path to a YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, help = "Address to listen on, e.g. 0.0.0.0:5000")]
    bind_addr: Option<String>,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Root directory for run output files")]
    workspace_dir: Option<PathBuf>,

    #[clap(long, help = "Execution timeout in seconds")]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the server (default command)
    Run,
    /// Print the effective configuration as YAML and exit
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins when set
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .parse_default_env()
        .init();

    let config = load_config(&cli).await?;

    match cli.command {
        Some(Commands::ShowConfig) => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Some(Commands::Run) | None => run_server(config).await,
    }
}

async fn load_config(cli: &Cli) -> Result<SandboxConfig> {
    match &cli.config {
        Some(path) => log::info!("Loading configuration from file: {}", path.display()),
        None => log::info!("No configuration file given"),
    }
    let mut config = ConfigLoader::load(cli.config.as_deref()).await?;

    if let Some(bind_addr) = &cli.bind_addr {
        config.server.bind_addr = bind_addr.clone();
    }
    if let Some(dir) = &cli.workspace_dir {
        config.workspace.root = dir.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.execution.timeout_secs = timeout;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

async fn run_server(config: SandboxConfig) -> Result<()> {
    log::info!("Configuration:");
    log::info!("  Bind address: {}", config.server.bind_addr);
    log::info!(
        "  Interpreter: {} {:?}",
        config.execution.interpreter.program,
        config.execution.interpreter.args
    );
    log::info!("  Timeout: {}s", config.execution.timeout_secs);
    log::info!(
        "  Workspace: {} ({:?})",
        config.workspace.root.display(),
        config.workspace.isolation
    );

    let server = SandboxServer::from_config(&config)?;

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    log::info!("runbox server shut down gracefully.");
    Ok(())
}
