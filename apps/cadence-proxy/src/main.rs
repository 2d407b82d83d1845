use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relaykit_bootstrap::{AppConfig, CliArgs, Signals, init_logging};
use workflow_proxy::{Proxy, ProxyConfig};

use std::path::PathBuf;

/// Cadence Proxy - transparent forwarding proxy for the Cadence workflow service
#[derive(Parser)]
#[command(name = "cadence-proxy")]
#[command(about = "Cadence Proxy - forwards WorkflowService calls from HTTP to a Cadence frontend")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inbound HTTP bind address (overrides config and `BIND_ADDRESS`)
    #[arg(short, long)]
    bind: Option<String>,

    /// Cadence frontend address (overrides config and `CADENCE_ADDRESS`)
    #[arg(long)]
    cadence: Option<String>,

    /// Log the duration of every forwarded call
    #[arg(long)]
    timing: bool,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.clone(),
        bind: cli.bind.clone(),
        cadence: cli.cadence.clone(),
        timing: cli.timing,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) legacy env -> 5) CLI overrides
    let mut config = AppConfig::load_layered(cli.config.as_deref())?;
    config.apply_cli_overrides(&args)?;

    init_logging(&config.logging)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_pretty_json()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_proxy(&config).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    Proxy::new(&ProxyConfig::from(config)).context("failed to wire the proxy")?;
    println!("Configuration is valid");
    println!("{}", config.to_pretty_json()?);
    Ok(())
}

async fn run_proxy(config: &AppConfig) -> Result<()> {
    let proxy_config = ProxyConfig::from(config);
    let mut proxy = Proxy::new(&proxy_config).context("failed to wire the proxy")?;
    let mut signals = Signals::install()?;

    proxy
        .start()
        .await
        .with_context(|| format!("failed to start on {}", proxy_config.bind_address))?;
    tracing::info!(
        bind = %proxy_config.bind_address,
        cadence = %proxy_config.cadence_address,
        timing = proxy_config.timing,
        "Cadence proxy started"
    );

    let signal = signals.recv().await;
    proxy.stop().await;
    tracing::info!("Cadence proxy stopped");

    signal?;
    Ok(())
}
