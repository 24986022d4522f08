//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the Ratchet sniper.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::discovery::ProcessDiscovery;
use crate::adapters::paper::PaperSwapExecutor;
use crate::adapters::quote_service::QuoteServiceClient;
use crate::adapters::swap_service::SwapServiceClient;
use crate::application::{AcquisitionPipeline, DiscoveryLoop, PortfolioCoordinator};
use crate::config::{load_config, Config, QUOTE_API_KEY_ENV, SWAP_API_KEY_ENV};
use crate::domain::{CheckpointStore, MonitorCheckpoint, Phase};
use crate::ports::{DiscoverySource, PriceOracle, SwapExecutor};

/// Ratchet - new-listing sniper with a trailing stop-loss
#[derive(Parser, Debug)]
#[command(
    name = "ratchet",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "New-listing sniper with a trailing stop-loss",
    long_about = "Ratchet buys newly listed tokens reported by a discovery scraper, watches \
                  every position against a trailing stop-loss and liquidates the whole batch \
                  as soon as the first position retraces from its peak."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/ratchet.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the discovery loop
    Run(RunCmd),

    /// Quote the value of a token amount in the chain's quote asset
    Quote(QuoteCmd),

    /// Run the discovery scraper once and print the candidates
    Discover,

    /// Show checkpointed positions
    Status(StatusCmd),

    /// Resume checkpointed positions left by a previous run
    Resume(ResumeCmd),
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Run in paper trading mode (fills at quote, no transactions)
    #[arg(short, long)]
    pub paper: bool,
}

#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Blockchain name as used in [chains] (e.g. bsc)
    #[arg(value_name = "CHAIN")]
    pub chain: String,

    /// Token contract address
    #[arg(value_name = "TOKEN")]
    pub token: String,

    /// Token amount to value
    #[arg(value_name = "AMOUNT")]
    pub amount: Decimal,
}

#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,
}

#[derive(Parser, Debug)]
pub struct ResumeCmd {
    /// Run in paper trading mode (fills at quote, no transactions)
    #[arg(short, long)]
    pub paper: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, &config).await,
        Command::Quote(cmd) => quote_command(cmd, &config).await,
        Command::Discover => discover_command(&config).await,
        Command::Status(cmd) => status_command(cmd, &config),
        Command::Resume(cmd) => resume_command(cmd, &config).await,
    }
}

/// Initialize logging system
///
/// `RUST_LOG` wins, then the CLI flags, then the configured level.
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn build_oracle(config: &Config) -> Result<Arc<dyn PriceOracle>> {
    let client = QuoteServiceClient::new(config.quote_service.service_config(QUOTE_API_KEY_ENV))
        .context("Failed to create quote service client")?;
    Ok(Arc::new(client))
}

fn build_executor(config: &Config, oracle: &Arc<dyn PriceOracle>, paper: bool) -> Result<Arc<dyn SwapExecutor>> {
    if paper {
        tracing::warn!("Running in PAPER TRADING mode - no real transactions");
        return Ok(Arc::new(PaperSwapExecutor::new(Arc::clone(oracle))));
    }

    let client = SwapServiceClient::new(config.swap_service.service_config(SWAP_API_KEY_ENV))
        .context("Failed to create swap service client")?;
    Ok(Arc::new(client))
}

fn build_coordinator(
    config: &Config,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn SwapExecutor>,
) -> Result<PortfolioCoordinator> {
    let coordinator_config = config
        .coordinator_config()
        .context("Invalid coordinator configuration")?;
    Ok(PortfolioCoordinator::new(oracle, executor, coordinator_config)
        .with_checkpoints(config.data_dir().map(CheckpointStore::new)))
}

fn build_discovery(config: &Config) -> ProcessDiscovery {
    ProcessDiscovery::new(config.discovery_command(), config.discovery.args.clone())
        .with_timeout(config.discovery_timeout())
}

/// Handle run command
async fn run_command(cmd: RunCmd, config: &Config) -> Result<()> {
    tracing::info!("Starting Ratchet...");

    let oracle = build_oracle(config)?;
    let executor = build_executor(config, &oracle, cmd.paper)?;
    let registry = Arc::new(config.chain_registry());

    tracing::info!(
        "Chains: {} | buy {} per candidate | stop-loss {} | poll every {}s",
        registry.names().join(", "),
        config.acquisition.buy_amount,
        config.monitor.stop_loss_fraction,
        config.monitor.poll_interval_secs
    );

    if let Some(dir) = config.data_dir() {
        let leftovers = CheckpointStore::new(&dir)
            .load_all()
            .context("Failed to read checkpoints")?;
        if !leftovers.is_empty() {
            tracing::warn!(
                "{} positions checkpointed by a previous run in {} - see `ratchet status` and `ratchet resume`",
                leftovers.len(),
                dir.display()
            );
        }
    }

    let pipeline = AcquisitionPipeline::new(Arc::clone(&executor), registry, config.acquisition.buy_amount);
    let coordinator = build_coordinator(config, oracle, executor)?;
    let discovery: Arc<dyn DiscoverySource> = Arc::new(build_discovery(config));

    let discovery_loop = DiscoveryLoop::new(discovery, Arc::new(pipeline), Arc::new(coordinator))
        .with_interval(config.discovery_interval());

    let stopper = discovery_loop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping discovery (open positions stop with the process)");
            stopper.stop().await;
        }
    });

    discovery_loop.run().await;

    let status = discovery_loop.status().await;
    tracing::info!(
        "Shutdown: {} discovery cycles, {} batches started, {} discovery failures",
        status.cycles,
        status.batches_spawned,
        status.discovery_failures
    );
    Ok(())
}

/// Handle quote command
async fn quote_command(cmd: QuoteCmd, config: &Config) -> Result<()> {
    let registry = config.chain_registry();
    let Some(route) = registry.resolve(&cmd.chain) else {
        bail!(
            "No chain mapping for '{}' (configured: {})",
            cmd.chain,
            registry.names().join(", ")
        );
    };

    let oracle = build_oracle(config)?;
    let path = vec![cmd.token.clone(), route.quote_asset.clone()];
    let quote = oracle
        .quote(route, &path, cmd.amount)
        .await
        .context("Quote failed")?;

    println!("Quote on {} via {}:", route.blockchain, route.dex_id);
    println!("  {} of {}", quote.input_amount, cmd.token);
    println!("  = {} of {}", quote.output_amount, route.quote_asset);
    Ok(())
}

/// Handle discover command
async fn discover_command(config: &Config) -> Result<()> {
    let discovery = build_discovery(config);
    let registry = config.chain_registry();

    let candidates = discovery.discover().await.context("Discovery failed")?;
    if candidates.is_empty() {
        println!("No new listings.");
        return Ok(());
    }

    println!("{} candidates:", candidates.len());
    for candidate in &candidates {
        let mapped = if registry.resolve(&candidate.blockchain).is_some() {
            ""
        } else {
            "  (unmapped chain, would be skipped)"
        };
        println!(
            "  {:<10} {:<12} {}{}",
            candidate.blockchain, candidate.ticker, candidate.contract_address, mapped
        );
    }
    Ok(())
}

/// Handle status command
fn status_command(cmd: StatusCmd, config: &Config) -> Result<()> {
    let Some(dir) = config.data_dir() else {
        bail!("Persistence is disabled: set [persistence].data_dir to record positions");
    };

    let checkpoints = CheckpointStore::new(&dir)
        .load_all()
        .context("Failed to read checkpoints")?;

    match cmd.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&checkpoints)?);
        }
        _ => {
            if checkpoints.is_empty() {
                println!("No open positions in {}", dir.display());
                return Ok(());
            }
            println!("{} positions in {}:", checkpoints.len(), dir.display());
            for checkpoint in &checkpoints {
                println!("  {}", describe(checkpoint));
            }
        }
    }
    Ok(())
}

/// Handle resume command
async fn resume_command(cmd: ResumeCmd, config: &Config) -> Result<()> {
    let Some(dir) = config.data_dir() else {
        bail!("Persistence is disabled: nothing to resume");
    };

    let states: Vec<_> = CheckpointStore::new(&dir)
        .load_all()
        .context("Failed to read checkpoints")?
        .into_iter()
        .map(MonitorCheckpoint::into_state)
        .filter(|state| !state.is_sold())
        .collect();

    if states.is_empty() {
        println!("No positions to resume.");
        return Ok(());
    }

    tracing::info!("Resuming {} checkpointed positions as one batch", states.len());

    let oracle = build_oracle(config)?;
    let executor = build_executor(config, &oracle, cmd.paper)?;
    let coordinator = build_coordinator(config, oracle, executor)?;

    let manifest = coordinator.run_states(states).await;
    for disposal in &manifest.disposals {
        match disposal.realized() {
            Some(realized) => println!("  SOLD   {} for {}", disposal.position.label(), realized),
            None => println!("  FAILED {}", disposal.position.label()),
        }
    }
    println!("Realized {}", manifest.total_realized());

    if manifest.failures().next().is_some() {
        bail!("{} sells failed", manifest.failures().count());
    }
    Ok(())
}

fn describe(checkpoint: &MonitorCheckpoint) -> String {
    let position = &checkpoint.position;
    let phase = match &checkpoint.phase {
        Phase::Watching => {
            let threshold = checkpoint.high_water_mark * (Decimal::ONE - checkpoint.stop_loss_fraction.value());
            format!("WATCHING  high {} stop {}", checkpoint.high_water_mark, threshold)
        }
        Phase::Triggered { reason, trigger_value } => format!(
            "TRIGGERED ({:?}{}) - sell pending",
            reason,
            trigger_value.map(|v| format!(" at {}", v)).unwrap_or_default()
        ),
        Phase::Sold { realized, .. } => format!("SOLD for {}", realized),
    };

    format!(
        "{:<20} {:<44} held {:<16} {} (updated {})",
        position.label(),
        position.token,
        position.held_amount,
        phase,
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainRoute, MonitorState, Position, StopLossFraction};
    use clap::CommandFactory;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cli_definition_is_valid() {
        CliApp::command().debug_assert();
    }

    #[test]
    fn test_parse_run_paper() {
        let app = CliApp::parse_from(["ratchet", "run", "--paper", "-c", "custom.toml"]);
        assert_eq!(app.config, PathBuf::from("custom.toml"));
        assert!(matches!(app.command, Command::Run(RunCmd { paper: true })));
    }

    #[test]
    fn test_parse_quote_amount_as_decimal() {
        let app = CliApp::parse_from(["ratchet", "quote", "bsc", "0xPEPE", "1500.25"]);
        match app.command {
            Command::Quote(cmd) => {
                assert_eq!(cmd.chain, "bsc");
                assert_eq!(cmd.amount, dec!(1500.25));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(app.config, PathBuf::from("config/ratchet.toml"));
    }

    #[test]
    fn test_describe_watching_shows_stop() {
        let chain = ChainRoute {
            blockchain: "bsc".to_string(),
            chain_id: 56,
            dex_id: "pancakeswap".to_string(),
            quote_asset: "0xUSDT".to_string(),
        };
        let position = Position::new("0xPEPE".to_string(), "PEPE".to_string(), dec!(1000), chain).unwrap();
        let mut state = MonitorState::new(position, StopLossFraction::new(dec!(0.1)).unwrap());
        state.observe(dec!(200));

        let line = describe(&MonitorCheckpoint::from(&state));
        assert!(line.contains("PEPE@bsc"));
        assert!(line.contains("WATCHING"));
        assert!(line.contains("stop 180"));
    }
}
