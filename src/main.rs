mod config;
mod contracts;
mod error;
mod orchestrator;
mod project;
mod scenarios;
#[cfg(test)]
mod testing;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use tracing::info;

use config::{AppConfig, DEFAULT_RPC_URL};
use contracts::{AlloyClient, ArtifactStore};
use orchestrator::Orchestrator;
use project::Project;
use scenarios::{MultiCoinData, PrincipalAgentData, Scenario};

#[derive(Parser, Debug)]
#[command(name = "payoff-scripts")]
#[command(about = "Deploy payoff contracts and script calls against them")]
#[command(version)]
struct Cli {
    /// Path to the project holding the compiled contracts
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Skip project detection and force a specific project type
    #[arg(long, value_parser = ["foundry", "hardhat", "remix"])]
    project_type: Option<String>,

    /// Configuration file, instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network name from the configuration or the project's rpc endpoints
    #[arg(long)]
    network: Option<String>,

    /// Wallet name from the configuration; node accounts sign otherwise
    #[arg(long)]
    wallet: Option<String>,

    #[arg(long)]
    gas_limit: Option<u64>,

    #[arg(long)]
    confirmations: Option<u64>,

    /// Stop the run at the first failing transaction
    #[arg(long)]
    abort_on_tx_error: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Contract manager with one contract per principal
    PrincipalAgent {
        /// Scenario data (TOML); bundled defaults otherwise
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Multi-coin controller with platform entitlements
    MultiCoin {
        /// Scenario data (TOML); bundled defaults otherwise
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

impl Command {
    fn scenario(&self) -> Result<Scenario> {
        let scenario = match self {
            Command::PrincipalAgent { data } => {
                Scenario::PrincipalAgent(PrincipalAgentData::load(data.as_deref())?)
            }
            Command::MultiCoin { data } => Scenario::MultiCoin(MultiCoinData::load(data.as_deref())?),
        };
        Ok(scenario)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    }

    let cli = Cli::parse();
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    let app_config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Detect project type
    let project = match cli.project_type.as_deref() {
        Some("foundry") => Project::new_foundry(&project_path)?,
        Some("hardhat") => Project::new_hardhat(&project_path)?,
        Some("remix") => Project::new_remix(&project_path)?,
        _ => project::detect(&project_path)?,
    };
    info!("Using {} project {}", project.project_type, project.name);

    let scenario = cli.command.scenario()?;

    let mut run_config = app_config.run_config()?;
    if let Some(gas_limit) = cli.gas_limit {
        run_config.gas_limit = gas_limit;
    }
    if let Some(confirmations) = cli.confirmations {
        run_config.wait_for_confirmations = confirmations;
    }
    run_config.abort_on_transaction_error |= cli.abort_on_tx_error;

    let rpc_url = rpc_url(&app_config, &project, cli.network.as_deref())?;
    let private_key = match app_config.wallet_name(cli.wallet.as_deref()) {
        Some(name) => Some(app_config.resolve_wallet_key(name)?),
        None => None,
    };

    let resolver = ArtifactStore::new(project.clone());
    let client = AlloyClient::connect(&rpc_url, private_key, ArtifactStore::new(project))
        .await
        .wrap_err_with(|| format!("Cannot reach node at {}", rpc_url))?;

    info!("Running {} scenario", scenario.name());
    let mut orch = Orchestrator::new(&client, &resolver, &client, run_config);

    match scenario.run(&mut orch).await {
        Ok(()) => {
            let report = orch.finish()?;
            report.log_summary();
            Ok(())
        }
        Err(e) => {
            orch.report().log_summary();
            Err(e).wrap_err_with(|| format!("{} scenario failed", scenario.name()))
        }
    }
}

/// RPC endpoint for the run
///
/// The requested network, else the default one, is looked up in the
/// configuration and then in the project's own endpoints. Without any
/// network name the run goes to a local node.
fn rpc_url(config: &AppConfig, project: &Project, network: Option<&str>) -> Result<String> {
    let Some(name) = config.network_name(network) else {
        return Ok(DEFAULT_RPC_URL.to_string());
    };

    if let Some(network) = config.networks.get(name) {
        info!("Using network {}", name);
        return Ok(network.rpc_url.clone());
    }

    let url = project
        .rpc_endpoints
        .get(name)
        .cloned()
        .ok_or_else(|| eyre!("Unknown network {}", name))?;
    info!("Using {} endpoint {}", project.project_type, name);
    Ok(url)
}
