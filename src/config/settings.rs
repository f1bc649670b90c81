use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::KeychainManager;
use crate::orchestrator::{DEFAULT_GAS_LIMIT, RunConfig};

const CONFIG_DIR: &str = "payoff-scripts";
const CONFIG_FILE: &str = "config.toml";

/// Local development node (anvil, hardhat node, ganache)
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,

    #[serde(default)]
    pub wallets: HashMap<String, WalletConfig>,

    #[serde(default)]
    pub defaults: Option<Defaults>,

    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Name of the keychain entry holding the private key
    pub keychain: Option<String>,
    /// Environment variable containing private key
    pub env_var: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    pub network: Option<String>,
    pub wallet: Option<String>,
}

/// `[run]` table: defaults for every scenario run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSettings {
    pub gas_limit: Option<u64>,
    pub from_account: Option<String>,
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub abort_on_transaction_error: bool,
}

impl AppConfig {
    /// Load configuration from default location, or defaults when there is none
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).wrap_err("Failed to parse config file")
    }

    /// Get the default configuration file path
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Network to connect to: the requested one, else the default one
    pub fn network_name<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or_else(|| self.defaults.as_ref()?.network.as_deref())
    }

    /// Wallet to sign with: the requested one, else the default one
    pub fn wallet_name<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or_else(|| self.defaults.as_ref()?.wallet.as_deref())
    }

    /// Resolve a wallet private key
    pub fn resolve_wallet_key(&self, name: &str) -> Result<Zeroizing<String>> {
        let wallet = self
            .wallets
            .get(name)
            .ok_or_else(|| eyre!("Wallet {} is not configured", name))?;

        let key = if let Some(keychain_ref) = &wallet.keychain {
            KeychainManager::new().get_zeroizing(keychain_ref)?
        } else if let Some(env_var) = &wallet.env_var {
            std::env::var(env_var).ok().map(Zeroizing::new)
        } else {
            None
        };

        key.ok_or_else(|| eyre!("No private key found for wallet {}", name))
    }

    /// Per-run settings with built-in defaults filled in
    pub fn run_config(&self) -> Result<RunConfig> {
        let from_account = self
            .run
            .from_account
            .as_deref()
            .map(|s| s.parse::<Address>())
            .transpose()
            .wrap_err("Invalid run.from_account")?;

        Ok(RunConfig {
            gas_limit: self.run.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
            from_account,
            wait_for_confirmations: self.run.confirmations.unwrap_or(1),
            abort_on_transaction_error: self.run.abort_on_transaction_error,
        })
    }
}
