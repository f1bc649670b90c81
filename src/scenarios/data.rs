use std::fs;
use std::path::Path;

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

const PRINCIPAL_AGENT_DEFAULTS: &str = include_str!("../../scenarios/principal_agent.toml");
const MULTI_COIN_DEFAULTS: &str = include_str!("../../scenarios/multi_coin.toml");

/// Read scenario data from `path`, or the bundled defaults when no file is given
fn load_or_default<T: DeserializeOwned>(path: Option<&Path>, defaults: &str) -> Result<T> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read scenario data: {:?}", path))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse scenario data: {:?}", path))
        }
        None => toml::from_str(defaults).wrap_err("Failed to parse bundled scenario data"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub agent_payoff: i64,
    pub principal_payoff: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub outcomes: Vec<Outcome>,
}

impl ContractTerms {
    /// Constructor literal for the `(string,int256,int256)[]` outcomes parameter
    pub fn outcomes_literal(&self) -> String {
        let items: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| {
                format!(
                    "({:?},{},{})",
                    o.name, o.agent_payoff, o.principal_payoff
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }
}

fn default_outcome() -> String {
    "high".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAgentData {
    #[serde(default = "default_outcome")]
    pub outcome: String,
    pub contracts: Vec<ContractTerms>,
}

impl PrincipalAgentData {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_or_default(path, PRINCIPAL_AGENT_DEFAULTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub platform_id: String,
    pub period: u64,
    /// Fixed point, scaled by 10000
    pub price: u64,
    /// Fixed point, scaled by 10000
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiCoinData {
    pub platform_ids: Vec<String>,
    pub spot_prices: Vec<u64>,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

impl MultiCoinData {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_or_default(path, MULTI_COIN_DEFAULTS)
    }

    pub fn platform_ids_literal(&self) -> String {
        format!("[{}]", self.platform_ids.join(","))
    }

    pub fn spot_prices_literal(&self) -> String {
        let prices: Vec<String> = self.spot_prices.iter().map(u64::to_string).collect();
        format!("[{}]", prices.join(","))
    }
}
