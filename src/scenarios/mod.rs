//! Scripted deploy-and-invoke runs.

mod data;
mod multi_coin;
mod principal_agent;

pub use data::{MultiCoinData, PrincipalAgentData};

use crate::error::Result;
use crate::orchestrator::Orchestrator;

/// A scenario together with the data it runs on
#[derive(Debug, Clone)]
pub enum Scenario {
    PrincipalAgent(PrincipalAgentData),
    MultiCoin(MultiCoinData),
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::PrincipalAgent(_) => "principal-agent",
            Scenario::MultiCoin(_) => "multi-coin",
        }
    }

    pub async fn run(&self, orch: &mut Orchestrator<'_>) -> Result<()> {
        match self {
            Scenario::PrincipalAgent(data) => principal_agent::run(orch, data).await,
            Scenario::MultiCoin(data) => multi_coin::run(orch, data).await,
        }
    }
}
