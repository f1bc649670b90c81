use tracing::info;

use super::data::PrincipalAgentData;
use crate::contracts::DeploymentRequest;
use crate::error::{OrchestrationError, Result};
use crate::orchestrator::{CallDescriptor, Orchestrator};

/// Deploy a contract manager and one contract per principal, register the
/// contracts and read back the payoffs for the configured outcome
///
/// Contract `i` names `accounts[i]` as principal and `accounts[0]` as agent.
pub async fn run(orch: &mut Orchestrator<'_>, data: &PrincipalAgentData) -> Result<()> {
    let count = data.contracts.len();
    let accounts = match orch.accounts().await {
        Ok(accounts) => accounts,
        Err(e) => return Err(orch.fail(e)),
    };
    // The agent is accounts[0] even when no contract is listed
    let needed = count.max(1);
    if accounts.len() < needed {
        return Err(orch.fail(OrchestrationError::Config(format!(
            "{} principal-agent contracts need {} account(s), the node exposes {}",
            count,
            needed,
            accounts.len()
        ))));
    }
    let agent = accounts[0];

    let mut requests = vec![DeploymentRequest::new("ContractManager", vec![])];
    requests.extend(data.contracts.iter().zip(&accounts).map(|(terms, principal)| {
        DeploymentRequest::new(
            "Contract",
            vec![
                principal.to_string(),
                agent.to_string(),
                terms.outcomes_literal(),
            ],
        )
    }));

    let deployed = orch.deploy_all(&requests).await?;
    info!(
        "All contracts deployed, there were {} principal-agent contracts",
        count
    );

    let manager = orch.bind(&deployed[0], "ContractManager").await?;
    let mut contracts = Vec::with_capacity(count);
    for result in &deployed[1..] {
        contracts.push(orch.bind(result, "Contract").await?);
    }

    for contract in &contracts {
        let address = contract.address.to_string();
        orch.execute(
            &manager,
            "addContract",
            &format!("adding contract at address {}", address),
            &[address],
        )
        .await?;
    }

    let outcome = &data.outcome;
    let steps = [
        CallDescriptor::query("getNumContracts", "total number of contracts", vec![]),
        CallDescriptor::query(
            "totalY",
            format!("total agent payoff for outcome {}", outcome),
            vec![outcome.clone()],
        ),
        CallDescriptor::query(
            "totalQ",
            format!("total principal payoff for outcome {}", outcome),
            vec![outcome.clone()],
        ),
        CallDescriptor::transaction(
            "assessOutcome",
            format!("assessing outcome {}", outcome),
            vec![outcome.clone()],
        ),
        CallDescriptor::query(
            "principalPayouts",
            format!("principal payout for {}", agent),
            vec![agent.to_string()],
        ),
    ];
    for step in &steps {
        orch.run_step(&manager, step).await?;
    }

    Ok(())
}
