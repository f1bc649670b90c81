use tracing::info;

use super::data::MultiCoinData;
use crate::contracts::{ContractHandle, DeploymentRequest, format_scaled_list, format_value};
use crate::error::{OrchestrationError, Result};
use crate::orchestrator::Orchestrator;

/// Prices and amounts are stored on chain multiplied by this factor
pub const FIXED_POINT_SCALE: u64 = 10_000;

/// Deploy a multi-coin controller, mint the caller's platform coin and attach
/// the configured platform entitlements to it
pub async fn run(orch: &mut Orchestrator<'_>, data: &MultiCoinData) -> Result<()> {
    let requests = [DeploymentRequest::new(
        "MultiCoinController",
        vec![data.platform_ids_literal()],
    )];
    let deployed = orch.deploy_all(&requests).await?;
    info!("All contracts deployed");

    let controller = orch.bind(&deployed[0], "MultiCoinController").await?;
    let coin = user_coin(orch, &controller).await?;

    orch.query(&coin, "getNumPlatforms", "number of platforms", &[])
        .await;

    orch.execute(
        &controller,
        "setSpotPrices",
        "setting spot prices",
        &[data.spot_prices_literal()],
    )
    .await?;

    let coin_address = coin.address.to_string();
    for entitlement in &data.entitlements {
        let args = [
            coin_address.clone(),
            entitlement.platform_id.clone(),
            entitlement.period.to_string(),
            entitlement.price.to_string(),
            entitlement.amount.to_string(),
        ];
        orch.execute(&controller, "addPlatform", "adding platform", &args)
            .await?;
    }

    orch.query(&coin, "getNumPlatforms", "number of platforms", &[])
        .await;

    log_platforms(orch, &controller, &coin).await;
    Ok(())
}

/// Create the caller's coin and bind to it
async fn user_coin(
    orch: &mut Orchestrator<'_>,
    controller: &ContractHandle,
) -> Result<ContractHandle> {
    orch.execute(controller, "getPlatformCoin", "creating platform coin", &[])
        .await?;

    let address = orch
        .query(controller, "getUserCoin", "coin", &[])
        .await
        .and_then(|value| value.as_address())
        .filter(|address| !address.is_zero());

    match address {
        Some(address) => orch.bind_address(address, "PlatformCoin").await,
        None => Err(orch.fail(OrchestrationError::Resolution {
            contract: "PlatformCoin".to_string(),
            reason: "controller holds no coin for the caller".to_string(),
        })),
    }
}

async fn log_platforms(
    orch: &mut Orchestrator<'_>,
    controller: &ContractHandle,
    coin: &ContractHandle,
) {
    let Some(info) = orch
        .query(
            controller,
            "listCoinPlatforms",
            "platform info",
            &[coin.address.to_string()],
        )
        .await
    else {
        return;
    };

    if let (Some(ids), Some(periods), Some(prices), Some(amounts)) =
        (info.get(0), info.get(1), info.get(2), info.get(3))
    {
        info!("Current platform IDs: {}", format_value(ids));
        info!("Current trade periods: {}", format_value(periods));
        info!(
            "Current trade prices: {}",
            format_scaled_list(prices, FIXED_POINT_SCALE)
        );
        info!(
            "Current trade amounts: {}",
            format_scaled_list(amounts, FIXED_POINT_SCALE)
        );
    }
}
