use std::sync::Arc;

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use zeroize::Zeroizing;

use super::abi::coerce_args;
use super::deployment::{ArtifactStore, DeploymentRequest, DeploymentResult, DeploymentService};
use crate::error::{self, OrchestrationError};

/// A deployed contract bound to the interface used to talk to it
#[derive(Debug, Clone)]
pub struct ContractHandle {
    pub name: String,
    pub address: Address,
    pub abi: Arc<JsonAbi>,
}

/// Signing identity and budget attached to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    pub from: Address,
    /// `None` lets the node estimate
    pub gas_limit: Option<u64>,
    pub confirmations: u64,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Executes reads and transactions against deployed contracts
#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// Accounts available to sign, first one is the default caller
    async fn accounts(&self) -> error::Result<Vec<Address>>;

    async fn call(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        from: Address,
    ) -> error::Result<Vec<DynSolValue>>;

    async fn send(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        options: &TxOptions,
    ) -> error::Result<TxReceipt>;
}

/// JSON-RPC client shared by deployments and contract calls for one run
pub struct AlloyClient {
    provider: DynProvider,
    signer: Option<Address>,
    artifacts: ArtifactStore,
}

impl AlloyClient {
    /// Connect to `rpc_url`, signing locally when a private key is supplied and
    /// through the node's unlocked accounts otherwise
    pub async fn connect(
        rpc_url: &str,
        private_key: Option<Zeroizing<String>>,
        artifacts: ArtifactStore,
    ) -> Result<Self> {
        let (provider, signer) = match private_key {
            Some(key) => {
                let key_str = key.as_str();
                let clean_key = key_str.strip_prefix("0x").unwrap_or(key_str);
                let signer: PrivateKeySigner =
                    clean_key.parse().wrap_err("Failed to parse private key")?;
                let address = signer.address();

                // Deployments are sent concurrently, so nonces must be tracked locally
                let provider = ProviderBuilder::new()
                    .with_cached_nonce_management()
                    .wallet(EthereumWallet::from(signer))
                    .connect(rpc_url)
                    .await
                    .wrap_err("Failed to connect to RPC")?
                    .erased();
                (provider, Some(address))
            }
            None => {
                let provider = ProviderBuilder::new()
                    .with_cached_nonce_management()
                    .connect(rpc_url)
                    .await
                    .wrap_err("Failed to connect to RPC")?
                    .erased();
                (provider, None)
            }
        };

        tracing::info!("Connected to {}", rpc_url);

        Ok(Self {
            provider,
            signer,
            artifacts,
        })
    }

    async fn submit(
        &self,
        label: &str,
        tx: TransactionRequest,
        options: &TxOptions,
    ) -> std::result::Result<alloy::rpc::types::TransactionReceipt, String> {
        let mut tx = tx.with_from(options.from);
        if let Some(gas) = options.gas_limit {
            tx.set_gas_limit(gas);
        }

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| format!("failed to send transaction: {}", e))?;

        tracing::debug!("Transaction hash for {}: {}", label, pending.tx_hash());

        let receipt = pending
            .with_required_confirmations(options.confirmations)
            .get_receipt()
            .await
            .map_err(|e| format!("failed to confirm transaction: {}", e))?;

        if !receipt.status() {
            return Err(format!("reverted in {}", receipt.transaction_hash));
        }

        Ok(receipt)
    }
}

#[async_trait]
impl ContractBackend for AlloyClient {
    async fn accounts(&self) -> error::Result<Vec<Address>> {
        let node_accounts = self.provider.get_accounts().await;

        match (self.signer, node_accounts) {
            (Some(signer), Ok(mut accounts)) => {
                accounts.retain(|a| *a != signer);
                accounts.insert(0, signer);
                Ok(accounts)
            }
            // Public endpoints commonly refuse eth_accounts
            (Some(signer), Err(e)) => {
                tracing::debug!("eth_accounts unavailable: {}", e);
                Ok(vec![signer])
            }
            (None, Ok(accounts)) => Ok(accounts),
            (None, Err(e)) => Err(OrchestrationError::Config(format!(
                "Failed to list node accounts: {}",
                e
            ))),
        }
    }

    async fn call(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        from: Address,
    ) -> error::Result<Vec<DynSolValue>> {
        let calldata = function
            .abi_encode_input(args)
            .map_err(|e| OrchestrationError::Encoding {
                method: function.name.clone(),
                reason: e.to_string(),
            })?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(address)
            .with_input(calldata);

        let output = self
            .provider
            .call(tx)
            .await
            .map_err(|e| OrchestrationError::Query {
                method: function.name.clone(),
                reason: e.to_string(),
            })?;

        function
            .abi_decode_output(&output)
            .map_err(|e| OrchestrationError::Encoding {
                method: function.name.clone(),
                reason: e.to_string(),
            })
    }

    async fn send(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        options: &TxOptions,
    ) -> error::Result<TxReceipt> {
        let calldata = function
            .abi_encode_input(args)
            .map_err(|e| OrchestrationError::Encoding {
                method: function.name.clone(),
                reason: e.to_string(),
            })?;

        let tx = TransactionRequest::default()
            .with_to(address)
            .with_input(calldata);

        let receipt = self
            .submit(&function.name, tx, options)
            .await
            .map_err(|reason| OrchestrationError::Transaction {
                method: function.name.clone(),
                reason,
            })?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}

#[async_trait]
impl DeploymentService for AlloyClient {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        options: &TxOptions,
    ) -> error::Result<DeploymentResult> {
        let name = &request.contract_name;
        let fail = |reason: String| OrchestrationError::Deployment {
            contract: name.clone(),
            reason,
        };

        let artifact = self
            .artifacts
            .load(name)
            .map_err(|e| fail(format!("{:#}", e)))?;
        let bytecode = artifact
            .bytecode
            .ok_or_else(|| fail("artifact has no creation bytecode".to_string()))?;

        let mut code = bytecode.to_vec();
        match artifact.abi.constructor() {
            Some(constructor) => {
                let values = coerce_args(&constructor.inputs, &request.constructor_args)
                    .map_err(|e| fail(format!("{:#}", e)))?;
                let encoded = constructor
                    .abi_encode_input(&values)
                    .map_err(|e| fail(e.to_string()))?;
                code.extend(encoded);
            }
            None if !request.constructor_args.is_empty() => {
                return Err(fail(format!(
                    "constructor takes no arguments, got {}",
                    request.constructor_args.len()
                )));
            }
            None => {}
        }

        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self.submit(name, tx, options).await.map_err(fail)?;

        let address = receipt
            .contract_address
            .ok_or_else(|| fail("no contract address in receipt".to_string()))?;

        Ok(DeploymentResult {
            contract_name: name.clone(),
            address,
            tx_hash: Some(receipt.transaction_hash),
        })
    }
}
