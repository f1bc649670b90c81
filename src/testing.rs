//! In-memory stand-in for a node and the scenario contracts.
//!
//! The simulated contracts keep just enough state to make the scripted calls
//! observable: managers count their contracts, controllers mint one coin per
//! caller, coins count their platform entitlements.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::{Function, JsonAbi},
    primitives::{Address, B256, I256, TxHash, U256},
};
use async_trait::async_trait;

use crate::contracts::{
    AbiResolver, ContractBackend, DeploymentRequest, DeploymentResult, DeploymentService,
    TxOptions, TxReceipt, coerce_args,
};
use crate::error::{OrchestrationError, Result};

pub const CONTRACT_MANAGER_ABI: &str = r#"[
    {"type": "constructor", "inputs": [], "stateMutability": "nonpayable"},
    {"type": "function", "name": "addContract", "stateMutability": "nonpayable",
     "inputs": [{"name": "contractAddress", "type": "address"}], "outputs": []},
    {"type": "function", "name": "getNumContracts", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "uint256"}]},
    {"type": "function", "name": "numPrincipals", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "uint256"}]},
    {"type": "function", "name": "totalY", "stateMutability": "view",
     "inputs": [{"name": "outcome", "type": "string"}], "outputs": [{"name": "", "type": "int256"}]},
    {"type": "function", "name": "totalQ", "stateMutability": "view",
     "inputs": [{"name": "outcome", "type": "string"}], "outputs": [{"name": "", "type": "int256"}]},
    {"type": "function", "name": "assessOutcome", "stateMutability": "nonpayable",
     "inputs": [{"name": "outcome", "type": "string"}], "outputs": []},
    {"type": "function", "name": "principalPayouts", "stateMutability": "view",
     "inputs": [{"name": "principal", "type": "address"}], "outputs": [{"name": "", "type": "int256"}]}
]"#;

pub const CONTRACT_ABI: &str = r#"[
    {"type": "constructor", "stateMutability": "nonpayable", "inputs": [
        {"name": "principal", "type": "address"},
        {"name": "agent", "type": "address"},
        {"name": "outcomes", "type": "tuple[]", "components": [
            {"name": "name", "type": "string"},
            {"name": "agentPayoff", "type": "int256"},
            {"name": "principalPayoff", "type": "int256"}
        ]}
    ]},
    {"type": "function", "name": "principal", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "address"}]}
]"#;

pub const MULTI_COIN_CONTROLLER_ABI: &str = r#"[
    {"type": "constructor", "stateMutability": "nonpayable",
     "inputs": [{"name": "platformIds", "type": "bytes4[]"}]},
    {"type": "function", "name": "getPlatformCoin", "stateMutability": "nonpayable",
     "inputs": [], "outputs": []},
    {"type": "function", "name": "getUserCoin", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "address"}]},
    {"type": "function", "name": "setSpotPrices", "stateMutability": "nonpayable",
     "inputs": [{"name": "prices", "type": "uint256[]"}], "outputs": []},
    {"type": "function", "name": "addPlatform", "stateMutability": "nonpayable", "inputs": [
        {"name": "coin", "type": "address"},
        {"name": "platformId", "type": "bytes4"},
        {"name": "period", "type": "uint256"},
        {"name": "price", "type": "uint256"},
        {"name": "amount", "type": "int256"}
    ], "outputs": []},
    {"type": "function", "name": "listCoinPlatforms", "stateMutability": "view",
     "inputs": [{"name": "coin", "type": "address"}], "outputs": [
        {"name": "ids", "type": "bytes4[]"},
        {"name": "periods", "type": "uint256[]"},
        {"name": "prices", "type": "uint256[]"},
        {"name": "amounts", "type": "int256[]"}
    ]}
]"#;

pub const PLATFORM_COIN_ABI: &str = r#"[
    {"type": "function", "name": "getNumPlatforms", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "uint256"}]}
]"#;

#[derive(Debug, Clone)]
struct Platform {
    id: B256,
    period: U256,
    price: U256,
    amount: I256,
}

#[derive(Debug, Clone)]
enum SimContract {
    Manager {
        contracts: Vec<Address>,
        assessed: Option<String>,
    },
    Agreement {
        principal: Address,
        outcomes: Vec<(String, I256, I256)>,
    },
    Controller {
        platform_ids: Vec<B256>,
        coins: HashMap<Address, Address>,
        spot_prices: Vec<U256>,
    },
    Coin {
        platforms: Vec<Platform>,
    },
}

#[derive(Debug, Default)]
struct ChainState {
    accounts: Vec<Address>,
    contracts: HashMap<Address, SimContract>,
    next_address: u64,
    next_tx: u64,
    failing_deployments: HashSet<String>,
    failing_methods: HashSet<String>,
    in_flight: usize,
    max_in_flight: usize,
    deployed: Vec<String>,
}

impl ChainState {
    fn allocate(&mut self) -> Address {
        self.next_address += 1;
        Address::left_padding_from(&(0x1000 + self.next_address).to_be_bytes())
    }

    fn receipt(&mut self) -> TxReceipt {
        self.next_tx += 1;
        TxReceipt {
            tx_hash: TxHash::left_padding_from(&self.next_tx.to_be_bytes()),
            block_number: Some(self.next_tx),
            gas_used: 21_000,
        }
    }
}

pub struct SimulatedChain {
    abis: HashMap<String, JsonAbi>,
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    pub fn new(account_count: u64) -> Self {
        let abis = [
            ("ContractManager", CONTRACT_MANAGER_ABI),
            ("Contract", CONTRACT_ABI),
            ("MultiCoinController", MULTI_COIN_CONTROLLER_ABI),
            ("PlatformCoin", PLATFORM_COIN_ABI),
        ]
        .into_iter()
        .map(|(name, json)| (name.to_string(), serde_json::from_str(json).unwrap()))
        .collect();

        let accounts = (1..=account_count)
            .map(|i| Address::left_padding_from(&i.to_be_bytes()))
            .collect();

        Self {
            abis,
            state: Mutex::new(ChainState {
                accounts,
                ..Default::default()
            }),
        }
    }

    /// Make every deployment of `contract_name` fail
    pub fn fail_deployment(&self, contract_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_deployments.insert(contract_name.to_string());
    }

    /// Make every call or transaction to `method` fail
    pub fn fail_method(&self, method: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_methods.insert(method.to_string());
    }

    /// Highest number of deployments that were pending at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Names of contracts that made it on chain, in creation order
    pub fn deployed(&self) -> Vec<String> {
        self.state.lock().unwrap().deployed.clone()
    }

    fn create(&self, request: &DeploymentRequest) -> Result<DeploymentResult> {
        let name = request.contract_name.as_str();
        let fail = |reason: &str| OrchestrationError::Deployment {
            contract: name.to_string(),
            reason: reason.to_string(),
        };

        let mut state = self.state.lock().unwrap();
        if state.failing_deployments.contains(name) {
            return Err(fail("out of gas"));
        }

        let abi = self.abis.get(name).ok_or_else(|| fail("unknown contract"))?;
        let params = abi
            .constructor()
            .map(|c| c.inputs.clone())
            .unwrap_or_default();
        let values = coerce_args(&params, &request.constructor_args)
            .map_err(|e| fail(&format!("{:#}", e)))?;

        let contract = match name {
            "ContractManager" => SimContract::Manager {
                contracts: Vec::new(),
                assessed: None,
            },
            "Contract" => SimContract::Agreement {
                principal: values[0].as_address().unwrap(),
                outcomes: values[2]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|o| {
                        let fields = o.as_tuple().unwrap();
                        (
                            fields[0].as_str().unwrap().to_string(),
                            fields[1].as_int().unwrap().0,
                            fields[2].as_int().unwrap().0,
                        )
                    })
                    .collect(),
            },
            "MultiCoinController" => SimContract::Controller {
                platform_ids: values[0]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|v| v.as_fixed_bytes().map(|(b, _)| B256::right_padding_from(b)).unwrap())
                    .collect(),
                coins: HashMap::new(),
                spot_prices: Vec::new(),
            },
            _ => SimContract::Coin {
                platforms: Vec::new(),
            },
        };

        let address = state.allocate();
        state.contracts.insert(address, contract);
        state.deployed.push(name.to_string());
        let receipt = state.receipt();

        Ok(DeploymentResult {
            contract_name: name.to_string(),
            address,
            tx_hash: Some(receipt.tx_hash),
        })
    }
}

fn uint(value: usize) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

fn int(value: I256) -> DynSolValue {
    DynSolValue::Int(value, 256)
}

fn bytes4(word: B256) -> DynSolValue {
    DynSolValue::FixedBytes(word, 4)
}

fn revert(function: &Function, kind: &str) -> OrchestrationError {
    let reason = "execution reverted".to_string();
    let method = function.name.clone();
    if kind == "call" {
        OrchestrationError::Query { method, reason }
    } else {
        OrchestrationError::Transaction { method, reason }
    }
}

#[async_trait]
impl DeploymentService for SimulatedChain {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        _options: &TxOptions,
    ) -> Result<DeploymentResult> {
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        // Let the other deployments of the batch start before this one is mined
        tokio::task::yield_now().await;

        let result = self.create(request);
        self.state.lock().unwrap().in_flight -= 1;
        result
    }
}

#[async_trait]
impl AbiResolver for SimulatedChain {
    async fn abi(&self, contract_name: &str) -> Result<JsonAbi> {
        self.abis
            .get(contract_name)
            .cloned()
            .ok_or_else(|| OrchestrationError::Resolution {
                contract: contract_name.to_string(),
                reason: "no artifact".to_string(),
            })
    }
}

#[async_trait]
impl ContractBackend for SimulatedChain {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn call(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        from: Address,
    ) -> Result<Vec<DynSolValue>> {
        let state = self.state.lock().unwrap();
        if state.failing_methods.contains(&function.name) {
            return Err(revert(function, "call"));
        }

        let contract = state
            .contracts
            .get(&address)
            .ok_or_else(|| revert(function, "call"))?;

        let agreements = |contracts: &[Address]| -> Vec<(Address, Vec<(String, I256, I256)>)> {
            contracts
                .iter()
                .filter_map(|a| match state.contracts.get(a) {
                    Some(SimContract::Agreement {
                        principal,
                        outcomes,
                    }) => Some((*principal, outcomes.clone())),
                    _ => None,
                })
                .collect()
        };

        let value = match (contract, function.name.as_str()) {
            (SimContract::Manager { contracts, .. }, "getNumContracts") => uint(contracts.len()),
            (SimContract::Manager { contracts, .. }, "numPrincipals") => {
                let principals: HashSet<Address> =
                    agreements(contracts).into_iter().map(|(p, _)| p).collect();
                uint(principals.len())
            }
            (SimContract::Manager { contracts, .. }, "totalY" | "totalQ") => {
                let outcome = args[0].as_str().unwrap_or_default();
                let agent_side = function.name == "totalY";
                let total = agreements(contracts)
                    .iter()
                    .flat_map(|(_, outcomes)| outcomes.iter())
                    .filter(|(name, _, _)| name == outcome)
                    .fold(I256::ZERO, |acc, (_, y, q)| {
                        acc + if agent_side { *y } else { *q }
                    });
                int(total)
            }
            (
                SimContract::Manager {
                    contracts,
                    assessed,
                },
                "principalPayouts",
            ) => {
                let principal = args[0].as_address().unwrap_or_default();
                let total = match assessed {
                    Some(outcome) => agreements(contracts)
                        .iter()
                        .filter(|(p, _)| *p == principal)
                        .flat_map(|(_, outcomes)| outcomes.iter())
                        .filter(|(name, _, _)| name == outcome)
                        .fold(I256::ZERO, |acc, (_, _, q)| acc + *q),
                    None => I256::ZERO,
                };
                int(total)
            }
            (SimContract::Agreement { principal, .. }, "principal") => {
                DynSolValue::Address(*principal)
            }
            (SimContract::Controller { coins, .. }, "getUserCoin") => {
                DynSolValue::Address(coins.get(&from).copied().unwrap_or_default())
            }
            (SimContract::Controller { .. }, "listCoinPlatforms") => {
                let coin = args[0].as_address().unwrap_or_default();
                let platforms = match state.contracts.get(&coin) {
                    Some(SimContract::Coin { platforms }) => platforms.clone(),
                    _ => return Err(revert(function, "call")),
                };
                return Ok(vec![
                    DynSolValue::Array(platforms.iter().map(|p| bytes4(p.id)).collect()),
                    DynSolValue::Array(
                        platforms
                            .iter()
                            .map(|p| DynSolValue::Uint(p.period, 256))
                            .collect(),
                    ),
                    DynSolValue::Array(
                        platforms
                            .iter()
                            .map(|p| DynSolValue::Uint(p.price, 256))
                            .collect(),
                    ),
                    DynSolValue::Array(platforms.iter().map(|p| int(p.amount)).collect()),
                ]);
            }
            (SimContract::Coin { platforms }, "getNumPlatforms") => uint(platforms.len()),
            _ => return Err(revert(function, "call")),
        };

        Ok(vec![value])
    }

    async fn send(
        &self,
        address: Address,
        function: &Function,
        args: &[DynSolValue],
        options: &TxOptions,
    ) -> Result<TxReceipt> {
        let mut state = self.state.lock().unwrap();
        if state.failing_methods.contains(&function.name) {
            return Err(revert(function, "send"));
        }

        let target_kind = args
            .first()
            .and_then(DynSolValue::as_address)
            .and_then(|a| state.contracts.get(&a))
            .map(|c| matches!(c, SimContract::Agreement { .. }));

        match function.name.as_str() {
            "addContract" => {
                let added = args[0].as_address().unwrap_or_default();
                match state.contracts.get_mut(&address) {
                    Some(SimContract::Manager { contracts, .. }) if target_kind == Some(true) => {
                        contracts.push(added)
                    }
                    _ => return Err(revert(function, "send")),
                }
            }
            "assessOutcome" => match state.contracts.get_mut(&address) {
                Some(SimContract::Manager { assessed, .. }) => {
                    *assessed = args[0].as_str().map(str::to_string)
                }
                _ => return Err(revert(function, "send")),
            },
            "getPlatformCoin" => {
                let has_coin = match state.contracts.get(&address) {
                    Some(SimContract::Controller { coins, .. }) => coins.contains_key(&options.from),
                    _ => return Err(revert(function, "send")),
                };
                if !has_coin {
                    let coin = state.allocate();
                    state.contracts.insert(
                        coin,
                        SimContract::Coin {
                            platforms: Vec::new(),
                        },
                    );
                    if let Some(SimContract::Controller { coins, .. }) =
                        state.contracts.get_mut(&address)
                    {
                        coins.insert(options.from, coin);
                    }
                }
            }
            "setSpotPrices" => match state.contracts.get_mut(&address) {
                Some(SimContract::Controller { spot_prices, .. }) => {
                    *spot_prices = args[0]
                        .as_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|v| v.as_uint().map(|(u, _)| u))
                        .collect()
                }
                _ => return Err(revert(function, "send")),
            },
            "addPlatform" => {
                let coin = args[0].as_address().unwrap_or_default();
                let id = args[1]
                    .as_fixed_bytes()
                    .map(|(b, _)| B256::right_padding_from(b))
                    .unwrap_or_default();
                let known_id = match state.contracts.get(&address) {
                    Some(SimContract::Controller { platform_ids, .. }) => platform_ids.contains(&id),
                    _ => false,
                };
                if !known_id {
                    return Err(revert(function, "send"));
                }
                match state.contracts.get_mut(&coin) {
                    Some(SimContract::Coin { platforms }) => platforms.push(Platform {
                        id,
                        period: args[2].as_uint().unwrap_or_default().0,
                        price: args[3].as_uint().unwrap_or_default().0,
                        amount: args[4].as_int().unwrap_or_default().0,
                    }),
                    _ => return Err(revert(function, "send")),
                }
            }
            _ => return Err(revert(function, "send")),
        }

        Ok(state.receipt())
    }
}
