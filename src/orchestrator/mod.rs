//! Deploy, bind and call sequencing for a single scenario run.
//!
//! A run moves `Init -> Deploying -> Bound -> RunningSteps -> Done`. The
//! deployment batch is the only concurrent section and fails the whole run;
//! every later step is awaited in order and a failing step is logged and
//! recorded without stopping the run, unless the run is configured to abort
//! on transaction errors.

mod report;

pub use report::{CallDescriptor, CallKind, RunReport, StepOutcome};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy::{json_abi::JsonAbi, primitives::Address};
use futures::future::try_join_all;
use tracing::{debug, error, info};

use crate::contracts::{
    AbiResolver, CallValue, ContractBackend, ContractHandle, DeploymentRequest, DeploymentResult,
    DeploymentService, TxOptions, TxReceipt, coerce_args, find_function,
};
use crate::error::{OrchestrationError, Result};

pub const DEFAULT_GAS_LIMIT: u64 = 1_500_000;

/// Per-run settings shared by every query and transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Gas budget attached to every transaction
    pub gas_limit: u64,
    /// Signing identity; the first node account when unset
    pub from_account: Option<Address>,
    pub wait_for_confirmations: u64,
    pub abort_on_transaction_error: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            from_account: None,
            wait_for_confirmations: 1,
            abort_on_transaction_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Deploying,
    Bound,
    RunningSteps,
    Done,
    Failed,
}

impl RunPhase {
    fn can_move_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Init, Deploying)
                | (Deploying, Bound)
                | (Bound, RunningSteps)
                | (Bound, Done)
                | (RunningSteps, Done)
                | (Deploying | Bound | RunningSteps, Failed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Init => "init",
            RunPhase::Deploying => "deploying",
            RunPhase::Bound => "bound",
            RunPhase::RunningSteps => "running",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

pub struct Orchestrator<'a> {
    deployer: &'a dyn DeploymentService,
    resolver: &'a dyn AbiResolver,
    backend: &'a dyn ContractBackend,
    config: RunConfig,
    accounts: Option<Vec<Address>>,
    abis: HashMap<String, Arc<JsonAbi>>,
    report: RunReport,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        deployer: &'a dyn DeploymentService,
        resolver: &'a dyn AbiResolver,
        backend: &'a dyn ContractBackend,
        config: RunConfig,
    ) -> Self {
        Self {
            deployer,
            resolver,
            backend,
            config,
            accounts: None,
            abis: HashMap::new(),
            report: RunReport::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.report.phase
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    fn transition(&mut self, next: RunPhase) -> Result<()> {
        let current = self.report.phase;
        if current == next {
            return Ok(());
        }
        if !current.can_move_to(next) {
            return Err(OrchestrationError::InvalidPhase {
                from: current,
                to: next,
            });
        }

        debug!("Run phase {} -> {}", current, next);
        self.report.phase = next;
        Ok(())
    }

    /// Mark the run as failed and hand the error back for propagation
    pub fn fail(&mut self, err: OrchestrationError) -> OrchestrationError {
        error!("Run aborted: {}", err);
        self.report.phase = RunPhase::Failed;
        err
    }

    /// Accounts exposed by the backend, fetched once per run
    pub async fn accounts(&mut self) -> Result<Vec<Address>> {
        if let Some(accounts) = &self.accounts {
            return Ok(accounts.clone());
        }

        let accounts = self.backend.accounts().await?;
        debug!("Backend exposes {} account(s)", accounts.len());
        self.accounts = Some(accounts.clone());
        Ok(accounts)
    }

    /// The account every call and transaction is attributed to
    pub async fn caller(&mut self) -> Result<Address> {
        if let Some(from) = self.config.from_account {
            return Ok(from);
        }

        self.accounts().await?.first().copied().ok_or_else(|| {
            OrchestrationError::Config("no account available to sign transactions".to_string())
        })
    }

    /// Deploy every request concurrently and wait for all of them
    ///
    /// `result[i]` belongs to `requests[i]`. The first failure fails the
    /// batch and the run; contracts that did get deployed are left as is.
    pub async fn deploy_all(
        &mut self,
        requests: &[DeploymentRequest],
    ) -> Result<Vec<DeploymentResult>> {
        self.transition(RunPhase::Deploying)?;

        let from = match self.caller().await {
            Ok(from) => from,
            Err(e) => return Err(self.fail(e)),
        };
        let options = TxOptions {
            from,
            gas_limit: None,
            confirmations: self.config.wait_for_confirmations,
        };

        let deployer = self.deployer;
        let options = &options;
        let deployments = requests.iter().map(|request| async move {
            debug!("Deploying {}", request.contract_name);
            let result = deployer.deploy(request, options).await?;
            info!("Deployed {} at {}", result.contract_name, result.address);
            Ok::<_, OrchestrationError>(result)
        });

        match try_join_all(deployments).await {
            Ok(results) => {
                self.transition(RunPhase::Bound)?;
                Ok(results)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Build a handle for a freshly deployed contract
    pub async fn bind(
        &mut self,
        result: &DeploymentResult,
        abi_name: &str,
    ) -> Result<ContractHandle> {
        self.bind_address(result.address, abi_name).await
    }

    /// Build a handle for any address, e.g. one returned by another contract
    pub async fn bind_address(
        &mut self,
        address: Address,
        abi_name: &str,
    ) -> Result<ContractHandle> {
        let phase = self.phase();
        if !matches!(phase, RunPhase::Bound | RunPhase::RunningSteps) {
            return Err(OrchestrationError::InvalidPhase {
                from: phase,
                to: RunPhase::Bound,
            });
        }

        let abi = match self.abis.get(abi_name) {
            Some(abi) => abi.clone(),
            None => match self.resolver.abi(abi_name).await {
                Ok(abi) => {
                    let abi = Arc::new(abi);
                    self.abis.insert(abi_name.to_string(), abi.clone());
                    abi
                }
                Err(e) => return Err(self.fail(e)),
            },
        };

        Ok(ContractHandle {
            name: abi_name.to_string(),
            address,
            abi,
        })
    }

    fn enter_steps(&mut self) -> Result<()> {
        if self.phase() == RunPhase::Bound {
            self.transition(RunPhase::RunningSteps)?;
        }
        match self.phase() {
            RunPhase::RunningSteps => Ok(()),
            other => Err(OrchestrationError::InvalidPhase {
                from: other,
                to: RunPhase::RunningSteps,
            }),
        }
    }

    /// Read-only call; failures are logged and recorded, never raised
    pub async fn query(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        label: &str,
        args: &[String],
    ) -> Option<CallValue> {
        info!("Fetching {}", label);

        match self.try_query(handle, method, args).await {
            Ok(value) => {
                info!("Current {}: {}", label, value);
                self.report
                    .record(label, CallKind::Query, StepOutcome::Ok(value.to_string()));
                Some(value)
            }
            Err(e) => {
                error!("Error: {}", e);
                self.report
                    .record(label, CallKind::Query, StepOutcome::Failed(e.to_string()));
                None
            }
        }
    }

    async fn try_query(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        args: &[String],
    ) -> Result<CallValue> {
        self.enter_steps()?;
        let from = self.caller().await?;

        let function = find_function(&handle.abi, method, args.len()).map_err(|e| {
            OrchestrationError::Query {
                method: method.to_string(),
                reason: format!("{:#}", e),
            }
        })?;
        let values =
            coerce_args(&function.inputs, args).map_err(|e| OrchestrationError::Encoding {
                method: method.to_string(),
                reason: format!("{:#}", e),
            })?;

        let output = self
            .backend
            .call(handle.address, function, &values, from)
            .await?;
        Ok(CallValue(output))
    }

    /// State-mutating call from the run's caller with the run's gas budget
    ///
    /// A failure is logged and recorded. The run carries on with `Ok(None)`
    /// unless `abort_on_transaction_error` is set, in which case the run fails.
    pub async fn execute(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        label: &str,
        args: &[String],
    ) -> Result<Option<TxReceipt>> {
        info!("executing {}", label);

        match self.try_execute(handle, method, args).await {
            Ok(receipt) => {
                debug!(
                    "{} mined in block {:?}, gas used {}",
                    receipt.tx_hash, receipt.block_number, receipt.gas_used
                );
                info!("successfully {}", label);
                self.report.record(
                    label,
                    CallKind::Transaction,
                    StepOutcome::Ok(receipt.tx_hash.to_string()),
                );
                Ok(Some(receipt))
            }
            Err(e) => {
                error!("Error: {}", e);
                self.report.record(
                    label,
                    CallKind::Transaction,
                    StepOutcome::Failed(e.to_string()),
                );
                let phase_error = matches!(e, OrchestrationError::InvalidPhase { .. });
                if self.config.abort_on_transaction_error || phase_error {
                    return Err(self.fail(e));
                }
                Ok(None)
            }
        }
    }

    async fn try_execute(
        &mut self,
        handle: &ContractHandle,
        method: &str,
        args: &[String],
    ) -> Result<TxReceipt> {
        self.enter_steps()?;
        let from = self.caller().await?;

        let function = find_function(&handle.abi, method, args.len()).map_err(|e| {
            OrchestrationError::Transaction {
                method: method.to_string(),
                reason: format!("{:#}", e),
            }
        })?;
        let values =
            coerce_args(&function.inputs, args).map_err(|e| OrchestrationError::Encoding {
                method: method.to_string(),
                reason: format!("{:#}", e),
            })?;

        debug!("Sending {} to {} at {}", method, handle.name, handle.address);
        let options = TxOptions {
            from,
            gas_limit: Some(self.config.gas_limit),
            confirmations: self.config.wait_for_confirmations,
        };
        self.backend
            .send(handle.address, function, &values, &options)
            .await
    }

    /// Run one scripted step, dispatching on its kind
    pub async fn run_step(&mut self, handle: &ContractHandle, step: &CallDescriptor) -> Result<()> {
        match step.kind {
            CallKind::Query => {
                self.query(handle, &step.method, &step.label, &step.args)
                    .await;
                Ok(())
            }
            CallKind::Transaction => self
                .execute(handle, &step.method, &step.label, &step.args)
                .await
                .map(|_| ()),
        }
    }

    /// Close the run and return what happened
    pub fn finish(mut self) -> Result<RunReport> {
        self.transition(RunPhase::Done)?;
        Ok(self.report)
    }
}
