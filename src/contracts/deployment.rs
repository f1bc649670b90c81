use std::fs;
use std::path::{Path, PathBuf};

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, TxHash},
};
use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};

use super::abi::{ContractArtifact, parse_artifact_str};
use super::caller::TxOptions;
use crate::error::{self, OrchestrationError};
use crate::project::Project;

/// A contract to deploy together with its textual constructor arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub contract_name: String,
    pub constructor_args: Vec<String>,
}

impl DeploymentRequest {
    pub fn new(contract_name: impl Into<String>, constructor_args: Vec<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            constructor_args,
        }
    }
}

/// A confirmed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub contract_name: String,
    pub address: Address,
    pub tx_hash: Option<TxHash>,
}

/// Submits contract creations and resolves once they are mined
#[async_trait]
pub trait DeploymentService: Send + Sync {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        options: &TxOptions,
    ) -> error::Result<DeploymentResult>;
}

/// Looks up the interface of a contract by name
#[async_trait]
pub trait AbiResolver: Send + Sync {
    async fn abi(&self, contract_name: &str) -> error::Result<JsonAbi>;
}

/// Loads compiled artifacts from a project's output directory
pub struct ArtifactStore {
    project: Project,
}

impl ArtifactStore {
    pub fn new(project: Project) -> Self {
        Self { project }
    }

    /// Find and parse the artifact for `contract_name`
    pub fn load(&self, contract_name: &str) -> Result<ContractArtifact> {
        let path = self.locate(contract_name).ok_or_else(|| {
            eyre!(
                "No artifact for {} under {:?} (project {})",
                contract_name,
                self.project.out_dir,
                self.project.root.display()
            )
        })?;

        let content =
            fs::read_to_string(&path).wrap_err_with(|| format!("Failed to read {:?}", path))?;
        let artifact = parse_artifact_str(contract_name, &content)
            .wrap_err_with(|| format!("Failed to parse {:?}", path))?;

        tracing::debug!("Loaded artifact for {} from {:?}", artifact.name, path);
        Ok(artifact)
    }

    fn locate(&self, contract_name: &str) -> Option<PathBuf> {
        let hint = self.project.artifact_hint(contract_name);
        if hint.is_file() {
            return Some(hint);
        }

        find_artifact(&self.project.out_dir, contract_name)
    }
}

#[async_trait]
impl AbiResolver for ArtifactStore {
    async fn abi(&self, contract_name: &str) -> error::Result<JsonAbi> {
        self.load(contract_name)
            .map(|artifact| artifact.abi)
            .map_err(|e| OrchestrationError::Resolution {
                contract: contract_name.to_string(),
                reason: format!("{:#}", e),
            })
    }
}

/// Walk `dir` for `<contract_name>.json`, skipping Hardhat debug files
fn find_artifact(dir: &Path, contract_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.json", contract_name);
    let entries = fs::read_dir(dir).ok()?;

    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|n| n == file_name.as_str()) {
            return Some(path);
        }
    }

    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_artifact(sub, contract_name))
}
