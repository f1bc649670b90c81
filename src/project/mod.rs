mod detector;
mod foundry;
mod hardhat;
mod remix;

pub use detector::detect;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    Foundry,
    Hardhat,
    Remix,
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectType::Foundry => write!(f, "Foundry"),
            ProjectType::Hardhat => write!(f, "Hardhat"),
            ProjectType::Remix => write!(f, "Remix"),
        }
    }
}

/// A contract project whose compiled artifacts the scenarios deploy from
#[derive(Debug, Clone)]
pub struct Project {
    pub project_type: ProjectType,
    pub root: PathBuf,
    pub name: String,
    /// Directory holding compiled artifacts
    pub out_dir: PathBuf,
    /// Named RPC endpoints declared by the project itself
    pub rpc_endpoints: HashMap<String, String>,
}

impl Project {
    pub fn new_foundry(path: &Path) -> Result<Self> {
        foundry::load_project(path)
    }

    pub fn new_hardhat(path: &Path) -> Result<Self> {
        hardhat::load_project(path)
    }

    pub fn new_remix(path: &Path) -> Result<Self> {
        remix::load_project(path)
    }

    /// Conventional location of a contract's artifact, before any directory search
    pub fn artifact_hint(&self, contract_name: &str) -> PathBuf {
        match self.project_type {
            ProjectType::Foundry => self
                .out_dir
                .join(format!("{}.sol", contract_name))
                .join(format!("{}.json", contract_name)),
            ProjectType::Hardhat => self
                .out_dir
                .join("contracts")
                .join(format!("{}.sol", contract_name))
                .join(format!("{}.json", contract_name)),
            ProjectType::Remix => self.out_dir.join(format!("{}.json", contract_name)),
        }
    }
}

fn project_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
