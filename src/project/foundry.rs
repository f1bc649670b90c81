use std::collections::HashMap;
use std::fs;
use std::path::Path;

use eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use super::{Project, ProjectType, project_name};

/// Foundry configuration parsed from foundry.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub profile: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub src: Option<String>,
    pub out: Option<String>,
    #[serde(default)]
    pub rpc_endpoints: HashMap<String, String>,
}

impl FoundryConfig {
    pub fn default_profile(&self) -> Option<&ProfileConfig> {
        self.profile.get("default")
    }

    pub fn out_dir(&self) -> &str {
        self.default_profile()
            .and_then(|p| p.out.as_deref())
            .unwrap_or("out")
    }

    pub fn rpc_endpoints(&self) -> HashMap<String, String> {
        self.default_profile()
            .map(|p| p.rpc_endpoints.clone())
            .unwrap_or_default()
    }
}

/// Load a Foundry project from the given path
pub fn load_project(path: &Path) -> Result<Project> {
    let config_path = path.join("foundry.toml");

    if !config_path.exists() {
        return Err(eyre!("foundry.toml not found at {:?}", path));
    }

    let config_content = fs::read_to_string(&config_path)
        .wrap_err_with(|| format!("Failed to read {:?}", config_path))?;

    let config: FoundryConfig =
        toml::from_str(&config_content).wrap_err("Failed to parse foundry.toml")?;

    Ok(Project {
        project_type: ProjectType::Foundry,
        root: path.to_path_buf(),
        name: project_name(path),
        out_dir: path.join(config.out_dir()),
        rpc_endpoints: config.rpc_endpoints(),
    })
}
