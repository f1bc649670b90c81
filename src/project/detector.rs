use std::path::Path;

use eyre::{Result, eyre};

use super::{Project, foundry, hardhat, remix};

/// Detect the project type based on configuration files present in the directory
pub fn detect(path: &Path) -> Result<Project> {
    let foundry_config = path.join("foundry.toml");
    let hardhat_config_js = path.join("hardhat.config.js");
    let hardhat_config_ts = path.join("hardhat.config.ts");

    // Check for Foundry first (foundry.toml)
    if foundry_config.exists() {
        tracing::info!("Detected Foundry project at {:?}", path);
        return foundry::load_project(path);
    }

    // Check for Hardhat (hardhat.config.js or hardhat.config.ts)
    if hardhat_config_js.exists() || hardhat_config_ts.exists() {
        tracing::info!("Detected Hardhat project at {:?}", path);
        return hardhat::load_project(path);
    }

    // Remix workspaces keep compiled output next to the sources
    if remix::artifacts_dir(path).is_dir() {
        tracing::info!("Detected Remix workspace at {:?}", path);
        return remix::load_project(path);
    }

    Err(eyre!(
        "No Foundry, Hardhat or Remix project detected at {:?}\n\
         Expected: foundry.toml, hardhat.config.js, hardhat.config.ts, or contracts/artifacts/",
        path
    ))
}
