use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};

use super::{Project, ProjectType, project_name};

/// Where the Remix compiler writes `<Name>.json` artifacts
pub fn artifacts_dir(path: &Path) -> PathBuf {
    path.join("contracts").join("artifacts")
}

/// Load a Remix workspace exported to disk
pub fn load_project(path: &Path) -> Result<Project> {
    let out_dir = artifacts_dir(path);

    if !out_dir.is_dir() {
        return Err(eyre!("contracts/artifacts not found at {:?}", path));
    }

    Ok(Project {
        project_type: ProjectType::Remix,
        root: path.to_path_buf(),
        name: project_name(path),
        out_dir,
        rpc_endpoints: HashMap::new(),
    })
}
