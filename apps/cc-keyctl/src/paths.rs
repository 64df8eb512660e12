use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;

pub const APP_QUALIFIER: &str = "chat";
pub const APP_ORG: &str = "cipherchat";
pub const APP_NAME: &str = "cc-keyctl";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow!("cannot determine home directory"))
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("keyring.json"))
}

pub fn default_database() -> Result<PathBuf> {
    Ok(data_dir()?.join("keys.db"))
}
