use crate::infrastructure::config::{ensure_default_configs, resolve_timezone};
use crate::infrastructure::error::JournalError;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";
const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Prepares the workspace layout, writing default config files on first
/// run and validating the ones already present.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, JournalError> {
    let config_dir = workspace_root.join(CONFIG_DIR);
    let logs_dir = workspace_root.join(LOGS_DIR);
    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    // An unknown timezone name should fail here, not on first use.
    resolve_timezone(&config_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
    })
}
