use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default table name prefix, matching the persisted schema contract
pub const DEFAULT_TABLE_PREFIX: &str = "chestvault_";

/// Default number of write-behind worker threads
pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChestvaultConfig {
    pub database: Option<String>,
    pub table_prefix: Option<String>,
    pub workers: Option<usize>,
}

impl ChestvaultConfig {
    pub fn table_prefix(&self) -> &str {
        self.table_prefix.as_deref().unwrap_or(DEFAULT_TABLE_PREFIX)
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("chestvault.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".chestvault").join("chests.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ChestvaultConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ChestvaultConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ChestvaultConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
