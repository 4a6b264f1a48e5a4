use crate::storage::{AccountRename, MigrationContext, StoreOptions};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncstoreConfig {
    pub database: Option<String>,
    pub authority: Option<String>,
    pub storage_root: Option<String>,
    pub max_succeeded_uploads: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_renames: Vec<AccountRenameConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRenameConfig {
    pub from: String,
    pub to: String,
}

impl SyncstoreConfig {
    /// Store options with defaults for every unset field
    pub fn store_options(&self) -> StoreOptions {
        let mut options = StoreOptions::default();
        if let Some(authority) = &self.authority {
            options.authority = authority.clone();
        }
        if let Some(cap) = self.max_succeeded_uploads {
            options.max_succeeded_uploads = cap;
        }
        options.migration = MigrationContext {
            storage_root: self.storage_root.as_ref().map(PathBuf::from),
            account_renames: self
                .account_renames
                .iter()
                .map(|r| AccountRename::new(&r.from, &r.to))
                .collect(),
        };
        options
    }

    /// Reject values the store cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(authority) = &self.authority {
            if authority.is_empty() || authority.contains('/') {
                return Err(Error::Config(format!("invalid authority '{}'", authority)));
            }
        }
        if self.max_succeeded_uploads == Some(0) {
            return Err(Error::Config(
                "max_succeeded_uploads must be at least 1".to_string(),
            ));
        }
        for rename in &self.account_renames {
            if rename.from.is_empty() || rename.to.is_empty() || rename.from == rename.to {
                return Err(Error::Config(format!(
                    "invalid account rename '{}' -> '{}'",
                    rename.from, rename.to
                )));
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("syncstore.toml")
}

pub fn default_database_path() -> PathBuf {
    default_database_path_in(Path::new("."))
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".syncstore").join("filelist.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SyncstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SyncstoreConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SyncstoreConfig, force: bool) -> anyhow::Result<()> {
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
