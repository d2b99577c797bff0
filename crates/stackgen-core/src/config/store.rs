//! Config store for loading and saving configs.json.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{TenantConfiguration, parser};
use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the tenant document; a missing file is a fatal load error
    pub fn load(&self) -> DeployResult<TenantConfiguration> {
        parser::parse_config(&self.config_path)
            .map_err(|e| DeployError::config_load(&self.config_path, e))
    }

    pub fn save(&self, config: &TenantConfiguration) -> anyhow::Result<()> {
        let content = parser::to_json(config)?;
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
