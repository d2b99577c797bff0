//! Plugin install/uninstall: config mutation only.
//!
//! Redeploying after a mutation is left to the deploy command.

use serde::Serialize;

use super::{ConfigStore, PluginDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PluginOutcome {
    Changed,
    NoOp,
}

#[derive(Debug)]
pub struct PluginConfigService {
    store: ConfigStore,
}

impl PluginConfigService {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// Add a plugin to the tenant document, or replace it when `force` is set.
    pub fn install(
        &self,
        descriptor: PluginDescriptor,
        force: bool,
    ) -> anyhow::Result<PluginOutcome> {
        let mut config = self.store.load()?;

        match config.plugins.iter().position(|p| p.name == descriptor.name) {
            None => {
                tracing::info!(plugin = %descriptor.name, "adding plugin to config");
                config.plugins.push(descriptor);
                self.store.save(&config)?;
                Ok(PluginOutcome::Changed)
            }
            Some(index) => {
                if config.plugins[index] == descriptor {
                    return Ok(PluginOutcome::NoOp);
                }
                if !force {
                    anyhow::bail!(
                        "Plugin '{}' already exists with different configuration. Use --force.",
                        descriptor.name
                    );
                }
                tracing::info!(plugin = %descriptor.name, "replacing plugin definition");
                config.plugins[index] = descriptor;
                self.store.save(&config)?;
                Ok(PluginOutcome::Changed)
            }
        }
    }

    pub fn uninstall(&self, name: &str) -> anyhow::Result<PluginOutcome> {
        let mut config = self.store.load()?;
        let before = config.plugins.len();
        config.plugins.retain(|p| p.name != name);

        if config.plugins.len() == before {
            return Ok(PluginOutcome::NoOp);
        }

        tracing::info!(plugin = %name, "removing plugin from config");
        self.store.save(&config)?;
        Ok(PluginOutcome::Changed)
    }
}
