//! Process-wide defaults and working paths.
//!
//! Environment variables are read exactly once, here, into
//! [`RuntimeDefaults`]. Components receive the struct instead of touching
//! the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{CONFIG_FILE, ConfigStore};
use crate::error::{DeployError, DeployResult};
use crate::topology::DeploymentTopology;

/// Ports and switches taken from the environment, with literal defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDefaults {
    pub topology: DeploymentTopology,
    pub service_internal_port: u16,
    pub gateway_port: u16,
    pub ui_port: u16,
    pub widgets_port: u16,
    pub dashboard_api_port: u16,
    pub mongo_port: u16,
    pub redis_port: u16,
    pub rabbitmq_port: u16,
    pub elasticsearch_port: u16,
    pub fetch_timeout: Duration,
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self {
            topology: DeploymentTopology::Clustered,
            service_internal_port: 80,
            gateway_port: 3300,
            ui_port: 3000,
            widgets_port: 3200,
            dashboard_api_port: 4300,
            mongo_port: 27017,
            redis_port: 6379,
            rabbitmq_port: 5672,
            elasticsearch_port: 9200,
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

impl RuntimeDefaults {
    /// Read defaults from the process environment.
    pub fn from_env() -> DeployResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build defaults from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DeployResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let port = |key: &str, default: u16| -> DeployResult<u16> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    DeployError::ConfigInvalid(format!("{key} must be a port number, got '{raw}'"))
                }),
            }
        };

        let fetch_timeout = match lookup("ASSET_FETCH_TIMEOUT_SECS") {
            None => base.fetch_timeout,
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                DeployError::ConfigInvalid(format!(
                    "ASSET_FETCH_TIMEOUT_SECS must be a number of seconds, got '{raw}'"
                ))
            })?),
        };

        Ok(Self {
            topology: DeploymentTopology::resolve(lookup("DEPLOYMENT_METHOD").as_deref()),
            service_internal_port: port("SERVICE_INTERNAL_PORT", base.service_internal_port)?,
            gateway_port: port("GATEWAY_PORT", base.gateway_port)?,
            ui_port: port("UI_PORT", base.ui_port)?,
            widgets_port: port("WIDGETS_PORT", base.widgets_port)?,
            dashboard_api_port: port("DASHBOARD_API_PORT", base.dashboard_api_port)?,
            mongo_port: port("MONGO_PORT", base.mongo_port)?,
            redis_port: port("REDIS_PORT", base.redis_port)?,
            rabbitmq_port: port("RABBITMQ_PORT", base.rabbitmq_port)?,
            elasticsearch_port: port("ELASTICSEARCH_PORT", base.elasticsearch_port)?,
            fetch_timeout,
        })
    }

    pub fn with_topology(mut self, topology: DeploymentTopology) -> Self {
        self.topology = topology;
        self
    }
}

/// Working directory plus defaults, created once by the frontend.
#[derive(Debug, Clone)]
pub struct DeployContext {
    work_dir: PathBuf,
    config_path: PathBuf,
    defaults: RuntimeDefaults,
}

impl DeployContext {
    pub fn new(work_dir: PathBuf, defaults: RuntimeDefaults) -> Self {
        let config_path = work_dir.join(CONFIG_FILE);
        Self {
            work_dir,
            config_path,
            defaults,
        }
    }

    /// Use a config document outside the working directory.
    pub fn with_config_path(mut self, config_path: PathBuf) -> Self {
        self.config_path = config_path;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn defaults(&self) -> &RuntimeDefaults {
        &self.defaults
    }

    pub fn topology(&self) -> DeploymentTopology {
        self.defaults.topology
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.config_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_literal_defaults() {
        let defaults = RuntimeDefaults::from_lookup(lookup(&[])).unwrap();
        assert_eq!(defaults, RuntimeDefaults::default());
        assert_eq!(defaults.topology, DeploymentTopology::Clustered);
    }

    #[test]
    fn compose_method_selects_single_node() {
        let defaults =
            RuntimeDefaults::from_lookup(lookup(&[("DEPLOYMENT_METHOD", "docker-compose")]))
                .unwrap();
        assert_eq!(defaults.topology, DeploymentTopology::SingleNode);
    }

    #[test]
    fn ports_are_read_from_environment() {
        let defaults = RuntimeDefaults::from_lookup(lookup(&[
            ("GATEWAY_PORT", "4400"),
            ("MONGO_PORT", "27018"),
        ]))
        .unwrap();
        assert_eq!(defaults.gateway_port, 4400);
        assert_eq!(defaults.mongo_port, 27018);
        assert_eq!(defaults.ui_port, 3000);
    }

    #[test]
    fn malformed_port_is_fatal() {
        let err = RuntimeDefaults::from_lookup(lookup(&[("UI_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("UI_PORT"));
    }

    #[test]
    fn context_defaults_config_path_to_work_dir() {
        let ctx = DeployContext::new(PathBuf::from("/srv/tenant"), RuntimeDefaults::default());
        assert_eq!(ctx.config_path(), Path::new("/srv/tenant/configs.json"));
    }
}
