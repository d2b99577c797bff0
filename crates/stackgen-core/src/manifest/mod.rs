//! Typed orchestrator manifest.
//!
//! Services and networks are assembled as plain structs and serialized once
//! by the writer. Maps are ordered so identical input yields identical
//! bytes.

pub mod services;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use services::ServiceBlockBuilder;

/// Manifest format version
pub const MANIFEST_VERSION: &str = "3.3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub services: BTreeMap<String, ServiceBlock>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Network>,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            services: BTreeMap::new(),
            networks: BTreeMap::new(),
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceBlock> {
        self.services.get(name)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| anyhow::anyhow!("failed to serialize manifest yaml: {e}"))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled manifest fragment for one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBlock {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

impl ServiceBlock {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Merge variables over the current environment; later wins.
    pub fn merge_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.environment.insert(key.into(), value.into());
        }
    }

    pub fn replicas(&self) -> Option<u32> {
        self.deploy.as_ref().and_then(|d| d.replicas)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: String,
    pub start_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployPolicy {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    pub update_config: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub order: String,
    pub failure_action: String,
    pub delay: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_not_serialized() {
        let mut manifest = Manifest::new();
        manifest
            .services
            .insert("gateway".to_string(), ServiceBlock::new("stackgen/gateway:1.0"));
        let yaml = manifest.to_yaml().unwrap();

        assert!(yaml.contains("version: '3.3'") || yaml.contains("version: \"3.3\""));
        assert!(yaml.contains("image: stackgen/gateway:1.0"));
        assert!(!yaml.contains("healthcheck"));
        assert!(!yaml.contains("networks"));
    }

    #[test]
    fn merge_env_overwrites_existing_keys() {
        let mut block = ServiceBlock::new("img");
        block.merge_env([("A", "1"), ("B", "2")]);
        block.merge_env([("B", "3")]);
        assert_eq!(block.environment["A"], "1");
        assert_eq!(block.environment["B"], "3");
    }

    #[test]
    fn deserializes_free_form_service() {
        let yaml = "image: nginx:1.25\nports:\n  - \"8080:80\"\n";
        let block: ServiceBlock = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(block.image, "nginx:1.25");
        assert_eq!(block.ports, vec!["8080:80".to_string()]);
    }
}
