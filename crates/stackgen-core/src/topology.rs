//! Deployment topology and the manifest fragments that depend on it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TenantConfiguration;
use crate::manifest::{DeployPolicy, HealthCheck, Network, UpdateConfig};

/// Name of the network every generated service joins
pub const NETWORK_NAME: &str = "platform";

/// Replica count applied by the update policy when nothing overrides it
pub const DEFAULT_REPLICAS: u32 = 2;

/// Selector value that chooses the single-node topology
const SINGLE_NODE_METHOD: &str = "docker-compose";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentTopology {
    SingleNode,
    Clustered,
}

impl DeploymentTopology {
    /// Decide the topology from the deployment-method selector.
    pub fn resolve(signal: Option<&str>) -> Self {
        match signal.map(str::trim) {
            Some(SINGLE_NODE_METHOD) => Self::SingleNode,
            _ => Self::Clustered,
        }
    }

    pub fn is_clustered(self) -> bool {
        self == Self::Clustered
    }

    /// In-cluster service-discovery name of a stateful service.
    pub fn datastore_host(self, config: &TenantConfiguration, service: &str) -> String {
        match self {
            Self::SingleNode => service.to_string(),
            Self::Clustered => format!("{}_{}", config.dbs_stack_name(), service),
        }
    }

    /// Network block of the application manifest.
    ///
    /// A remote datastore host wins over the topology: the stack then owns
    /// an overlay network of its own.
    pub fn network_fragment(self, config: &TenantConfiguration) -> Network {
        if config.db_server_address.is_some() {
            return Network {
                driver: Some("overlay".to_string()),
                ..Default::default()
            };
        }
        match self {
            Self::SingleNode => Network {
                driver: Some("bridge".to_string()),
                ..Default::default()
            },
            Self::Clustered => Network {
                external: Some(true),
                ..Default::default()
            },
        }
    }

    /// Network block of the stateful manifest; it creates the network the
    /// clustered application stack refers to as external.
    pub fn stateful_network_fragment(self) -> Network {
        match self {
            Self::SingleNode => Network {
                name: Some(NETWORK_NAME.to_string()),
                driver: Some("bridge".to_string()),
                ..Default::default()
            },
            Self::Clustered => Network {
                name: Some(NETWORK_NAME.to_string()),
                driver: Some("overlay".to_string()),
                attachable: Some(true),
                ..Default::default()
            },
        }
    }

    /// Rolling update policy, emitted only for clustered deployments.
    pub fn update_policy_fragment(self, replicas: Option<u32>) -> Option<DeployPolicy> {
        if !self.is_clustered() {
            return None;
        }
        Some(DeployPolicy {
            mode: "replicated".to_string(),
            replicas,
            update_config: UpdateConfig {
                order: "start-first".to_string(),
                failure_action: "rollback".to_string(),
                delay: "1s".to_string(),
            },
        })
    }

    /// Restart policy for single-node deployments.
    pub fn restart_policy(self) -> Option<String> {
        match self {
            Self::SingleNode => Some("unless-stopped".to_string()),
            Self::Clustered => None,
        }
    }
}

impl fmt::Display for DeploymentTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleNode => write!(f, "single-node"),
            Self::Clustered => write!(f, "clustered"),
        }
    }
}

/// HTTP health probe for request-serving services.
pub fn health_check_fragment(service_port: u16) -> HealthCheck {
    HealthCheck {
        test: vec![
            "CMD".to_string(),
            "curl".to_string(),
            "-i".to_string(),
            format!("http://localhost:{service_port}/health"),
        ],
        interval: "30s".to_string(),
        start_period: "30s".to_string(),
    }
}
