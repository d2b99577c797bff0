//! Configuration schema for configs.json
//!
//! One document per tenant. The compiler reads it once per run and never
//! mutates it; only the plugin install/uninstall commands write it back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::PluginMetadata;
use crate::manifest::ServiceBlock;

/// Image tag used when neither the plugin nor the tenant names one
pub const FALLBACK_IMAGE_TAG: &str = "federation";

/// Database name used when neither the plugin nor the tenant names one
pub const FALLBACK_DB_NAME: &str = "platform";

pub const DEFAULT_REGISTRY: &str = "stackgen";
pub const DEFAULT_STACK_NAME: &str = "platform";
pub const DEFAULT_DBS_STACK_NAME: &str = "platform-dbs";
pub const DEFAULT_VERSION: &str = "os";

/// Root configuration structure for configs.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantConfiguration {
    /// Public URL of the tenant, e.g. `https://acme.example`
    pub domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// Image namespace for platform and plugin images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbs_stack_name: Option<String>,

    /// Release flavour exported to every service as VERSION
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token_secret: Option<String>,

    /// Tenant default database name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default)]
    pub mongo: MongoCredentials,

    #[serde(default)]
    pub redis: RedisCredentials,

    #[serde(default)]
    pub rabbitmq: RabbitmqCredentials,

    #[serde(default)]
    pub elasticsearch: ElasticsearchSettings,

    /// Remote datastore host; switches connection strings to external ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_server_address: Option<String>,

    /// Remote replica host for the document store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_server_address: Option<String>,

    /// Base environment shared by every service (lowest precedence)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub be_env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coreui: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crons: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<ServiceOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essyncer: Option<ServiceOverride>,

    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,

    /// Additional services copied verbatim into the manifest
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_services: BTreeMap<String, ServiceBlock>,

    /// Routing-table entries for update/restart, merged over the built-ins
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service_aliases: BTreeMap<String, ServiceAlias>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_sources: Option<AssetSourceOverrides>,

    /// Local path or URL of the plugin metadata catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_catalog: Option<String>,

    #[serde(default)]
    pub features: FeatureFlags,
}

/// Per-service override block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_env: BTreeMap<String, String>,
}

/// One declared plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,

    /// Full image reference; wins over every other image setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_server_address: Option<String>,

    /// Explicit UI bundle archive URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_location: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_env: BTreeMap<String, String>,

    /// Inline metadata, overrides the catalog entry field by field
    #[serde(default, flatten)]
    pub metadata: PluginMetadata,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Manifest service name, e.g. `plugin-sales-api`
    pub fn service_name(&self) -> String {
        format!("plugin-{}-api", self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MongoCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Run the document store as a replica set
    #[serde(default)]
    pub replication: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedisCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RabbitmqCredentials {
    /// Hosted broker URL; replaces the synthesized one entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhost: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchSettings {
    /// Hosted search engine URL; when set no search container is deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAlias {
    /// Service name inside the manifest
    pub service: String,
    /// Image repository name under the registry
    pub image: String,
}

/// Bucket hosts for the asset resolution chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSourceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_bucket: Option<String>,

    /// Template containing `{tag}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Deploy the search-sync service
    #[serde(default)]
    pub essyncer: bool,

    /// Deploy the dashboard API service
    #[serde(default)]
    pub dashboard: bool,

    /// Deploy a search dashboard next to the search engine
    #[serde(default)]
    pub search_dashboard: bool,
}

impl TenantConfiguration {
    pub fn registry(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    pub fn stack_name(&self) -> &str {
        self.stack_name.as_deref().unwrap_or(DEFAULT_STACK_NAME)
    }

    pub fn dbs_stack_name(&self) -> &str {
        self.dbs_stack_name
            .as_deref()
            .unwrap_or(DEFAULT_DBS_STACK_NAME)
    }

    pub fn release_tag(&self) -> &str {
        self.image_tag.as_deref().unwrap_or(FALLBACK_IMAGE_TAG)
    }

    /// Tenant default database name, falling back to the fixed literal
    pub fn default_db_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(FALLBACK_DB_NAME)
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Override block for a platform service, keyed by its routing name
    pub fn service_override(&self, name: &str) -> Option<&ServiceOverride> {
        match name {
            "core" => self.core.as_ref(),
            "coreui" => self.coreui.as_ref(),
            "gateway" => self.gateway.as_ref(),
            "crons" => self.crons.as_ref(),
            "workers" => self.workers.as_ref(),
            "widgets" => self.widgets.as_ref(),
            "dashboard" => self.dashboard.as_ref(),
            "essyncer" => self.essyncer.as_ref(),
            _ => None,
        }
    }

    /// Tag for a platform service: override block, then tenant, then fallback
    pub fn platform_tag(&self, name: &str) -> &str {
        self.service_override(name)
            .and_then(|o| o.image_tag.as_deref())
            .unwrap_or_else(|| self.release_tag())
    }

    /// Public host without scheme, port-free path or trailing slash
    pub fn public_host(&self) -> String {
        match url::Url::parse(&self.domain) {
            Ok(parsed) if parsed.host_str().is_some() => {
                parsed.host_str().unwrap_or_default().to_string()
            }
            _ => self
                .domain
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Domain with scheme and without a trailing slash
    pub fn public_url(&self) -> String {
        let trimmed = self.domain.trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        }
    }

    /// Validate structural constraints not expressible in serde
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.domain.trim().is_empty() {
            anyhow::bail!("'domain' must not be empty");
        }
        let mut seen = std::collections::HashSet::new();
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                anyhow::bail!("plugin entry without a name");
            }
            if !seen.insert(plugin.name.as_str()) {
                anyhow::bail!("plugin '{}' is declared more than once", plugin.name);
            }
        }
        Ok(())
    }
}
