//! Service blocks for platform services and declared plugins.

use std::collections::BTreeMap;

use crate::config::{PluginDescriptor, TenantConfiguration};
use crate::context::RuntimeDefaults;
use crate::environment::{EnvironmentMap, EnvironmentSynthesizer};
use crate::error::{DeployError, DeployResult};
use crate::topology::{DEFAULT_REPLICAS, NETWORK_NAME, health_check_fragment};

use super::ServiceBlock;

/// Host-alias name of the primary document store
pub const MONGO_ALIAS: &str = "mongo";
/// Host-alias name of the replica document store
pub const MONGO_SECONDARY_ALIAS: &str = "mongo-secondary";

pub const COREUI_SERVICE: &str = "coreui";
pub const GATEWAY_SERVICE: &str = "gateway";
pub const CORE_SERVICE: &str = "plugin-core-api";
pub const CRONS_SERVICE: &str = "crons";
pub const WORKERS_SERVICE: &str = "plugin-workers-api";
pub const WIDGETS_SERVICE: &str = "widgets";
pub const DASHBOARD_SERVICE: &str = "dashboard-api";
pub const ESSYNCER_SERVICE: &str = "essyncer";

/// Port the widgets server listens on inside its container
pub const WIDGETS_CONTAINER_PORT: u16 = 3200;

/// Builds one service block per platform service and per declared plugin.
#[derive(Debug, Clone, Copy)]
pub struct ServiceBlockBuilder<'a> {
    config: &'a TenantConfiguration,
    defaults: &'a RuntimeDefaults,
    env: EnvironmentSynthesizer<'a>,
}

impl<'a> ServiceBlockBuilder<'a> {
    pub fn new(config: &'a TenantConfiguration, defaults: &'a RuntimeDefaults) -> Self {
        Self {
            config,
            defaults,
            env: EnvironmentSynthesizer::new(config, defaults),
        }
    }

    /// Image reference of a plugin.
    ///
    /// Full image override, then digest, then
    /// `registry/plugin-<name>-api:<plugin tag | tenant tag | fallback>`.
    pub fn plugin_image(&self, plugin: &PluginDescriptor) -> String {
        if let Some(image) = &plugin.image {
            return image.clone();
        }
        let registry = plugin
            .registry
            .as_deref()
            .unwrap_or_else(|| self.config.registry());
        let repository = format!("{}/plugin-{}-api", registry, plugin.name);
        if let Some(digest) = &plugin.digest {
            return format!("{repository}@{digest}");
        }
        let tag = plugin
            .image_tag
            .as_deref()
            .unwrap_or_else(|| self.config.release_tag());
        format!("{repository}:{tag}")
    }

    /// Image reference of a platform service, `registry/<image>:<tag>`.
    pub fn platform_image(&self, routing_name: &str, image: &str) -> String {
        format!(
            "{}/{}:{}",
            self.config.registry(),
            image,
            self.config.platform_tag(routing_name)
        )
    }

    pub fn build_plugin_block(&self, plugin: &PluginDescriptor) -> DeployResult<ServiceBlock> {
        if plugin.name.trim().is_empty() {
            return Err(DeployError::ConfigInvalid(
                "plugin descriptor without a name".to_string(),
            ));
        }

        let mut block = self.base_block(self.plugin_image(plugin));
        block.environment = self.env.plugin_environment(plugin)?;
        block.extra_hosts = self.datastore_aliases(Some(plugin));
        block.healthcheck = Some(health_check_fragment(self.defaults.service_internal_port));
        // Replica count only when the descriptor names one; the update
        // policy itself applies to every clustered service.
        block.deploy = self
            .defaults
            .topology
            .update_policy_fragment(plugin.replicas);
        Ok(block)
    }

    pub fn build_platform_blocks(&self) -> DeployResult<BTreeMap<String, ServiceBlock>> {
        let mut blocks = BTreeMap::new();
        let common = self.env.common_environment()?;
        let core_mongo = self.env.datastore_url(None)?.to_string();
        let public_url = self.config.public_url();
        let public_host = self.config.public_host();
        let internal_port = self.defaults.service_internal_port;
        let jwt = self.config.jwt_token_secret.clone().unwrap_or_default();

        // Aggregator UI
        let mut coreui = self.base_block(self.platform_image("coreui", "coreui"));
        coreui.merge_env([
            ("REACT_APP_API_URL", format!("{public_url}/gateway")),
            (
                "REACT_APP_API_SUBSCRIPTION_URL",
                format!("wss://{public_host}/gateway/graphql"),
            ),
            ("REACT_APP_CDN_HOST", format!("{public_url}/widgets")),
            ("NODE_ENV", "production".to_string()),
        ]);
        coreui.ports = vec![format!("{}:80", self.defaults.ui_port)];
        coreui.volumes = vec![
            "./plugin-uis:/usr/share/nginx/html/js/plugins".to_string(),
            "./plugins.js:/usr/share/nginx/html/js/plugins.js".to_string(),
            "./locales:/usr/share/nginx/html/locales".to_string(),
        ];
        coreui.deploy = self.platform_policy("coreui", None);
        self.apply_override(&mut coreui, "coreui");
        blocks.insert(COREUI_SERVICE.to_string(), coreui);

        // Core API
        let mut core = self.base_block(self.platform_image("core", "core"));
        core.environment = common.clone();
        core.merge_env([
            ("SERVICE_NAME", CORE_SERVICE.to_string()),
            ("PORT", internal_port.to_string()),
            ("JWT_TOKEN_SECRET", jwt.clone()),
            ("MONGO_URL", core_mongo.clone()),
            ("DOMAIN", format!("{public_url}/gateway")),
            ("WIDGETS_DOMAIN", format!("{public_url}/widgets")),
            ("LOAD_BALANCER_ADDRESS", format!("http://{CORE_SERVICE}")),
        ]);
        core.extra_hosts = self.datastore_aliases(None);
        core.healthcheck = Some(health_check_fragment(internal_port));
        core.deploy = self.platform_policy("core", Some(DEFAULT_REPLICAS));
        self.apply_override(&mut core, "core");
        blocks.insert(CORE_SERVICE.to_string(), core);

        // Gateway
        let mut gateway = self.base_block(self.platform_image("gateway", "gateway"));
        gateway.environment = common.clone();
        gateway.merge_env([
            ("SERVICE_NAME", GATEWAY_SERVICE.to_string()),
            ("PORT", internal_port.to_string()),
            ("JWT_TOKEN_SECRET", jwt),
            ("MONGO_URL", core_mongo.clone()),
            ("DOMAIN", public_url.clone()),
        ]);
        gateway.ports = vec![format!("{}:{}", self.defaults.gateway_port, internal_port)];
        gateway.extra_hosts = self.datastore_aliases(None);
        gateway.healthcheck = Some(health_check_fragment(internal_port));
        gateway.deploy = self.platform_policy("gateway", Some(DEFAULT_REPLICAS));
        self.apply_override(&mut gateway, "gateway");
        blocks.insert(GATEWAY_SERVICE.to_string(), gateway);

        // Scheduler
        let mut crons = self.base_block(self.platform_image("crons", "crons"));
        crons.environment = common.clone();
        crons.merge_env([("MONGO_URL", core_mongo.clone())]);
        crons.extra_hosts = self.datastore_aliases(None);
        crons.deploy = self.platform_policy("crons", None);
        self.apply_override(&mut crons, "crons");
        blocks.insert(CRONS_SERVICE.to_string(), crons);

        // Background workers
        let mut workers = self.base_block(self.platform_image("workers", "workers"));
        workers.environment = common.clone();
        workers.merge_env([
            ("SERVICE_NAME", WORKERS_SERVICE.to_string()),
            ("PORT", internal_port.to_string()),
            ("MONGO_URL", core_mongo.clone()),
            ("JWT_TOKEN_SECRET", self.config.jwt_token_secret.clone().unwrap_or_default()),
        ]);
        workers.extra_hosts = self.datastore_aliases(None);
        workers.deploy = self.platform_policy("workers", None);
        self.apply_override(&mut workers, "workers");
        blocks.insert(WORKERS_SERVICE.to_string(), workers);

        // Widgets
        let mut widgets = self.base_block(self.platform_image("widgets", "widgets"));
        widgets.merge_env([
            ("PORT", WIDGETS_CONTAINER_PORT.to_string()),
            ("ROOT_URL", format!("{public_url}/widgets")),
            ("API_URL", format!("{public_url}/gateway")),
            (
                "API_SUBSCRIPTIONS_URL",
                format!("wss://{public_host}/gateway/graphql"),
            ),
        ]);
        widgets.ports = vec![format!(
            "{}:{}",
            self.defaults.widgets_port, WIDGETS_CONTAINER_PORT
        )];
        widgets.deploy = self.platform_policy("widgets", None);
        self.apply_override(&mut widgets, "widgets");
        blocks.insert(WIDGETS_SERVICE.to_string(), widgets);

        if self.config.features.dashboard {
            let mut dashboard =
                self.base_block(self.platform_image("dashboard", "dashboard-api"));
            dashboard.environment = common.clone();
            dashboard.merge_env([
                ("SERVICE_NAME", DASHBOARD_SERVICE.to_string()),
                ("PORT", internal_port.to_string()),
                ("MONGO_URL", core_mongo.clone()),
            ]);
            dashboard.ports = vec![format!(
                "{}:{}",
                self.defaults.dashboard_api_port, internal_port
            )];
            dashboard.extra_hosts = self.datastore_aliases(None);
            dashboard.healthcheck = Some(health_check_fragment(internal_port));
            dashboard.deploy = self.platform_policy("dashboard", None);
            self.apply_override(&mut dashboard, "dashboard");
            blocks.insert(DASHBOARD_SERVICE.to_string(), dashboard);
        }

        if self.config.features.essyncer {
            let mut essyncer = self.base_block(self.platform_image("essyncer", "essyncer"));
            essyncer.merge_env([
                ("ELASTICSEARCH_URL", self.env.search_url().to_string()),
                ("MONGO_URL", core_mongo),
            ]);
            essyncer.volumes = vec!["./essyncer.json:/data/essyncerJSON".to_string()];
            essyncer.extra_hosts = self.datastore_aliases(None);
            essyncer.deploy = self.platform_policy("essyncer", None);
            self.apply_override(&mut essyncer, "essyncer");
            blocks.insert(ESSYNCER_SERVICE.to_string(), essyncer);
        }

        Ok(blocks)
    }

    /// `name:host` aliases routing document-store names to a remote host.
    pub fn datastore_aliases(&self, plugin: Option<&PluginDescriptor>) -> Vec<String> {
        let mut aliases = Vec::new();
        let primary = plugin
            .and_then(|p| p.db_server_address.as_deref())
            .or(self.config.db_server_address.as_deref());
        if let Some(host) = primary {
            aliases.push(format!("{MONGO_ALIAS}:{host}"));
        }
        if let Some(secondary) = &self.config.secondary_server_address {
            aliases.push(format!("{MONGO_SECONDARY_ALIAS}:{secondary}"));
        }
        aliases
    }

    fn base_block(&self, image: String) -> ServiceBlock {
        let mut block = ServiceBlock::new(image);
        block.networks = vec![NETWORK_NAME.to_string()];
        block.restart = self.defaults.topology.restart_policy();
        block
    }

    fn platform_policy(
        &self,
        routing_name: &str,
        default_replicas: Option<u32>,
    ) -> Option<crate::manifest::DeployPolicy> {
        let replicas = self
            .config
            .service_override(routing_name)
            .and_then(|o| o.replicas)
            .or(default_replicas);
        self.defaults.topology.update_policy_fragment(replicas)
    }

    fn apply_override(&self, block: &mut ServiceBlock, routing_name: &str) {
        if let Some(overrides) = self.config.service_override(routing_name) {
            let extra: EnvironmentMap = overrides.extra_env.clone();
            block.merge_env(extra);
        }
    }
}
