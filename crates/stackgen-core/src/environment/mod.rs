//! Shared environment and datastore connection strings.
//!
//! Pure functions of the tenant document and [`RuntimeDefaults`]; nothing
//! here performs I/O. Missing required credentials fail the whole run.

pub mod connection;

use std::collections::BTreeMap;

use crate::config::{PluginDescriptor, TenantConfiguration};
use crate::context::RuntimeDefaults;
use crate::error::{DeployError, DeployResult};

pub use connection::{AmqpUrl, Endpoint, MongoUrl, RedisEndpoint, SearchUrl};
use connection::{
    IN_CLUSTER_ELASTICSEARCH_PORT, IN_CLUSTER_MONGO_PORT, IN_CLUSTER_RABBITMQ_PORT,
    IN_CLUSTER_REDIS_PORT, REPLICA_SET_NAME,
};

pub type EnvironmentMap = BTreeMap<String, String>;

/// Always-enabled service appended to the plugin names
pub const WORKERS_SERVICE: &str = "workers";

#[derive(Debug, Clone, Copy)]
pub struct EnvironmentSynthesizer<'a> {
    config: &'a TenantConfiguration,
    defaults: &'a RuntimeDefaults,
}

impl<'a> EnvironmentSynthesizer<'a> {
    pub fn new(config: &'a TenantConfiguration, defaults: &'a RuntimeDefaults) -> Self {
        Self { config, defaults }
    }

    /// Environment injected into every service.
    ///
    /// Precedence, lowest first: the tenant's `be_env`, then computed values.
    pub fn common_environment(&self) -> DeployResult<EnvironmentMap> {
        let mut env: EnvironmentMap = self.config.be_env.clone();

        let enabled: Vec<&str> = self
            .config
            .plugins
            .iter()
            .map(|p| p.name.as_str())
            .chain(std::iter::once(WORKERS_SERVICE))
            .collect();
        let enabled_json = serde_json::to_string(&enabled).map_err(|e| {
            DeployError::ConfigInvalid(format!("cannot encode enabled services: {e}"))
        })?;

        let redis = self.redis_endpoint();

        env.insert("ENABLED_SERVICES_JSON".to_string(), enabled_json);
        env.insert(
            "ELASTICSEARCH_URL".to_string(),
            self.search_url().to_string(),
        );
        env.insert("REDIS_HOST".to_string(), redis.endpoint.host.clone());
        env.insert("REDIS_PORT".to_string(), redis.endpoint.port.to_string());
        env.insert(
            "REDIS_PASSWORD".to_string(),
            redis.password.clone().unwrap_or_default(),
        );
        env.insert(
            "RABBITMQ_HOST".to_string(),
            self.amqp_url()?.to_string(),
        );
        env.insert(
            "RELEASE".to_string(),
            self.config.release_tag().to_string(),
        );
        env.insert(
            "VERSION".to_string(),
            self.config
                .version
                .clone()
                .unwrap_or_else(|| crate::config::schema::DEFAULT_VERSION.to_string()),
        );

        Ok(env)
    }

    /// Document-store connection string, optionally scoped to a plugin.
    ///
    /// Database name precedence: plugin override, tenant default, literal.
    pub fn datastore_url(&self, plugin: Option<&PluginDescriptor>) -> DeployResult<MongoUrl> {
        let mongo = &self.config.mongo;
        let username = mongo.username.clone().ok_or(DeployError::MissingCredential {
            datastore: "mongo",
            field: "username",
        })?;
        let password = mongo.password.clone().ok_or(DeployError::MissingCredential {
            datastore: "mongo",
            field: "password",
        })?;

        let remote = plugin
            .and_then(|p| p.db_server_address.as_deref())
            .or(self.config.db_server_address.as_deref());

        let db_name = plugin
            .and_then(|p| p.db_name.as_deref())
            .unwrap_or_else(|| self.config.default_db_name())
            .to_string();

        let mut options = vec![("authSource".to_string(), "admin".to_string())];
        if mongo.replication {
            options.push(("replicaSet".to_string(), REPLICA_SET_NAME.to_string()));
        }

        Ok(MongoUrl {
            username,
            password,
            endpoint: Endpoint::resolve(
                remote,
                self.defaults.topology.datastore_host(self.config, "mongo"),
                self.defaults.mongo_port,
                IN_CLUSTER_MONGO_PORT,
            ),
            db_name,
            options,
        })
    }

    pub fn redis_endpoint(&self) -> RedisEndpoint {
        RedisEndpoint {
            endpoint: Endpoint::resolve(
                self.config.db_server_address.as_deref(),
                self.defaults.topology.datastore_host(self.config, "redis"),
                self.defaults.redis_port,
                IN_CLUSTER_REDIS_PORT,
            ),
            password: self.config.redis.password.clone(),
        }
    }

    pub fn amqp_url(&self) -> DeployResult<AmqpUrl> {
        let rabbitmq = &self.config.rabbitmq;
        if let Some(cloud_url) = &rabbitmq.cloud_url {
            return Ok(AmqpUrl::Cloud(cloud_url.clone()));
        }

        let user = rabbitmq.user.clone().ok_or(DeployError::MissingCredential {
            datastore: "rabbitmq",
            field: "user",
        })?;
        let pass = rabbitmq.pass.clone().ok_or(DeployError::MissingCredential {
            datastore: "rabbitmq",
            field: "pass",
        })?;

        Ok(AmqpUrl::Synthesized {
            user,
            pass,
            endpoint: Endpoint::resolve(
                self.config.db_server_address.as_deref(),
                self.defaults.topology.datastore_host(self.config, "rabbitmq"),
                self.defaults.rabbitmq_port,
                IN_CLUSTER_RABBITMQ_PORT,
            ),
            vhost: rabbitmq.vhost.clone().unwrap_or_default(),
        })
    }

    pub fn search_url(&self) -> SearchUrl {
        if let Some(url) = &self.config.elasticsearch.url {
            return SearchUrl::Hosted(url.clone());
        }
        SearchUrl::Endpoint(Endpoint::resolve(
            self.config.db_server_address.as_deref(),
            self.defaults
                .topology
                .datastore_host(self.config, "elasticsearch"),
            self.defaults.elasticsearch_port,
            IN_CLUSTER_ELASTICSEARCH_PORT,
        ))
    }

    /// Full environment of one plugin service.
    ///
    /// The plugin's own `extra_env` is merged last, so a plugin may pin its
    /// own `MONGO_URL`.
    pub fn plugin_environment(&self, plugin: &PluginDescriptor) -> DeployResult<EnvironmentMap> {
        let service = plugin.service_name();
        let mut env = self.common_environment()?;

        env.insert("SERVICE_NAME".to_string(), service.clone());
        env.insert(
            "PORT".to_string(),
            self.defaults.service_internal_port.to_string(),
        );
        env.insert(
            "API_MONGO_URL".to_string(),
            self.datastore_url(None)?.to_string(),
        );
        env.insert(
            "MONGO_URL".to_string(),
            self.datastore_url(Some(plugin))?.to_string(),
        );
        env.insert(
            "LOAD_BALANCER_ADDRESS".to_string(),
            format!("http://{service}"),
        );
        env.extend(plugin.extra_env.clone());

        Ok(env)
    }
}
