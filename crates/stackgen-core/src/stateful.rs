//! Stateful stack: document store, cache, broker, search engine and the
//! optional search dashboard.
//!
//! Emits its own manifest, disjoint from the application stack. This stack
//! owns the shared network in clustered mode.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::TenantConfiguration;
use crate::context::RuntimeDefaults;
use crate::environment::connection::{
    IN_CLUSTER_ELASTICSEARCH_PORT, IN_CLUSTER_MONGO_PORT, IN_CLUSTER_RABBITMQ_PORT,
    IN_CLUSTER_REDIS_PORT, REPLICA_SET_NAME,
};
use crate::error::{DeployError, DeployResult};
use crate::manifest::services::MONGO_SECONDARY_ALIAS;
use crate::manifest::{Manifest, ServiceBlock};
use crate::topology::{DeploymentTopology, NETWORK_NAME};

pub const DBS_MANIFEST: &str = "docker-compose-dbs.yml";
pub const REPLICA_INIT_SCRIPT: &str = "rs-init.js";
/// Pre-shared replica-set key, relative to the working directory
pub const KEY_FILE: &str = "mongo-key";

pub const MONGO_SERVICE: &str = "mongo";
pub const REDIS_SERVICE: &str = "redis";
pub const RABBITMQ_SERVICE: &str = "rabbitmq";
pub const ELASTICSEARCH_SERVICE: &str = "elasticsearch";
pub const KIBANA_SERVICE: &str = "kibana";

const MONGO_IMAGE: &str = "mongo:4.4.25";
const REDIS_IMAGE: &str = "redis:7.2";
const RABBITMQ_IMAGE: &str = "rabbitmq:3.12-management";
const ELASTICSEARCH_IMAGE: &str = "docker.elastic.co/elasticsearch/elasticsearch:7.17.9";
const KIBANA_IMAGE: &str = "docker.elastic.co/kibana/kibana:7.17.9";

const CONTAINER_KEY_PATH: &str = "/etc/mongo-keyfile";
const CONTAINER_INIT_PATH: &str = "/rs-init.js";

#[derive(Debug, Clone)]
pub struct StatefulStack {
    pub manifest: Manifest,
    /// Replica-set bootstrap script, present in replica-set mode
    pub replica_init: Option<String>,
}

impl StatefulStack {
    /// Path of the bootstrap script inside the document-store container
    pub fn init_script_path(&self) -> Option<&'static str> {
        self.replica_init.as_ref().map(|_| CONTAINER_INIT_PATH)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatefulStackCompiler<'a> {
    config: &'a TenantConfiguration,
    defaults: &'a RuntimeDefaults,
    work_dir: &'a Path,
}

impl<'a> StatefulStackCompiler<'a> {
    pub fn new(
        config: &'a TenantConfiguration,
        defaults: &'a RuntimeDefaults,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            config,
            defaults,
            work_dir,
        }
    }

    pub fn key_file_path(&self) -> PathBuf {
        self.work_dir.join(KEY_FILE)
    }

    /// Replica-set mode needs the key file before anything is generated.
    pub fn check_key_file(&self) -> DeployResult<()> {
        if !self.config.mongo.replication {
            return Ok(());
        }
        let path = self.key_file_path();
        if !path.is_file() {
            return Err(DeployError::KeyFileMissing { path });
        }
        debug!(path = %path.display(), "replica-set key file present");
        Ok(())
    }

    pub fn compile(&self) -> DeployResult<StatefulStack> {
        self.check_key_file()?;

        let topology = self.defaults.topology;
        let mut manifest = Manifest::new();
        manifest
            .networks
            .insert(NETWORK_NAME.to_string(), topology.stateful_network_fragment());

        manifest
            .services
            .insert(MONGO_SERVICE.to_string(), self.mongo_block()?);
        manifest
            .services
            .insert(REDIS_SERVICE.to_string(), self.redis_block());

        if self.config.rabbitmq.cloud_url.is_none() {
            manifest
                .services
                .insert(RABBITMQ_SERVICE.to_string(), self.rabbitmq_block()?);
        }

        if self.config.elasticsearch.url.is_none() {
            manifest
                .services
                .insert(ELASTICSEARCH_SERVICE.to_string(), self.elasticsearch_block());
            if self.config.features.search_dashboard {
                manifest
                    .services
                    .insert(KIBANA_SERVICE.to_string(), self.kibana_block());
            }
        }

        let replica_init = self
            .config
            .mongo
            .replication
            .then(|| self.replica_init_script(topology));

        info!(
            topology = %topology,
            services = manifest.services.len(),
            replica_set = replica_init.is_some(),
            "compiled stateful stack"
        );
        Ok(StatefulStack {
            manifest,
            replica_init,
        })
    }

    fn base_block(&self, image: &str, hostname: &str) -> ServiceBlock {
        let mut block = ServiceBlock::new(image);
        block.hostname = Some(hostname.to_string());
        block.networks = vec![NETWORK_NAME.to_string()];
        block.restart = self.defaults.topology.restart_policy();
        block
    }

    fn mongo_block(&self) -> DeployResult<ServiceBlock> {
        let mongo = &self.config.mongo;
        let username = mongo.username.clone().ok_or(DeployError::MissingCredential {
            datastore: "mongo",
            field: "username",
        })?;
        let password = mongo.password.clone().ok_or(DeployError::MissingCredential {
            datastore: "mongo",
            field: "password",
        })?;

        let mut block = self.base_block(MONGO_IMAGE, MONGO_SERVICE);
        block.merge_env([
            ("MONGO_INITDB_ROOT_USERNAME", username),
            ("MONGO_INITDB_ROOT_PASSWORD", password),
        ]);
        block.ports = vec![format!(
            "{}:{}",
            self.defaults.mongo_port, IN_CLUSTER_MONGO_PORT
        )];
        block.volumes = vec!["./mongodata:/data/db".to_string()];

        if mongo.replication {
            block.command = Some(
                [
                    "mongod",
                    "--replSet",
                    REPLICA_SET_NAME,
                    "--keyFile",
                    CONTAINER_KEY_PATH,
                    "--bind_ip_all",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            );
            block.volumes.push(format!("./{KEY_FILE}:{CONTAINER_KEY_PATH}"));
            block
                .volumes
                .push(format!("./{REPLICA_INIT_SCRIPT}:{CONTAINER_INIT_PATH}"));
            if let Some(secondary) = &self.config.secondary_server_address {
                block.extra_hosts = vec![format!("{MONGO_SECONDARY_ALIAS}:{secondary}")];
            }
        }
        Ok(block)
    }

    fn redis_block(&self) -> ServiceBlock {
        let mut block = self.base_block(REDIS_IMAGE, REDIS_SERVICE);
        let mut command = vec![
            "redis-server".to_string(),
            "--appendonly".to_string(),
            "yes".to_string(),
        ];
        if let Some(password) = &self.config.redis.password {
            command.push("--requirepass".to_string());
            command.push(password.clone());
        }
        block.command = Some(command);
        block.ports = vec![format!(
            "{}:{}",
            self.defaults.redis_port, IN_CLUSTER_REDIS_PORT
        )];
        block.volumes = vec!["./redisdata:/data".to_string()];
        block
    }

    fn rabbitmq_block(&self) -> DeployResult<ServiceBlock> {
        let rabbitmq = &self.config.rabbitmq;
        let user = rabbitmq.user.clone().ok_or(DeployError::MissingCredential {
            datastore: "rabbitmq",
            field: "user",
        })?;
        let pass = rabbitmq.pass.clone().ok_or(DeployError::MissingCredential {
            datastore: "rabbitmq",
            field: "pass",
        })?;

        let mut block = self.base_block(RABBITMQ_IMAGE, RABBITMQ_SERVICE);
        block.merge_env([
            ("RABBITMQ_DEFAULT_USER", user),
            ("RABBITMQ_DEFAULT_PASS", pass),
        ]);
        if let Some(vhost) = &rabbitmq.vhost {
            block.merge_env([("RABBITMQ_DEFAULT_VHOST", vhost.clone())]);
        }
        block.ports = vec![format!(
            "{}:{}",
            self.defaults.rabbitmq_port, IN_CLUSTER_RABBITMQ_PORT
        )];
        block.volumes = vec!["./rabbitmq-data:/var/lib/rabbitmq".to_string()];
        Ok(block)
    }

    fn elasticsearch_block(&self) -> ServiceBlock {
        let mut block = self.base_block(ELASTICSEARCH_IMAGE, ELASTICSEARCH_SERVICE);
        block.merge_env([
            ("discovery.type", "single-node"),
            ("ES_JAVA_OPTS", "-Xms512m -Xmx512m"),
            ("xpack.security.enabled", "false"),
        ]);
        block.ports = vec![format!(
            "{}:{}",
            self.defaults.elasticsearch_port, IN_CLUSTER_ELASTICSEARCH_PORT
        )];
        block.volumes = vec!["./elasticsearch-data:/usr/share/elasticsearch/data".to_string()];
        block
    }

    fn kibana_block(&self) -> ServiceBlock {
        let mut block = self.base_block(KIBANA_IMAGE, KIBANA_SERVICE);
        block.merge_env([(
            "ELASTICSEARCH_HOSTS",
            format!("http://{ELASTICSEARCH_SERVICE}:{IN_CLUSTER_ELASTICSEARCH_PORT}"),
        )]);
        block.ports = vec!["5601:5601".to_string()];
        block
    }

    fn replica_init_script(&self, topology: DeploymentTopology) -> String {
        let primary = topology.datastore_host(self.config, MONGO_SERVICE);
        let mut members = vec![format!(
            "    {{ _id: 0, host: \"{primary}:{IN_CLUSTER_MONGO_PORT}\", priority: 2 }}"
        )];
        if self.config.secondary_server_address.is_some() {
            members.push(format!(
                "    {{ _id: 1, host: \"{MONGO_SECONDARY_ALIAS}:{IN_CLUSTER_MONGO_PORT}\", priority: 1 }}"
            ));
        }
        format!(
            "rs.initiate({{\n  _id: \"{REPLICA_SET_NAME}\",\n  members: [\n{}\n  ]\n}});\n",
            members.join(",\n")
        )
    }
}
