//! Tenant configuration
//!
//! The tenant document (`configs.json`) is the single input of every
//! compilation run. It is parsed and validated once, then passed by
//! reference to every component.

pub mod parser;
pub mod plugins;
pub mod schema;
pub mod store;

pub use parser::{parse_config, parse_config_str, to_json};
pub use plugins::{PluginConfigService, PluginOutcome};
pub use schema::{
    AssetSourceOverrides, ElasticsearchSettings, FeatureFlags, MongoCredentials,
    PluginDescriptor, RabbitmqCredentials, RedisCredentials, ServiceAlias, ServiceOverride,
    TenantConfiguration,
};
pub use store::ConfigStore;

/// Default file name of the tenant document
pub const CONFIG_FILE: &str = "configs.json";
