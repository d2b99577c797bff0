//! stackgen core library
//!
//! Compiles one tenant configuration document into the artifacts that run a
//! plugin-based service platform: the orchestrator manifest, the reverse
//! proxy configuration, the plugin bootstrap script and the search-sync and
//! permission manifests. Also drives targeted updates of a running stack.

pub mod aggregate;
pub mod assets;
pub mod catalog;
pub mod commands;
pub mod compile;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod manifest;
pub mod render;
pub mod runtime;
pub mod stateful;
pub mod topology;
pub mod writer;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{
        ConfigStore, PluginConfigService, PluginDescriptor, PluginOutcome, TenantConfiguration,
    };
    pub use crate::context::{DeployContext, RuntimeDefaults};
    pub use crate::error::{DeployError, DeployResult};

    // Compilation
    pub use crate::catalog::{PluginCatalog, PluginMetadata};
    pub use crate::compile::{CompiledDeployment, compile};
    pub use crate::manifest::{Manifest, ServiceBlock};
    pub use crate::stateful::{StatefulStack, StatefulStackCompiler};
    pub use crate::topology::DeploymentTopology;
    pub use crate::writer::{ManifestWriter, WriteReport};

    // Assets
    pub use crate::assets::{AssetSources, AssetSync, BlockingAssetSync, Fetch, HttpFetcher};

    // Running stack
    pub use crate::dispatch::{
        ItemOutcome, ItemStatus, UiSync, UpdateDispatcher, UpdateOptions, UpdateReport,
    };
    pub use crate::runtime::{DockerCli, ServiceRuntime};
}
