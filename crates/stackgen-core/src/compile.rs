//! Application-stack compilation.
//!
//! A pure pipeline from configuration and catalog to every artifact of a
//! deploy run; nothing here touches the filesystem or the network.

use tracing::{debug, warn};

use crate::aggregate::{Aggregates, AggregationEngine};
use crate::catalog::PluginCatalog;
use crate::config::TenantConfiguration;
use crate::context::RuntimeDefaults;
use crate::error::{DeployError, DeployResult};
use crate::manifest::{Manifest, ServiceBlock, ServiceBlockBuilder};
use crate::render::{render_bootstrap_script, render_proxy_config};
use crate::topology::NETWORK_NAME;

#[derive(Debug, Clone)]
pub struct CompiledDeployment {
    pub manifest: Manifest,
    pub aggregates: Aggregates,
    pub proxy_config: String,
    pub bootstrap_script: String,
}

/// Compile the application stack for one tenant.
///
/// `cdn_host` is the token in plugin UI metadata that is rewritten to the
/// tenant's public URL.
pub fn compile(
    config: &TenantConfiguration,
    defaults: &RuntimeDefaults,
    catalog: &PluginCatalog,
    cdn_host: &str,
) -> DeployResult<CompiledDeployment> {
    let builder = ServiceBlockBuilder::new(config, defaults);

    let mut manifest = Manifest::new();
    manifest.networks.insert(
        NETWORK_NAME.to_string(),
        defaults.topology.network_fragment(config),
    );

    for (name, block) in &config.extra_services {
        manifest.services.insert(name.clone(), block.clone());
    }

    for (name, block) in builder.build_platform_blocks()? {
        insert_service(&mut manifest, name, block);
    }

    let mut engine = AggregationEngine::new(config);
    for plugin in &config.plugins {
        let block = builder.build_plugin_block(plugin)?;
        let metadata = catalog.metadata_for(plugin);
        engine.observe(
            plugin,
            &metadata,
            block.environment.get("MONGO_URL").map(String::as_str),
        );
        insert_service(&mut manifest, plugin.service_name(), block);
    }
    let aggregates = engine.finish();

    let proxy_config = render_proxy_config(config, defaults);
    let bootstrap_script = render_bootstrap_script(&aggregates.ui, cdn_host, &config.public_url())
        .map_err(|e| DeployError::manifest_write(crate::writer::BOOTSTRAP_SCRIPT, e))?;

    debug!(
        topology = %defaults.topology,
        services = manifest.services.len(),
        "compiled application stack"
    );

    Ok(CompiledDeployment {
        manifest,
        aggregates,
        proxy_config,
        bootstrap_script,
    })
}

/// Generated blocks replace free-form extra services of the same name.
fn insert_service(manifest: &mut Manifest, name: String, block: ServiceBlock) {
    if manifest.services.contains_key(&name) {
        warn!(service = %name, "extra service shadowed by generated service");
    }
    manifest.services.insert(name, block);
}
