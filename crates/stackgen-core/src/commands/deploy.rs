//! Full deploy: compile, stage assets, write artifacts, apply.

use serde::Serialize;
use tracing::{info, warn};

use crate::assets::{AssetReport, AssetSources, BlockingAssetSync, Fetch};
use crate::catalog::PluginCatalog;
use crate::compile::compile;
use crate::config::TenantConfiguration;
use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::runtime::ServiceRuntime;
use crate::topology::DeploymentTopology;
use crate::writer::{APP_MANIFEST, ManifestWriter, WriteReport};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Use already-staged UI bundles and locales
    pub skip_assets: bool,
    /// Write artifacts without applying the stack
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub topology: DeploymentTopology,
    pub services: Vec<String>,
    pub written: WriteReport,
    pub ui_bundles: Vec<String>,
    pub applied: bool,
}

pub struct DeployCommand<'a> {
    ctx: &'a DeployContext,
}

impl<'a> DeployCommand<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self { ctx }
    }

    /// Deploy with HTTP asset fetching and the docker runtime.
    pub fn run(&self, options: DeployOptions) -> DeployResult<DeployReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::app_runtime(self.ctx, &config);
        if options.skip_assets {
            return self.execute::<crate::assets::HttpFetcher, _>(&config, options, None, &runtime);
        }
        let assets = BlockingAssetSync::http(
            &config,
            self.ctx.work_dir(),
            self.ctx.defaults().fetch_timeout,
        )?;
        self.execute(&config, options, Some(&assets), &runtime)
    }

    /// Deploy `config` with explicit seams; `assets` is ignored when
    /// `skip_assets` is set.
    pub fn execute<F: Fetch, R: ServiceRuntime>(
        &self,
        config: &TenantConfiguration,
        options: DeployOptions,
        assets: Option<&BlockingAssetSync<F>>,
        runtime: &R,
    ) -> DeployResult<DeployReport> {
        let defaults = self.ctx.defaults();
        let sources = AssetSources::from_overrides(config.asset_sources.as_ref());
        let assets = if options.skip_assets { None } else { assets };

        let catalog = match assets {
            Some(sync) => sync.load_catalog(config)?,
            None => self.local_catalog(config)?,
        };

        let compiled = compile(config, defaults, &catalog, sources.cdn_host())?;

        let asset_report = match assets {
            Some(sync) => sync.sync_all(config, &catalog)?,
            None => AssetReport::default(),
        };

        let written = ManifestWriter::new(self.ctx.work_dir()).write(&compiled)?;

        let applied = if options.dry_run {
            info!("dry run: stack not applied");
            false
        } else {
            let manifest = self.ctx.work_dir().join(APP_MANIFEST);
            runtime
                .apply_stack(&manifest)
                .map_err(|e| DeployError::runtime("apply application stack", e))?;
            info!(stack = %config.stack_name(), topology = %defaults.topology, "stack applied");
            true
        };

        Ok(DeployReport {
            topology: defaults.topology,
            services: compiled.manifest.services.keys().cloned().collect(),
            written,
            ui_bundles: asset_report.ui_bundles,
            applied,
        })
    }

    /// Catalog available without network access.
    fn local_catalog(&self, config: &TenantConfiguration) -> DeployResult<PluginCatalog> {
        match config.plugin_catalog.as_deref() {
            Some(location) if !location.contains("://") => {
                let path = self.ctx.work_dir().join(location);
                PluginCatalog::load(&path).map_err(|e| DeployError::config_load(path, e))
            }
            Some(location) => {
                warn!(catalog = %location, "remote plugin catalog skipped with assets");
                Ok(PluginCatalog::new())
            }
            None => Ok(PluginCatalog::new()),
        }
    }
}
