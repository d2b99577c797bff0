//! Remote UI bundles, locale packs and the plugin catalog.
//!
//! Fetches are sequential, one plugin at a time. Any fetch or extraction
//! failure aborts the whole run; nothing is retried.

pub mod archive;
pub mod fetch;
pub mod locales;
pub mod sources;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::catalog::PluginCatalog;
use crate::config::{PluginDescriptor, TenantConfiguration};
use crate::error::{DeployError, DeployResult};

pub use archive::stage_and_extract;
pub use fetch::{Fetch, HttpFetcher};
pub use locales::{merge_locale_dir, merge_locale_maps};
pub use sources::{AssetSources, BUILD_TAGS};

/// Staging directory holding one sub-directory per plugin UI
pub const PLUGIN_UI_DIR: &str = "plugin-uis";
/// Staging directory of the merged locale pack
pub const LOCALES_DIR: &str = "locales";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// Plugins whose UI bundle was staged, in declaration order
    pub ui_bundles: Vec<String>,
    pub locale_files_merged: usize,
}

#[derive(Debug)]
pub struct AssetSync<F> {
    fetcher: F,
    sources: AssetSources,
    work_dir: PathBuf,
}

impl<F: Fetch> AssetSync<F> {
    pub fn new(fetcher: F, sources: AssetSources, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            sources,
            work_dir: work_dir.into(),
        }
    }

    pub fn sources(&self) -> &AssetSources {
        &self.sources
    }

    pub fn ui_dir(&self, plugin: &str) -> PathBuf {
        self.work_dir
            .join(PLUGIN_UI_DIR)
            .join(format!("plugin-{plugin}-ui"))
    }

    pub fn locales_dir(&self) -> PathBuf {
        self.work_dir.join(LOCALES_DIR)
    }

    /// Catalog from `plugin_catalog` (URL or path relative to the work
    /// directory), else from the bucket chain.
    pub async fn load_catalog(&self, config: &TenantConfiguration) -> DeployResult<PluginCatalog> {
        let url = match config.plugin_catalog.as_deref() {
            Some(location) if is_remote(location) => location.to_string(),
            Some(location) => {
                let path = self.work_dir.join(location);
                debug!(path = %path.display(), "loading plugin catalog from disk");
                return PluginCatalog::load(&path).map_err(|e| DeployError::config_load(path, e));
            }
            None => self.sources.catalog_url(config.image_tag.as_deref()),
        };

        info!(url = %url, "fetching plugin catalog");
        let bytes = self.fetch(&url).await?;
        let content = String::from_utf8(bytes)
            .map_err(|e| DeployError::asset_fetch(&url, anyhow::Error::new(e)))?;
        PluginCatalog::from_json(&content).map_err(|e| DeployError::asset_fetch(url, e))
    }

    /// Fetch and stage one plugin's UI bundle; returns its directory.
    pub async fn sync_plugin_ui(
        &self,
        config: &TenantConfiguration,
        plugin: &PluginDescriptor,
    ) -> DeployResult<PathBuf> {
        let tag = plugin.image_tag.as_deref().or(config.image_tag.as_deref());
        let url = self
            .sources
            .ui_bundle_url(&plugin.name, plugin.ui_location.as_deref(), tag);
        let dest = self.ui_dir(&plugin.name);

        info!(plugin = %plugin.name, url = %url, "fetching UI bundle");
        let bytes = self.fetch(&url).await?;
        self.extract(&bytes, &dest, sources::UI_ARCHIVE)?;
        Ok(dest)
    }

    /// Fetch and stage the global locale pack.
    pub async fn sync_locales(&self, config: &TenantConfiguration) -> DeployResult<PathBuf> {
        let url = self.sources.locale_pack_url(config.image_tag.as_deref());
        let dest = self.locales_dir();

        info!(url = %url, "fetching locale pack");
        let bytes = self.fetch(&url).await?;
        self.extract(&bytes, &dest, sources::LOCALE_ARCHIVE)?;
        Ok(dest)
    }

    /// Merge every staged plugin's `locales/` into the global locale pack.
    pub fn merge_plugin_locales(&self, plugins: &[String]) -> DeployResult<usize> {
        let global = self.locales_dir();
        let mut merged = 0;
        for plugin in plugins {
            let local = self.ui_dir(plugin).join(LOCALES_DIR);
            merged += merge_locale_dir(&global, &local)
                .map_err(|e| DeployError::asset_extract(&local, e))?;
        }
        Ok(merged)
    }

    /// Declared plugins with a staged UI directory, in declaration order.
    pub fn staged_plugins(&self, config: &TenantConfiguration) -> Vec<String> {
        config
            .plugins
            .iter()
            .filter(|p| self.ui_dir(&p.name).is_dir())
            .map(|p| p.name.clone())
            .collect()
    }

    /// Full sync: UI bundle of every plugin that has UI metadata or an
    /// explicit bundle location, the locale pack, then the locale merge.
    pub async fn sync_all(
        &self,
        config: &TenantConfiguration,
        catalog: &PluginCatalog,
    ) -> DeployResult<AssetReport> {
        let mut report = AssetReport::default();

        for plugin in &config.plugins {
            if !catalog.declares_ui(plugin) {
                debug!(plugin = %plugin.name, "no UI declared, skipping bundle");
                continue;
            }
            self.sync_plugin_ui(config, plugin).await?;
            report.ui_bundles.push(plugin.name.clone());
        }

        self.sync_locales(config).await?;
        report.locale_files_merged = self.merge_plugin_locales(&report.ui_bundles)?;

        info!(
            bundles = report.ui_bundles.len(),
            locale_files = report.locale_files_merged,
            "assets synced"
        );
        Ok(report)
    }

    async fn fetch(&self, url: &str) -> DeployResult<Vec<u8>> {
        self.fetcher
            .fetch(url)
            .await
            .map_err(|e| DeployError::asset_fetch(url, e))
    }

    fn extract(&self, bytes: &[u8], dest: &Path, archive_name: &str) -> DeployResult<()> {
        stage_and_extract(bytes, dest, archive_name)
            .map_err(|e| DeployError::asset_extract(dest, e))
    }
}

/// Blocking facade over [`AssetSync`] for the synchronous command layer.
pub struct BlockingAssetSync<F> {
    runtime: tokio::runtime::Runtime,
    inner: AssetSync<F>,
}

impl BlockingAssetSync<HttpFetcher> {
    /// HTTP-backed sync using the tenant's asset source overrides.
    pub fn http(
        config: &TenantConfiguration,
        work_dir: &Path,
        timeout: std::time::Duration,
    ) -> DeployResult<Self> {
        let fetcher = HttpFetcher::new(timeout)
            .map_err(|e| DeployError::asset_fetch("<client>", e))?;
        let sources = AssetSources::from_overrides(config.asset_sources.as_ref());
        Self::new(AssetSync::new(fetcher, sources, work_dir))
    }
}

impl<F: Fetch> BlockingAssetSync<F> {
    pub fn new(inner: AssetSync<F>) -> DeployResult<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| DeployError::runtime("start async runtime", anyhow::Error::new(e)))?;
        Ok(Self { runtime, inner })
    }

    pub fn inner(&self) -> &AssetSync<F> {
        &self.inner
    }

    pub fn load_catalog(&self, config: &TenantConfiguration) -> DeployResult<PluginCatalog> {
        self.runtime.block_on(self.inner.load_catalog(config))
    }

    pub fn sync_all(
        &self,
        config: &TenantConfiguration,
        catalog: &PluginCatalog,
    ) -> DeployResult<AssetReport> {
        self.runtime.block_on(self.inner.sync_all(config, catalog))
    }
}

impl<F: Fetch> crate::dispatch::UiSync for BlockingAssetSync<F> {
    fn sync_plugin_ui(
        &self,
        config: &TenantConfiguration,
        plugin: &PluginDescriptor,
    ) -> DeployResult<()> {
        self.runtime.block_on(async {
            let dir = self.inner.sync_plugin_ui(config, plugin).await?;
            // Re-extraction resets the merged files; every staged plugin is
            // merged again in declaration order.
            self.inner.sync_locales(config).await?;
            let staged = self.inner.staged_plugins(config);
            self.inner.merge_plugin_locales(&staged)?;
            debug!(plugin = %plugin.name, dir = %dir.display(), merged = staged.len(), "UI resynced");
            Ok(())
        })
    }

    fn ui_catalog(&self, config: &TenantConfiguration) -> PluginCatalog {
        match self.load_catalog(config) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "plugin catalog unavailable, using inline UI declarations");
                PluginCatalog::new()
            }
        }
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
