//! Update, restart and removal of individual running services.

use crate::assets::BlockingAssetSync;
use crate::config::TenantConfiguration;
use crate::context::DeployContext;
use crate::dispatch::{UiSync, UpdateDispatcher, UpdateOptions, UpdateReport};
use crate::error::DeployResult;
use crate::runtime::ServiceRuntime;

pub struct ServiceCommand<'a> {
    ctx: &'a DeployContext,
}

impl<'a> ServiceCommand<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self { ctx }
    }

    pub fn update(&self, names: &[String], options: UpdateOptions) -> DeployResult<UpdateReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::app_runtime(self.ctx, &config);
        if !options.sync_ui {
            return self.update_with(&config, names, options, &runtime, None);
        }
        let assets = BlockingAssetSync::http(
            &config,
            self.ctx.work_dir(),
            self.ctx.defaults().fetch_timeout,
        )?;
        self.update_with(&config, names, options, &runtime, Some(&assets))
    }

    pub fn update_with<R: ServiceRuntime>(
        &self,
        config: &TenantConfiguration,
        names: &[String],
        options: UpdateOptions,
        runtime: &R,
        ui_sync: Option<&dyn UiSync>,
    ) -> DeployResult<UpdateReport> {
        let mut dispatcher = UpdateDispatcher::new(config, self.ctx.defaults(), runtime);
        if let Some(sync) = ui_sync {
            dispatcher = dispatcher.with_ui_sync(sync);
        }
        dispatcher.apply(names, options)
    }

    pub fn restart(&self, name: &str) -> DeployResult<UpdateReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::app_runtime(self.ctx, &config);
        Ok(UpdateDispatcher::new(&config, self.ctx.defaults(), &runtime).restart(name))
    }

    pub fn remove(&self, name: &str) -> DeployResult<UpdateReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::app_runtime(self.ctx, &config);
        Ok(UpdateDispatcher::new(&config, self.ctx.defaults(), &runtime).remove(name))
    }

    /// Manifest service a name resolves to, for confirmation prompts.
    pub fn resolve(&self, name: &str) -> DeployResult<Option<String>> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::app_runtime(self.ctx, &config);
        Ok(UpdateDispatcher::new(&config, self.ctx.defaults(), &runtime).service_for(name))
    }
}
