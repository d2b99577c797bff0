//! Stateful stack deploy.

use serde::Serialize;
use tracing::info;

use crate::config::TenantConfiguration;
use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::runtime::ServiceRuntime;
use crate::stateful::{DBS_MANIFEST, MONGO_SERVICE, REPLICA_INIT_SCRIPT, StatefulStackCompiler};
use crate::writer::{ManifestWriter, WrittenArtifact};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployDbsOptions {
    /// Run the replica-set bootstrap script after applying
    pub init_replica_set: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployDbsReport {
    pub services: Vec<String>,
    pub written: Vec<WrittenArtifact>,
    pub applied: bool,
    pub replica_set_initialized: bool,
}

pub struct DeployDbsCommand<'a> {
    ctx: &'a DeployContext,
}

impl<'a> DeployDbsCommand<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self { ctx }
    }

    pub fn run(&self, options: DeployDbsOptions) -> DeployResult<DeployDbsReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::dbs_runtime(self.ctx, &config);
        self.execute(&config, options, &runtime)
    }

    pub fn execute<R: ServiceRuntime>(
        &self,
        config: &TenantConfiguration,
        options: DeployDbsOptions,
        runtime: &R,
    ) -> DeployResult<DeployDbsReport> {
        let work_dir = self.ctx.work_dir();
        let stack =
            StatefulStackCompiler::new(config, self.ctx.defaults(), work_dir).compile()?;

        let writer = ManifestWriter::new(work_dir);
        let yaml = stack
            .manifest
            .to_yaml()
            .map_err(|e| DeployError::manifest_write(work_dir.join(DBS_MANIFEST), e))?;
        let mut written = vec![writer.write_artifact(DBS_MANIFEST, &yaml)?];
        if let Some(script) = &stack.replica_init {
            written.push(writer.write_artifact(REPLICA_INIT_SCRIPT, script)?);
        }

        if options.dry_run {
            info!("dry run: stateful stack not applied");
            return Ok(DeployDbsReport {
                services: stack.manifest.services.keys().cloned().collect(),
                written,
                applied: false,
                replica_set_initialized: false,
            });
        }

        runtime
            .apply_stack(&work_dir.join(DBS_MANIFEST))
            .map_err(|e| DeployError::runtime("apply stateful stack", e))?;
        info!(stack = %config.dbs_stack_name(), "stateful stack applied");

        let mut replica_set_initialized = false;
        if options.init_replica_set
            && let Some(script_path) = stack.init_script_path()
        {
            let args = mongo_shell_args(config, script_path);
            runtime
                .exec(MONGO_SERVICE, &args)
                .map_err(|e| DeployError::runtime("initialize replica set", e))?;
            info!("replica set initialized");
            replica_set_initialized = true;
        }

        Ok(DeployDbsReport {
            services: stack.manifest.services.keys().cloned().collect(),
            written,
            applied: true,
            replica_set_initialized,
        })
    }
}

fn mongo_shell_args(config: &TenantConfiguration, script: &str) -> Vec<String> {
    let mut args = vec!["mongo".to_string()];
    if let (Some(user), Some(pass)) = (&config.mongo.username, &config.mongo.password) {
        args.extend([
            "-u".to_string(),
            user.clone(),
            "-p".to_string(),
            pass.clone(),
            "--authenticationDatabase".to_string(),
            "admin".to_string(),
        ]);
    }
    args.push(script.to_string());
    args
}
