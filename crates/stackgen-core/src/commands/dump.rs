//! Document-store dump.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::config::TenantConfiguration;
use crate::context::DeployContext;
use crate::environment::EnvironmentSynthesizer;
use crate::error::{DeployError, DeployResult};
use crate::runtime::ServiceRuntime;
use crate::stateful::MONGO_SERVICE;

/// Host directory receiving copied-out archives
pub const DUMP_DIR: &str = "dumps";

#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Database to dump; tenant default when unset
    pub db: Option<String>,
    pub copy_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    pub db: String,
    /// Archive path inside the container
    pub archive: String,
    pub copied_to: Option<PathBuf>,
}

pub struct DumpCommand<'a> {
    ctx: &'a DeployContext,
}

impl<'a> DumpCommand<'a> {
    pub fn new(ctx: &'a DeployContext) -> Self {
        Self { ctx }
    }

    pub fn run(&self, options: DumpOptions) -> DeployResult<DumpReport> {
        let config = self.ctx.config_store().load()?;
        let runtime = super::dbs_runtime(self.ctx, &config);
        self.execute(&config, options, &runtime, chrono::Utc::now())
    }

    pub fn execute<R: ServiceRuntime>(
        &self,
        config: &TenantConfiguration,
        options: DumpOptions,
        runtime: &R,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DeployResult<DumpReport> {
        let mut url = EnvironmentSynthesizer::new(config, self.ctx.defaults()).datastore_url(None)?;
        if let Some(db) = options.db {
            url.db_name = db;
        }
        let db = url.db_name.clone();

        let file_name = format!("{}-{}.gz", db, now.format("%Y%m%d-%H%M%S"));
        let archive = format!("/tmp/{file_name}");
        let args = vec![
            "mongodump".to_string(),
            format!("--uri={url}"),
            format!("--archive={archive}"),
            "--gzip".to_string(),
        ];

        info!(db = %db, archive = %archive, "dumping database");
        runtime
            .exec(MONGO_SERVICE, &args)
            .map_err(|e| DeployError::runtime(format!("dump database {db}"), e))?;

        let copied_to = if options.copy_out {
            let dir = self.ctx.work_dir().join(DUMP_DIR);
            std::fs::create_dir_all(&dir)
                .map_err(|e| DeployError::manifest_write(&dir, anyhow::Error::new(e)))?;
            let dest = dir.join(&file_name);
            runtime
                .copy_out(MONGO_SERVICE, &archive, &dest)
                .map_err(|e| DeployError::runtime(format!("copy out {archive}"), e))?;
            info!(dest = %dest.display(), "dump copied to host");
            Some(dest)
        } else {
            None
        };

        Ok(DumpReport {
            db,
            archive,
            copied_to,
        })
    }
}
