//! High-level commands.
//!
//! Each command loads the tenant document through the [`DeployContext`],
//! runs the relevant components and returns a report for the frontend to
//! render. Fatal conditions surface as [`crate::error::DeployError`].

pub mod dbs;
pub mod deploy;
pub mod dump;
pub mod service;

pub use dbs::{DeployDbsCommand, DeployDbsOptions, DeployDbsReport};
pub use deploy::{DeployCommand, DeployOptions, DeployReport};
pub use dump::{DumpCommand, DumpOptions, DumpReport};
pub use service::ServiceCommand;

use crate::config::TenantConfiguration;
use crate::context::DeployContext;
use crate::runtime::DockerCli;
use crate::stateful::DBS_MANIFEST;
use crate::writer::APP_MANIFEST;

/// Docker runtime for the application stack.
pub fn app_runtime(ctx: &DeployContext, config: &TenantConfiguration) -> DockerCli {
    DockerCli::new(
        ctx.topology(),
        config.stack_name(),
        ctx.work_dir(),
        APP_MANIFEST,
    )
}

/// Docker runtime for the stateful stack.
pub fn dbs_runtime(ctx: &DeployContext, config: &TenantConfiguration) -> DockerCli {
    DockerCli::new(
        ctx.topology(),
        config.dbs_stack_name(),
        ctx.work_dir(),
        DBS_MANIFEST,
    )
}
