//! Running-deployment mutation seam.

pub mod docker;

use std::path::Path;

pub use docker::DockerCli;

/// Operations against a running stack.
///
/// `service` is always the unqualified manifest service name; implementors
/// map it to whatever the orchestrator calls it.
pub trait ServiceRuntime {
    fn update_image(&self, service: &str, image: &str) -> anyhow::Result<()>;

    fn force_restart(&self, service: &str) -> anyhow::Result<()>;

    fn remove(&self, service: &str) -> anyhow::Result<()>;

    /// Create or converge the stack described by `manifest`.
    fn apply_stack(&self, manifest: &Path) -> anyhow::Result<()>;

    /// Run a command inside one container of `service`; returns stdout.
    fn exec(&self, service: &str, args: &[String]) -> anyhow::Result<String>;

    fn copy_out(&self, service: &str, source: &str, dest: &Path) -> anyhow::Result<()>;
}
