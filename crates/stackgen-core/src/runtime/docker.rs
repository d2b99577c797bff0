//! `docker` CLI runtime.
//!
//! Clustered stacks are driven through `docker service` / `docker stack`,
//! single-node stacks through `docker compose` with an explicit project
//! name.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::debug;

use crate::topology::DeploymentTopology;

use super::ServiceRuntime;

#[derive(Debug, Clone)]
pub struct DockerCli {
    topology: DeploymentTopology,
    stack: String,
    work_dir: PathBuf,
    compose_file: String,
}

impl DockerCli {
    /// `compose_file` is resolved against `work_dir` for single-node
    /// commands.
    pub fn new(
        topology: DeploymentTopology,
        stack: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        compose_file: impl Into<String>,
    ) -> Self {
        Self {
            topology,
            stack: stack.into(),
            work_dir: work_dir.into(),
            compose_file: compose_file.into(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Orchestrator-level name of a manifest service
    pub fn qualified(&self, service: &str) -> String {
        format!("{}_{}", self.stack, service)
    }

    fn compose(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.stack.clone(),
            "-f".to_string(),
            self.compose_file.clone(),
        ];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    pub(crate) fn update_image_plan(&self, service: &str, image: &str) -> Vec<Vec<String>> {
        match self.topology {
            DeploymentTopology::Clustered => vec![owned(&[
                "service",
                "update",
                "--with-registry-auth",
                "--image",
                image,
                &self.qualified(service),
            ])],
            DeploymentTopology::SingleNode => vec![
                owned(&["pull", image]),
                self.compose(&["up", "-d", "--no-deps", "--force-recreate", service]),
            ],
        }
    }

    pub(crate) fn force_restart_plan(&self, service: &str) -> Vec<String> {
        match self.topology {
            DeploymentTopology::Clustered => {
                owned(&["service", "update", "--force", &self.qualified(service)])
            }
            DeploymentTopology::SingleNode => self.compose(&["restart", service]),
        }
    }

    pub(crate) fn remove_plan(&self, service: &str) -> Vec<String> {
        match self.topology {
            DeploymentTopology::Clustered => owned(&["service", "rm", &self.qualified(service)]),
            DeploymentTopology::SingleNode => self.compose(&["rm", "-s", "-f", service]),
        }
    }

    pub(crate) fn apply_stack_plan(&self, manifest: &Path) -> Vec<String> {
        let manifest = manifest.display().to_string();
        match self.topology {
            DeploymentTopology::Clustered => owned(&[
                "stack",
                "deploy",
                "--with-registry-auth",
                "-c",
                &manifest,
                &self.stack,
            ]),
            DeploymentTopology::SingleNode => {
                let mut args = owned(&["compose", "-p", &self.stack, "-f", &manifest]);
                args.extend(owned(&["up", "-d", "--remove-orphans"]));
                args
            }
        }
    }

    /// First running container of a clustered service.
    fn container_id(&self, service: &str) -> anyhow::Result<String> {
        let filter = format!("name={}", self.qualified(service));
        let stdout = self.run(&owned(&["ps", "-q", "-f", &filter]))?;
        stdout
            .lines()
            .next()
            .map(str::to_string)
            .with_context(|| format!("No running container for service {}", service))
    }

    fn run(&self, args: &[String]) -> anyhow::Result<String> {
        debug!(args = ?args, "docker");
        let output = Command::new("docker")
            .args(args)
            .current_dir(&self.work_dir)
            .output()
            .with_context(|| format!("Failed to run docker {:?}", args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Docker command failed {:?}: {}", args, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ServiceRuntime for DockerCli {
    fn update_image(&self, service: &str, image: &str) -> anyhow::Result<()> {
        for args in self.update_image_plan(service, image) {
            self.run(&args)?;
        }
        Ok(())
    }

    fn force_restart(&self, service: &str) -> anyhow::Result<()> {
        self.run(&self.force_restart_plan(service)).map(|_| ())
    }

    fn remove(&self, service: &str) -> anyhow::Result<()> {
        self.run(&self.remove_plan(service)).map(|_| ())
    }

    fn apply_stack(&self, manifest: &Path) -> anyhow::Result<()> {
        self.run(&self.apply_stack_plan(manifest)).map(|_| ())
    }

    fn exec(&self, service: &str, args: &[String]) -> anyhow::Result<String> {
        let mut full = match self.topology {
            DeploymentTopology::Clustered => {
                vec!["exec".to_string(), self.container_id(service)?]
            }
            DeploymentTopology::SingleNode => self.compose(&["exec", "-T", service]),
        };
        full.extend(args.iter().cloned());
        self.run(&full)
    }

    fn copy_out(&self, service: &str, source: &str, dest: &Path) -> anyhow::Result<()> {
        let dest = dest.display().to_string();
        let args = match self.topology {
            DeploymentTopology::Clustered => {
                let from = format!("{}:{}", self.container_id(service)?, source);
                owned(&["cp", &from, &dest])
            }
            DeploymentTopology::SingleNode => {
                let from = format!("{service}:{source}");
                self.compose(&["cp", &from, &dest])
            }
        };
        self.run(&args).map(|_| ())
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(topology: DeploymentTopology) -> DockerCli {
        DockerCli::new(topology, "platform", "/srv/acme", "docker-compose.yml")
    }

    #[test]
    fn clustered_commands_use_stack_qualified_names() {
        let docker = cli(DeploymentTopology::Clustered);
        assert_eq!(
            docker.update_image_plan("gateway", "stackgen/gateway:2.0.1"),
            vec![owned(&[
                "service",
                "update",
                "--with-registry-auth",
                "--image",
                "stackgen/gateway:2.0.1",
                "platform_gateway",
            ])]
        );
        assert_eq!(
            docker.force_restart_plan("coreui"),
            owned(&["service", "update", "--force", "platform_coreui"])
        );
        assert_eq!(
            docker.remove_plan("plugin-sales-api"),
            owned(&["service", "rm", "platform_plugin-sales-api"])
        );
    }

    #[test]
    fn single_node_commands_go_through_compose() {
        let docker = cli(DeploymentTopology::SingleNode);
        let plan = docker.update_image_plan("gateway", "stackgen/gateway:2.0.1");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], owned(&["pull", "stackgen/gateway:2.0.1"]));
        assert_eq!(&plan[1][..5], &owned(&["compose", "-p", "platform", "-f", "docker-compose.yml"])[..]);
        assert_eq!(plan[1].last().map(String::as_str), Some("gateway"));

        assert_eq!(
            docker.force_restart_plan("coreui")[5..],
            owned(&["restart", "coreui"])[..]
        );
    }

    #[test]
    fn apply_stack_differs_by_topology() {
        let manifest = Path::new("/srv/acme/docker-compose.yml");
        let swarm = cli(DeploymentTopology::Clustered).apply_stack_plan(manifest);
        assert_eq!(swarm[0..2], owned(&["stack", "deploy"])[..]);
        assert_eq!(swarm.last().map(String::as_str), Some("platform"));

        let compose = cli(DeploymentTopology::SingleNode).apply_stack_plan(manifest);
        assert_eq!(compose[0], "compose");
        assert!(compose.contains(&"--remove-orphans".to_string()));
    }
}
