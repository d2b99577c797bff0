//! Artifact serialization.
//!
//! Each artifact is written only when its content digest differs from the
//! file already on disk.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::compile::CompiledDeployment;
use crate::error::{DeployError, DeployResult};

pub const APP_MANIFEST: &str = "docker-compose.yml";
pub const PROXY_CONFIG: &str = "nginx.conf";
pub const BOOTSTRAP_SCRIPT: &str = "plugins.js";
pub const ESSYNCER_MANIFEST: &str = "essyncer.json";
pub const PERMISSION_MANIFEST: &str = "permissions.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub name: String,
    pub path: PathBuf,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub artifacts: Vec<WrittenArtifact>,
}

impl WriteReport {
    pub fn changed(&self) -> impl Iterator<Item = &WrittenArtifact> {
        self.artifacts.iter().filter(|a| a.changed)
    }

    pub fn artifact(&self, name: &str) -> Option<&WrittenArtifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ManifestWriter {
    out_dir: PathBuf,
}

impl ManifestWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write all five application artifacts.
    pub fn write(&self, compiled: &CompiledDeployment) -> DeployResult<WriteReport> {
        let manifest_yaml = compiled
            .manifest
            .to_yaml()
            .map_err(|e| DeployError::manifest_write(self.out_dir.join(APP_MANIFEST), e))?;
        let essyncer = self.to_json(ESSYNCER_MANIFEST, &compiled.aggregates.essyncer)?;
        let permissions = self.to_json(PERMISSION_MANIFEST, &compiled.aggregates.permissions)?;

        let mut report = WriteReport::default();
        for (name, content) in [
            (APP_MANIFEST, manifest_yaml.as_str()),
            (PROXY_CONFIG, compiled.proxy_config.as_str()),
            (BOOTSTRAP_SCRIPT, compiled.bootstrap_script.as_str()),
            (ESSYNCER_MANIFEST, essyncer.as_str()),
            (PERMISSION_MANIFEST, permissions.as_str()),
        ] {
            report.artifacts.push(self.write_artifact(name, content)?);
        }

        info!(
            dir = %self.out_dir.display(),
            changed = report.changed().count(),
            "artifacts written"
        );
        Ok(report)
    }

    /// Write one named artifact, skipping the write when unchanged.
    pub fn write_artifact(&self, name: &str, content: &str) -> DeployResult<WrittenArtifact> {
        let path = self.out_dir.join(name);
        let changed = write_if_changed(&path, content.as_bytes())
            .map_err(|e| DeployError::manifest_write(&path, e))?;
        debug!(artifact = name, changed, "artifact");
        Ok(WrittenArtifact {
            name: name.to_string(),
            path,
            changed,
        })
    }

    fn to_json<T: Serialize>(&self, name: &str, value: &T) -> DeployResult<String> {
        let mut json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name}"))
            .map_err(|e| DeployError::manifest_write(self.out_dir.join(name), e))?;
        json.push('\n');
        Ok(json)
    }
}

fn write_if_changed(path: &Path, content: &[u8]) -> anyhow::Result<bool> {
    if path.exists() {
        let existing = std::fs::read(path)
            .with_context(|| format!("Failed to read existing artifact: {}", path.display()))?;
        if blake3::hash(&existing) == blake3::hash(content) {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    Ok(true)
}
