#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use stackgen_core::assets::Fetch;
use stackgen_core::config::{
    ConfigStore, MongoCredentials, PluginDescriptor, RabbitmqCredentials, TenantConfiguration,
};
use stackgen_core::context::{DeployContext, RuntimeDefaults};
use stackgen_core::runtime::ServiceRuntime;

/// Tenant used across scenarios: two plugins, the second with three replicas.
pub fn acme_config() -> TenantConfiguration {
    let mut tickets = PluginDescriptor::new("tickets");
    tickets.replicas = Some(3);
    TenantConfiguration {
        domain: "https://acme.example".to_string(),
        db_name: Some("acme".to_string()),
        mongo: MongoCredentials {
            username: Some("admin".to_string()),
            password: Some("s3cret".to_string()),
            replication: false,
        },
        rabbitmq: RabbitmqCredentials {
            user: Some("guest".to_string()),
            pass: Some("guest".to_string()),
            ..Default::default()
        },
        plugins: vec![PluginDescriptor::new("sales"), tickets],
        ..Default::default()
    }
}

/// Save `config` as configs.json in `dir` and return a context for it.
pub fn context_with(dir: &Path, config: &TenantConfiguration, defaults: RuntimeDefaults) -> DeployContext {
    let ctx = DeployContext::new(dir.to_path_buf(), defaults);
    ConfigStore::new(ctx.config_path()).save(config).unwrap();
    ctx
}

pub fn zip_with(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// Serves canned bodies by exact URL and records every request.
#[derive(Default)]
pub struct MapFetcher {
    pub responses: HashMap<String, Vec<u8>>,
    pub requested: std::sync::Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn with(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.responses.insert(url.into(), body);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetch for MapFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Failed to download: HTTP 404 Not Found from {url}"))
    }
}

/// Records runtime calls; `fail_on` makes every call for that service fail.
#[derive(Default)]
pub struct RecordingRuntime {
    pub calls: RefCell<Vec<String>>,
    pub fail_on: Option<String>,
    pub exec_output: String,
}

impl RecordingRuntime {
    pub fn failing_on(service: &str) -> Self {
        Self {
            fail_on: Some(service.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String, service: &str) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_on.as_deref() == Some(service) {
            anyhow::bail!("Docker command failed: service {service} not found");
        }
        Ok(())
    }
}

impl ServiceRuntime for RecordingRuntime {
    fn update_image(&self, service: &str, image: &str) -> anyhow::Result<()> {
        self.record(format!("update {service} {image}"), service)
    }

    fn force_restart(&self, service: &str) -> anyhow::Result<()> {
        self.record(format!("restart {service}"), service)
    }

    fn remove(&self, service: &str) -> anyhow::Result<()> {
        self.record(format!("rm {service}"), service)
    }

    fn apply_stack(&self, manifest: &Path) -> anyhow::Result<()> {
        let name = manifest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.record(format!("apply {name}"), &name)
    }

    fn exec(&self, service: &str, args: &[String]) -> anyhow::Result<String> {
        self.record(format!("exec {service} {}", args.join(" ")), service)?;
        Ok(self.exec_output.clone())
    }

    fn copy_out(&self, service: &str, source: &str, dest: &Path) -> anyhow::Result<()> {
        self.record(format!("cp {service}:{source} {}", dest.display()), service)
    }
}
