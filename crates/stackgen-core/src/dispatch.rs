//! Targeted update, restart and removal of running services.
//!
//! A batch never aborts on a single bad name: unknown names and failed
//! runtime commands become per-item outcomes and the loop moves on. Only
//! asset synchronisation failures are fatal.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::PluginCatalog;
use crate::config::{PluginDescriptor, TenantConfiguration};
use crate::context::RuntimeDefaults;
use crate::error::DeployResult;
use crate::manifest::ServiceBlockBuilder;
use crate::manifest::services::{COREUI_SERVICE, GATEWAY_SERVICE};
use crate::runtime::ServiceRuntime;

/// Re-stages one plugin's UI assets.
pub trait UiSync {
    fn sync_plugin_ui(
        &self,
        config: &TenantConfiguration,
        plugin: &PluginDescriptor,
    ) -> DeployResult<()>;

    /// Catalog consulted for plugins without an inline UI declaration.
    fn ui_catalog(&self, _config: &TenantConfiguration) -> PluginCatalog {
        PluginCatalog::new()
    }
}

/// Running service and image repository behind a platform alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    entries: BTreeMap<String, RouteTarget>,
}

impl RoutingTable {
    /// Built-in platform aliases.
    pub fn platform_defaults() -> Self {
        let entries = [
            ("coreui", "coreui", "coreui"),
            ("core", "plugin-core-api", "core"),
            ("workers", "plugin-workers-api", "workers"),
            ("gateway", "gateway", "gateway"),
            ("crons", "crons", "crons"),
            ("widgets", "widgets", "widgets"),
            ("dashboard", "dashboard-api", "dashboard-api"),
            ("essyncer", "essyncer", "essyncer"),
        ]
        .into_iter()
        .map(|(alias, service, image)| {
            (
                alias.to_string(),
                RouteTarget {
                    service: service.to_string(),
                    image: image.to_string(),
                },
            )
        })
        .collect();
        Self { entries }
    }

    /// Built-in aliases extended, and possibly overridden, by the tenant's
    /// `service_aliases`.
    pub fn from_config(config: &TenantConfiguration) -> Self {
        let mut table = Self::platform_defaults();
        for (alias, target) in &config.service_aliases {
            table.entries.insert(
                alias.clone(),
                RouteTarget {
                    service: target.service.clone(),
                    image: target.image.clone(),
                },
            );
        }
        table
    }

    pub fn lookup(&self, name: &str) -> Option<&RouteTarget> {
        self.entries.get(name)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub skip_image: bool,
    pub sync_ui: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Updated { image: String },
    ImageSkipped,
    Restarted,
    Removed,
    NotFound,
    Failed { message: String },
}

impl ItemStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NotFound | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    /// Name as requested
    pub name: String,
    /// Manifest service it resolved to, if any
    pub service: Option<String>,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub items: Vec<ItemOutcome>,
    /// Restarts issued after the batch
    pub restarts: Vec<ItemOutcome>,
    pub ui_synced: Vec<String>,
}

impl UpdateReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items
            .iter()
            .chain(self.restarts.iter())
            .filter(|item| item.status.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

enum Resolved<'c> {
    Platform { alias: String, target: RouteTarget },
    Plugin(&'c PluginDescriptor),
}

impl Resolved<'_> {
    fn service(&self) -> String {
        match self {
            Self::Platform { target, .. } => target.service.clone(),
            Self::Plugin(plugin) => plugin.service_name(),
        }
    }
}

pub struct UpdateDispatcher<'a, R> {
    config: &'a TenantConfiguration,
    builder: ServiceBlockBuilder<'a>,
    routes: RoutingTable,
    runtime: &'a R,
    ui_sync: Option<&'a dyn UiSync>,
}

impl<'a, R: ServiceRuntime> UpdateDispatcher<'a, R> {
    pub fn new(config: &'a TenantConfiguration, defaults: &'a RuntimeDefaults, runtime: &'a R) -> Self {
        Self {
            config,
            builder: ServiceBlockBuilder::new(config, defaults),
            routes: RoutingTable::from_config(config),
            runtime,
            ui_sync: None,
        }
    }

    pub fn with_ui_sync(mut self, ui_sync: &'a dyn UiSync) -> Self {
        self.ui_sync = Some(ui_sync);
        self
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Update each named service in order, then restart the aggregator UI
    /// (once, when UI was resynced) and the gateway (always).
    pub fn apply(&self, names: &[String], options: UpdateOptions) -> DeployResult<UpdateReport> {
        let mut report = UpdateReport::default();
        let mut catalog: Option<PluginCatalog> = None;

        for name in names {
            let Some(resolved) = self.resolve(name) else {
                report.items.push(not_found(name));
                continue;
            };
            let service = resolved.service();

            let status = if options.skip_image {
                ItemStatus::ImageSkipped
            } else {
                let image = self.image_for(&resolved);
                info!(name = %name, service = %service, image = %image, "updating service image");
                match self.runtime.update_image(&service, &image) {
                    Ok(()) => ItemStatus::Updated { image },
                    Err(e) => {
                        error!(name = %name, service = %service, error = %e, "image update failed");
                        ItemStatus::Failed {
                            message: format!("{e:#}"),
                        }
                    }
                }
            };

            if options.sync_ui
                && !status.is_failure()
                && let Resolved::Plugin(plugin) = &resolved
            {
                match self.ui_sync {
                    Some(sync) => {
                        let declared = plugin.ui_location.is_some()
                            || plugin.metadata.ui.is_some()
                            || catalog
                                .get_or_insert_with(|| sync.ui_catalog(self.config))
                                .declares_ui(plugin);
                        if declared {
                            sync.sync_plugin_ui(self.config, plugin)?;
                            report.ui_synced.push(plugin.name.clone());
                        } else {
                            debug!(plugin = %plugin.name, "no UI declared, skipping resync");
                        }
                    }
                    None => warn!(plugin = %plugin.name, "UI resync requested without an asset source"),
                }
            }

            report.items.push(ItemOutcome {
                name: name.clone(),
                service: Some(service),
                status,
            });
        }

        if options.sync_ui {
            report.restarts.push(self.restart_service(COREUI_SERVICE, COREUI_SERVICE));
        }
        report.restarts.push(self.restart_service(GATEWAY_SERVICE, GATEWAY_SERVICE));

        Ok(report)
    }

    /// Force-restart one named service.
    pub fn restart(&self, name: &str) -> UpdateReport {
        let mut report = UpdateReport::default();
        let item = match self.resolve(name) {
            Some(resolved) => self.restart_service(name, &resolved.service()),
            None => not_found(name),
        };
        report.items.push(item);
        report
    }

    /// Remove one named service from the running stack.
    pub fn remove(&self, name: &str) -> UpdateReport {
        let mut report = UpdateReport::default();
        let item = match self.resolve(name) {
            Some(resolved) => {
                let service = resolved.service();
                info!(name = %name, service = %service, "removing service");
                let status = match self.runtime.remove(&service) {
                    Ok(()) => ItemStatus::Removed,
                    Err(e) => {
                        error!(name = %name, service = %service, error = %e, "remove failed");
                        ItemStatus::Failed {
                            message: format!("{e:#}"),
                        }
                    }
                };
                ItemOutcome {
                    name: name.to_string(),
                    service: Some(service),
                    status,
                }
            }
            None => not_found(name),
        };
        report.items.push(item);
        report
    }

    /// Manifest service name a request resolves to, if any.
    pub fn service_for(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|r| r.service())
    }

    fn resolve(&self, name: &str) -> Option<Resolved<'a>> {
        if let Some(target) = self.routes.lookup(name) {
            return Some(Resolved::Platform {
                alias: name.to_string(),
                target: target.clone(),
            });
        }
        self.config.plugin(name).map(Resolved::Plugin)
    }

    fn image_for(&self, resolved: &Resolved<'_>) -> String {
        match resolved {
            Resolved::Platform { alias, target } => self.builder.platform_image(alias, &target.image),
            Resolved::Plugin(plugin) => self.builder.plugin_image(plugin),
        }
    }

    fn restart_service(&self, name: &str, service: &str) -> ItemOutcome {
        info!(service = %service, "restarting service");
        let status = match self.runtime.force_restart(service) {
            Ok(()) => ItemStatus::Restarted,
            Err(e) => {
                error!(service = %service, error = %e, "restart failed");
                ItemStatus::Failed {
                    message: format!("{e:#}"),
                }
            }
        };
        ItemOutcome {
            name: name.to_string(),
            service: Some(service.to_string()),
            status,
        }
    }
}

fn not_found(name: &str) -> ItemOutcome {
    error!(name = %name, "no platform service or plugin with this name");
    ItemOutcome {
        name: name.to_string(),
        service: None,
        status: ItemStatus::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;

    use crate::catalog::PluginMetadata;
    use crate::config::{ServiceAlias, ServiceOverride};
    use crate::error::DeployError;

    #[derive(Default)]
    struct RecordingRuntime {
        calls: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingRuntime {
        fn record(&self, call: String, service: &str) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(call);
            if self.fail_on.as_deref() == Some(service) {
                anyhow::bail!("service {service} not found");
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
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
        fn apply_stack(&self, _manifest: &Path) -> anyhow::Result<()> {
            Ok(())
        }
        fn exec(&self, _service: &str, _args: &[String]) -> anyhow::Result<String> {
            Ok(String::new())
        }
        fn copy_out(&self, _service: &str, _source: &str, _dest: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        synced: RefCell<Vec<String>>,
        fail: bool,
        catalog: PluginCatalog,
    }

    impl UiSync for RecordingUi {
        fn sync_plugin_ui(
            &self,
            _config: &TenantConfiguration,
            plugin: &PluginDescriptor,
        ) -> DeployResult<()> {
            if self.fail {
                return Err(DeployError::asset_fetch(
                    "https://plugins-dev.s3.amazonaws.com/uis/x",
                    anyhow::anyhow!("timeout"),
                ));
            }
            self.synced.borrow_mut().push(plugin.name.clone());
            Ok(())
        }

        fn ui_catalog(&self, _config: &TenantConfiguration) -> PluginCatalog {
            self.catalog.clone()
        }
    }

    fn config() -> TenantConfiguration {
        let mut sales = PluginDescriptor::new("sales");
        sales.image_tag = Some("3.1.0".to_string());
        TenantConfiguration {
            domain: "https://acme.example".to_string(),
            image_tag: Some("2.0.0".to_string()),
            gateway: Some(ServiceOverride {
                image_tag: Some("2.0.1".to_string()),
                ..Default::default()
            }),
            plugins: vec![sales, PluginDescriptor::new("tickets")],
            ..Default::default()
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_name_does_not_stop_the_batch() {
        let cfg = config();
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime);

        let report = dispatcher
            .apply(&names(&["sales", "nope", "tickets"]), UpdateOptions::default())
            .unwrap();

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.items[1].status, ItemStatus::NotFound);
        assert_eq!(
            runtime.calls(),
            vec![
                "update plugin-sales-api stackgen/plugin-sales-api:3.1.0".to_string(),
                "update plugin-tickets-api stackgen/plugin-tickets-api:2.0.0".to_string(),
                "restart gateway".to_string(),
            ]
        );
    }

    #[test]
    fn platform_aliases_resolve_tag_through_override_block() {
        let cfg = config();
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime);

        dispatcher
            .apply(&names(&["gateway", "dashboard"]), UpdateOptions::default())
            .unwrap();

        let calls = runtime.calls();
        assert_eq!(calls[0], "update gateway stackgen/gateway:2.0.1");
        assert_eq!(calls[1], "update dashboard-api stackgen/dashboard-api:2.0.0");
    }

    #[test]
    fn ui_sync_restarts_aggregator_once_and_gateway_always() {
        let mut cfg = config();
        cfg.plugins[0].metadata.ui = Some(serde_json::Map::new());
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let mut ui = RecordingUi::default();
        ui.catalog.insert(
            "tickets",
            PluginMetadata {
                ui: Some(serde_json::Map::new()),
                ..Default::default()
            },
        );
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime).with_ui_sync(&ui);

        let report = dispatcher
            .apply(
                &names(&["sales", "tickets", "crons"]),
                UpdateOptions {
                    skip_image: true,
                    sync_ui: true,
                },
            )
            .unwrap();

        assert_eq!(*ui.synced.borrow(), vec!["sales".to_string(), "tickets".to_string()]);
        assert_eq!(report.ui_synced.len(), 2);
        assert_eq!(
            runtime.calls(),
            vec!["restart coreui".to_string(), "restart gateway".to_string()]
        );
        assert!(report.items.iter().all(|i| i.status == ItemStatus::ImageSkipped));
    }

    #[test]
    fn runtime_failure_is_a_per_item_outcome() {
        let cfg = config();
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime {
            fail_on: Some("plugin-sales-api".to_string()),
            ..Default::default()
        };
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime);

        let report = dispatcher
            .apply(&names(&["sales", "tickets"]), UpdateOptions::default())
            .unwrap();
        assert!(matches!(report.items[0].status, ItemStatus::Failed { .. }));
        assert!(matches!(report.items[1].status, ItemStatus::Updated { .. }));
        assert_eq!(report.restarts[0].status, ItemStatus::Restarted);
    }

    #[test]
    fn ui_sync_failure_is_fatal() {
        let mut cfg = config();
        cfg.plugins[0].ui_location = Some("https://cdn.acme.example/sales.zip".to_string());
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let ui = RecordingUi {
            fail: true,
            ..Default::default()
        };
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime).with_ui_sync(&ui);

        let result = dispatcher.apply(
            &names(&["sales"]),
            UpdateOptions {
                skip_image: false,
                sync_ui: true,
            },
        );
        assert!(matches!(result, Err(DeployError::AssetFetch { .. })));
    }

    #[test]
    fn headless_plugin_is_skipped_by_ui_resync() {
        let mut cfg = config();
        cfg.plugins[0].metadata.ui = Some(serde_json::Map::new());
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let ui = RecordingUi::default();
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime).with_ui_sync(&ui);

        let report = dispatcher
            .apply(
                &names(&["sales", "tickets"]),
                UpdateOptions {
                    skip_image: false,
                    sync_ui: true,
                },
            )
            .unwrap();

        assert_eq!(report.ui_synced, vec!["sales".to_string()]);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(
            runtime.calls(),
            vec![
                "update plugin-sales-api stackgen/plugin-sales-api:3.1.0".to_string(),
                "update plugin-tickets-api stackgen/plugin-tickets-api:2.0.0".to_string(),
                "restart coreui".to_string(),
                "restart gateway".to_string(),
            ]
        );
    }

    #[test]
    fn headless_batch_never_touches_a_failing_asset_source() {
        let cfg = config();
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let ui = RecordingUi {
            fail: true,
            ..Default::default()
        };
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime).with_ui_sync(&ui);

        let report = dispatcher
            .apply(
                &names(&["sales", "tickets"]),
                UpdateOptions {
                    skip_image: false,
                    sync_ui: true,
                },
            )
            .unwrap();

        assert!(report.ui_synced.is_empty());
        assert_eq!(runtime.calls().last().map(String::as_str), Some("restart gateway"));
    }

    #[test]
    fn configured_aliases_extend_the_routing_table() {
        let mut cfg = config();
        cfg.service_aliases.insert(
            "mobile".to_string(),
            ServiceAlias {
                service: "mobile-api".to_string(),
                image: "mobile".to_string(),
            },
        );
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime);

        assert_eq!(dispatcher.service_for("mobile").as_deref(), Some("mobile-api"));
        assert_eq!(dispatcher.service_for("dashboard").as_deref(), Some("dashboard-api"));
        assert!(dispatcher.routes().aliases().any(|a| a == "essyncer"));
    }

    #[test]
    fn restart_and_remove_report_unknown_names() {
        let cfg = config();
        let defaults = RuntimeDefaults::default();
        let runtime = RecordingRuntime::default();
        let dispatcher = UpdateDispatcher::new(&cfg, &defaults, &runtime);

        assert_eq!(dispatcher.restart("ghost").items[0].status, ItemStatus::NotFound);
        assert_eq!(dispatcher.remove("tickets").items[0].status, ItemStatus::Removed);
        assert_eq!(runtime.calls(), vec!["rm plugin-tickets-api".to_string()]);
    }
}
