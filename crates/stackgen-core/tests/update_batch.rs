mod support;

use stackgen_core::assets::{AssetSources, AssetSync, BlockingAssetSync};
use stackgen_core::commands::ServiceCommand;
use stackgen_core::context::RuntimeDefaults;
use stackgen_core::dispatch::{ItemStatus, UpdateOptions};
use stackgen_core::topology::DeploymentTopology;
use tempfile::TempDir;

use support::{MapFetcher, RecordingRuntime, acme_config, context_with};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn one_unknown_name_among_valid_ones() {
    let temp = TempDir::new().unwrap();
    let mut config = acme_config();
    config.image_tag = Some("2.4.0".to_string());
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());
    let runtime = RecordingRuntime::default();

    let report = ServiceCommand::new(&ctx)
        .update_with(
            &config,
            &names(&["sales", "marketing", "tickets", "core"]),
            UpdateOptions::default(),
            &runtime,
            None,
        )
        .unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "marketing");
    assert_eq!(failures[0].status, ItemStatus::NotFound);

    assert_eq!(
        runtime.calls(),
        vec![
            "update plugin-sales-api stackgen/plugin-sales-api:2.4.0",
            "update plugin-tickets-api stackgen/plugin-tickets-api:2.4.0",
            "update plugin-core-api stackgen/core:2.4.0",
            "restart gateway",
        ]
    );
}

#[test]
fn failing_runtime_command_keeps_the_batch_going() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());
    let runtime = RecordingRuntime::failing_on("plugin-sales-api");

    let report = ServiceCommand::new(&ctx)
        .update_with(
            &config,
            &names(&["sales", "tickets"]),
            UpdateOptions::default(),
            &runtime,
            None,
        )
        .unwrap();

    assert!(report.has_failures());
    assert!(matches!(report.items[0].status, ItemStatus::Failed { .. }));
    assert!(matches!(report.items[1].status, ItemStatus::Updated { .. }));
    assert_eq!(report.restarts.len(), 1);
}

#[test]
fn skip_image_still_restarts_gateway() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let defaults = RuntimeDefaults::default().with_topology(DeploymentTopology::SingleNode);
    let ctx = context_with(temp.path(), &config, defaults);
    let runtime = RecordingRuntime::default();

    let report = ServiceCommand::new(&ctx)
        .update_with(
            &config,
            &names(&["gateway"]),
            UpdateOptions {
                skip_image: true,
                sync_ui: false,
            },
            &runtime,
            None,
        )
        .unwrap();

    assert_eq!(report.items[0].status, ItemStatus::ImageSkipped);
    assert_eq!(runtime.calls(), vec!["restart gateway"]);
}

#[test]
fn ui_resync_skips_plugins_without_ui_and_still_restarts_gateway() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());
    let runtime = RecordingRuntime::default();
    let assets = BlockingAssetSync::new(AssetSync::new(
        MapFetcher::default(),
        AssetSources::default(),
        temp.path(),
    ))
    .unwrap();

    let report = ServiceCommand::new(&ctx)
        .update_with(
            &config,
            &names(&["sales", "tickets"]),
            UpdateOptions {
                skip_image: false,
                sync_ui: true,
            },
            &runtime,
            Some(&assets),
        )
        .unwrap();

    assert!(report.ui_synced.is_empty());
    assert!(!report.has_failures());
    let calls = runtime.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2], "restart coreui");
    assert_eq!(calls[3], "restart gateway");
    assert!(!temp.path().join("plugin-uis").exists());
}
