mod support;

use stackgen_core::assets::{AssetSources, AssetSync, BlockingAssetSync, HttpFetcher};
use stackgen_core::commands::{DeployCommand, DeployOptions};
use stackgen_core::context::{DeployContext, RuntimeDefaults};
use stackgen_core::error::DeployError;
use stackgen_core::writer::{APP_MANIFEST, BOOTSTRAP_SCRIPT, PROXY_CONFIG};
use tempfile::TempDir;

use support::{MapFetcher, RecordingRuntime, acme_config, context_with, zip_with};

fn fetcher_for_acme(sources: &AssetSources) -> MapFetcher {
    let catalog = r#"{
        "sales": {
            "ui": { "scope": "sales", "url": "https://plugin-uis.stackgen.io/js/plugins/plugin-sales-ui/remoteEntry.js" },
            "permissions": [{ "name": "dealsAll" }]
        }
    }"#;
    MapFetcher::default()
        .with(sources.catalog_url(None), catalog.as_bytes().to_vec())
        .with(
            sources.ui_bundle_url("sales", None, None),
            zip_with(&[
                ("remoteEntry.js", "// sales"),
                ("locales/en.json", r#"{"deals":"Deals"}"#),
            ]),
        )
        .with(
            sources.locale_pack_url(None),
            zip_with(&[("en.json", r#"{"save":"Save"}"#)]),
        )
}

#[test]
fn deploy_stages_assets_writes_artifacts_and_applies() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());

    let sources = AssetSources::default();
    let assets =
        BlockingAssetSync::new(AssetSync::new(fetcher_for_acme(&sources), sources, temp.path()))
            .unwrap();
    let runtime = RecordingRuntime::default();

    let report = DeployCommand::new(&ctx)
        .execute(&config, DeployOptions::default(), Some(&assets), &runtime)
        .unwrap();

    assert!(report.applied);
    assert_eq!(report.ui_bundles, vec!["sales".to_string()]);
    assert_eq!(report.written.artifacts.len(), 5);
    assert_eq!(runtime.calls(), vec![format!("apply {APP_MANIFEST}")]);

    let script = std::fs::read_to_string(temp.path().join(BOOTSTRAP_SCRIPT)).unwrap();
    assert!(script.contains("https://acme.example/js/plugins/plugin-sales-ui/remoteEntry.js"));

    let permissions = std::fs::read_to_string(temp.path().join("permissions.json")).unwrap();
    assert!(permissions.contains("dealsAll"));

    assert!(
        temp.path()
            .join("plugin-uis/plugin-sales-ui/remoteEntry.js")
            .exists()
    );
    let en = std::fs::read_to_string(temp.path().join("locales/en.json")).unwrap();
    assert!(en.contains("Deals"));
    assert!(en.contains("Save"));
}

#[test]
fn redeploy_reports_unchanged_artifacts() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());
    let runtime = RecordingRuntime::default();
    let command = DeployCommand::new(&ctx);
    let options = DeployOptions {
        skip_assets: true,
        dry_run: true,
    };

    let first = command
        .execute::<HttpFetcher, _>(&config, options, None, &runtime)
        .unwrap();
    let proxy_before = std::fs::read(temp.path().join(PROXY_CONFIG)).unwrap();
    let second = command
        .execute::<HttpFetcher, _>(&config, options, None, &runtime)
        .unwrap();

    assert_eq!(first.written.changed().count(), 5);
    assert_eq!(second.written.changed().count(), 0);
    assert_eq!(
        std::fs::read(temp.path().join(PROXY_CONFIG)).unwrap(),
        proxy_before
    );
    assert!(!second.applied);
    assert!(runtime.calls().is_empty());
}

#[test]
fn failed_bundle_fetch_aborts_before_writing() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());

    let sources = AssetSources::default();
    let catalog = r#"{ "sales": { "ui": {} } }"#;
    let fetcher =
        MapFetcher::default().with(sources.catalog_url(None), catalog.as_bytes().to_vec());
    let assets = BlockingAssetSync::new(AssetSync::new(fetcher, sources, temp.path())).unwrap();
    let runtime = RecordingRuntime::default();

    let err = DeployCommand::new(&ctx)
        .execute(&config, DeployOptions::default(), Some(&assets), &runtime)
        .unwrap_err();

    assert!(matches!(err, DeployError::AssetFetch { .. }));
    assert!(err.to_string().starts_with("asset fetch failed"));
    assert!(!temp.path().join(APP_MANIFEST).exists());
    assert!(runtime.calls().is_empty());
}

#[test]
fn apply_failure_is_a_runtime_error() {
    let temp = TempDir::new().unwrap();
    let config = acme_config();
    let ctx = context_with(temp.path(), &config, RuntimeDefaults::default());
    let runtime = RecordingRuntime::failing_on(APP_MANIFEST);

    let err = DeployCommand::new(&ctx)
        .execute::<HttpFetcher, _>(
            &config,
            DeployOptions {
                skip_assets: true,
                dry_run: false,
            },
            None,
            &runtime,
        )
        .unwrap_err();

    assert!(matches!(err, DeployError::Runtime { .. }));
    assert!(temp.path().join(APP_MANIFEST).exists());
}

#[test]
fn missing_config_is_a_load_failure() {
    let temp = TempDir::new().unwrap();
    let ctx = DeployContext::new(temp.path().to_path_buf(), RuntimeDefaults::default());

    let err = DeployCommand::new(&ctx)
        .run(DeployOptions {
            skip_assets: true,
            dry_run: true,
        })
        .unwrap_err();

    assert!(matches!(err, DeployError::ConfigLoad { .. }));
    assert!(err.to_string().starts_with("config load failed"));
}
