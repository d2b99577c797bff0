//! Cross-plugin aggregation.
//!
//! Three independent accumulators are fed once per declared plugin, in
//! declaration order: the search-sync manifest, the permission manifest
//! and the UI bootstrap list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{CollectionRule, PluginMetadata};
use crate::config::{PluginDescriptor, TenantConfiguration};
use crate::environment::MongoUrl;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssyncerEntry {
    pub db_name: String,
    pub collections: Vec<CollectionRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EssyncerManifest {
    pub plugins: Vec<EssyncerEntry>,
}

impl EssyncerManifest {
    /// Manifest seeded with the tenant's core collections.
    pub fn seeded(config: &TenantConfiguration) -> Self {
        Self {
            plugins: vec![EssyncerEntry {
                db_name: config.default_db_name().to_string(),
                collections: core_collections(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionManifest(pub Vec<Value>);

/// Plugin UI descriptors in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiBootstrapList(pub Vec<Map<String, Value>>);

impl UiBootstrapList {
    pub fn names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub essyncer: EssyncerManifest,
    pub permissions: PermissionManifest,
    pub ui: UiBootstrapList,
}

#[derive(Debug)]
pub struct AggregationEngine {
    default_db_name: String,
    essyncer: EssyncerManifest,
    permissions: PermissionManifest,
    ui: UiBootstrapList,
}

impl AggregationEngine {
    pub fn new(config: &TenantConfiguration) -> Self {
        Self {
            default_db_name: config.default_db_name().to_string(),
            essyncer: EssyncerManifest::seeded(config),
            permissions: PermissionManifest::default(),
            ui: UiBootstrapList::default(),
        }
    }

    /// Fold one plugin's contributions.
    ///
    /// `resolved_mongo_url` is the connection string the plugin's service
    /// block actually carries.
    pub fn observe(
        &mut self,
        plugin: &PluginDescriptor,
        metadata: &PluginMetadata,
        resolved_mongo_url: Option<&str>,
    ) {
        if let Some(collections) = &metadata.essyncer
            && !collections.is_empty()
        {
            let db_name = resolved_mongo_url
                .and_then(MongoUrl::database_from)
                .unwrap_or_else(|| self.default_db_name.clone());
            tracing::debug!(plugin = %plugin.name, db_name = %db_name, "adding search-sync collections");
            self.essyncer.plugins.push(EssyncerEntry {
                db_name,
                collections: collections.clone(),
            });
        }

        match &metadata.permissions {
            Some(Value::Array(items)) => self.permissions.0.extend(items.iter().cloned()),
            Some(Value::Null) | None => {}
            Some(block) => self.permissions.0.push(block.clone()),
        }

        if let Some(ui) = &metadata.ui {
            let mut entry = Map::new();
            entry.insert("name".to_string(), Value::String(plugin.name.clone()));
            entry.extend(ui.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.ui.0.push(entry);
        }
    }

    pub fn finish(self) -> Aggregates {
        Aggregates {
            essyncer: self.essyncer,
            permissions: self.permissions,
            ui: self.ui,
        }
    }
}

fn rule(name: &str, schema: &str, script: Option<&str>) -> CollectionRule {
    CollectionRule {
        name: name.to_string(),
        schema: schema.to_string(),
        script: script.map(str::to_string),
    }
}

/// Core entity collections mirrored for every tenant.
fn core_collections() -> Vec<CollectionRule> {
    vec![
        rule("conformities", "{}", None),
        rule(
            "customers",
            r#"{ "email": { "type": "keyword" }, "primaryEmail": { "type": "keyword" }, "primaryPhone": { "type": "keyword" }, "integrationId": { "type": "keyword" }, "state": { "type": "keyword" }, "createdAt": { "type": "date" }, "modifiedAt": { "type": "date" } }"#,
            Some("if (ns.startsWith('customers')) { delete doc.trackedData; }"),
        ),
        rule(
            "companies",
            r#"{ "primaryName": { "type": "text" }, "industry": { "type": "keyword" }, "createdAt": { "type": "date" } }"#,
            None,
        ),
        rule(
            "users",
            r#"{ "email": { "type": "keyword" }, "username": { "type": "keyword" } }"#,
            None,
        ),
        rule(
            "segments",
            r#"{ "contentType": { "type": "keyword" } }"#,
            None,
        ),
    ]
}
