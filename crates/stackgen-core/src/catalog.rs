//! Plugin metadata catalog
//!
//! Plugins declare their UI descriptor, search-sync collections and
//! permission block in a catalog document keyed by plugin name. The same
//! fields may be given inline on a plugin descriptor, in which case the
//! inline value wins.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PluginDescriptor;

/// Catalog file name inside an asset bucket
pub const CATALOG_FILE: &str = "plugins-catalog.json";

/// Search-sync rule for one document-store collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRule {
    pub name: String,

    /// Index mapping, kept as an opaque JSON string
    #[serde(default = "empty_schema")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

fn empty_schema() -> String {
    "{}".to_string()
}

impl CollectionRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: empty_schema(),
            script: None,
        }
    }
}

/// What a plugin contributes beyond its service block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// UI descriptor rendered into the browser bootstrap script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<serde_json::Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essyncer: Option<Vec<CollectionRule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
}

impl PluginMetadata {
    /// Field-wise overlay: `self` wins where set
    pub fn or(self, fallback: Option<&PluginMetadata>) -> PluginMetadata {
        let Some(fallback) = fallback else {
            return self;
        };
        PluginMetadata {
            ui: self.ui.or_else(|| fallback.ui.clone()),
            essyncer: self.essyncer.or_else(|| fallback.essyncer.clone()),
            permissions: self.permissions.or_else(|| fallback.permissions.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginCatalog {
    entries: BTreeMap<String, PluginMetadata>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Failed to parse plugin catalog")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plugin catalog: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse plugin catalog: {}", path.display()))
    }

    pub fn insert(&mut self, name: impl Into<String>, metadata: PluginMetadata) {
        self.entries.insert(name.into(), metadata);
    }

    pub fn get(&self, name: &str) -> Option<&PluginMetadata> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effective metadata for a declared plugin
    pub fn metadata_for(&self, plugin: &PluginDescriptor) -> PluginMetadata {
        plugin.metadata.clone().or(self.get(&plugin.name))
    }

    /// Whether a plugin ships a UI bundle: explicit location, inline UI
    /// metadata, or a catalog UI entry.
    pub fn declares_ui(&self, plugin: &PluginDescriptor) -> bool {
        plugin.ui_location.is_some()
            || plugin.metadata.ui.is_some()
            || self.get(&plugin.name).is_some_and(|m| m.ui.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_metadata_overrides_catalog_per_field() {
        let mut catalog = PluginCatalog::new();
        catalog.insert(
            "sales",
            PluginMetadata {
                ui: Some(serde_json::Map::new()),
                essyncer: Some(vec![CollectionRule::new("deals")]),
                permissions: Some(serde_json::json!([{ "name": "catalog" }])),
            },
        );

        let mut plugin = PluginDescriptor::new("sales");
        plugin.metadata.permissions = Some(serde_json::json!([{ "name": "inline" }]));

        let merged = catalog.metadata_for(&plugin);
        assert_eq!(merged.permissions, Some(serde_json::json!([{ "name": "inline" }])));
        assert_eq!(merged.essyncer.unwrap()[0].name, "deals");
        assert!(merged.ui.is_some());
    }

    #[test]
    fn unknown_plugin_keeps_inline_metadata_only() {
        let catalog = PluginCatalog::new();
        let plugin = PluginDescriptor::new("tickets");
        assert_eq!(catalog.metadata_for(&plugin), PluginMetadata::default());
    }

    #[test]
    fn ui_declaration_from_any_source() {
        let mut catalog = PluginCatalog::new();
        catalog.insert(
            "sales",
            PluginMetadata {
                ui: Some(serde_json::Map::new()),
                ..Default::default()
            },
        );

        assert!(catalog.declares_ui(&PluginDescriptor::new("sales")));
        assert!(!catalog.declares_ui(&PluginDescriptor::new("tickets")));

        let mut located = PluginDescriptor::new("tickets");
        located.ui_location = Some("https://cdn.acme.example/tickets.zip".to_string());
        assert!(catalog.declares_ui(&located));
    }

    #[test]
    fn parses_catalog_document() {
        let catalog = PluginCatalog::from_json(
            r#"{
                "sales": { "essyncer": [{ "name": "deals" }] },
                "tickets": { "ui": { "scope": "tickets" } }
            }"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let deals = &catalog.get("sales").unwrap().essyncer.as_ref().unwrap()[0];
        assert_eq!(deals.schema, "{}");
        assert!(deals.script.is_none());
    }
}
