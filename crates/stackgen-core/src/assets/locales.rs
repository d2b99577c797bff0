//! Locale pack merge.
//!
//! For a file present in both the global pack and a plugin pack, the
//! plugin's keys win (shallow object merge). Files present on one side only
//! pass through unchanged.

use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Value};

/// Shallow merge; keys from `plugin` override keys from `global`.
pub fn merge_locale_maps(mut global: Map<String, Value>, plugin: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in plugin {
        global.insert(key, value);
    }
    global
}

/// Merge every `*.json` file of `plugin_dir` into `global_dir`.
///
/// Returns the number of files written.
pub fn merge_locale_dir(global_dir: &Path, plugin_dir: &Path) -> anyhow::Result<usize> {
    if !plugin_dir.is_dir() {
        return Ok(0);
    }
    std::fs::create_dir_all(global_dir)
        .with_context(|| format!("Failed to create locale directory: {}", global_dir.display()))?;

    let mut entries: Vec<_> = std::fs::read_dir(plugin_dir)
        .with_context(|| format!("Failed to read directory: {}", plugin_dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", plugin_dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    let mut written = 0;
    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let target = global_dir.join(entry.file_name());

        if !target.exists() {
            std::fs::copy(&path, &target).with_context(|| {
                format!("Failed to copy {} to {}", path.display(), target.display())
            })?;
            written += 1;
            continue;
        }

        let merged = merge_locale_maps(read_object(&target)?, read_object(&path)?);
        let content = serde_json::to_string_pretty(&Value::Object(merged))
            .context("Failed to serialize merged locale file")?;
        std::fs::write(&target, content)
            .with_context(|| format!("Failed to write locale file: {}", target.display()))?;
        written += 1;
    }

    Ok(written)
}

fn read_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read locale file: {}", path.display()))?;
    match serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse locale file: {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Locale file is not a JSON object: {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn plugin_keys_win_and_one_sided_keys_survive() {
        let global = object(json!({ "save": "Save", "cancel": "Cancel" }));
        let plugin = object(json!({ "save": "Store", "deal": "Deal" }));

        let merged = merge_locale_maps(global, plugin);
        assert_eq!(merged["save"], "Store");
        assert_eq!(merged["cancel"], "Cancel");
        assert_eq!(merged["deal"], "Deal");
    }

    #[test]
    fn merge_dir_passes_through_one_sided_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let global = temp.path().join("locales");
        let plugin = temp.path().join("plugin").join("locales");
        std::fs::create_dir_all(&global).unwrap();
        std::fs::create_dir_all(&plugin).unwrap();

        std::fs::write(global.join("en.json"), r#"{"save":"Save","cancel":"Cancel"}"#).unwrap();
        std::fs::write(global.join("fr.json"), r#"{"save":"Enregistrer"}"#).unwrap();
        std::fs::write(plugin.join("en.json"), r#"{"save":"Store"}"#).unwrap();
        std::fs::write(plugin.join("mn.json"), r#"{"save":"Хадгалах"}"#).unwrap();

        let written = merge_locale_dir(&global, &plugin).unwrap();
        assert_eq!(written, 2);

        let en: Value =
            serde_json::from_str(&std::fs::read_to_string(global.join("en.json")).unwrap())
                .unwrap();
        assert_eq!(en["save"], "Store");
        assert_eq!(en["cancel"], "Cancel");

        let fr = std::fs::read_to_string(global.join("fr.json")).unwrap();
        assert_eq!(fr, r#"{"save":"Enregistrer"}"#);
        assert!(global.join("mn.json").exists());
    }

    #[test]
    fn missing_plugin_dir_is_a_no_op() {
        let temp = tempfile::TempDir::new().unwrap();
        let written = merge_locale_dir(temp.path(), &temp.path().join("absent")).unwrap();
        assert_eq!(written, 0);
    }
}
