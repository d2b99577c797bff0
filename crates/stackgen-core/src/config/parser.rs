//! JSON parser with helpful error messages

use super::schema::TenantConfiguration;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse configs.json with detailed error messages
pub fn parse_config(path: &Path) -> Result<TenantConfiguration> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse configs.json content from string
pub fn parse_config_str(content: &str) -> Result<TenantConfiguration> {
    let config: TenantConfiguration =
        serde_json::from_str(content).map_err(|e| enhance_json_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Attach the offending lines to a serde_json error
fn enhance_json_error(error: serde_json::Error, content: &str) -> anyhow::Error {
    let line_num = error.line();
    if line_num == 0 {
        return anyhow::anyhow!("JSON parsing error: {}", error);
    }

    let context = get_line_context(content, line_num);
    anyhow::anyhow!(
        "JSON parsing error at line {}, column {}:\n{}\n\nError: {}",
        line_num,
        error.column(),
        context,
        error
    )
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to pretty JSON with a trailing newline
pub fn to_json(config: &TenantConfiguration) -> Result<String> {
    let mut content = serde_json::to_string_pretty(config)
        .context("Failed to serialize configuration to JSON")?;
    content.push('\n');
    Ok(content)
}
