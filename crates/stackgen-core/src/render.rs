//! Text artifacts: reverse-proxy configuration and the plugin bootstrap
//! script.

use anyhow::Context;

use crate::aggregate::UiBootstrapList;
use crate::config::TenantConfiguration;
use crate::context::RuntimeDefaults;

/// Headers forwarded on every proxied location; the last two allow
/// WebSocket upgrades.
const FORWARDED_HEADERS: &[(&str, &str)] = &[
    ("Host", "$host"),
    ("X-Real-IP", "$remote_addr"),
    ("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
    ("X-Forwarded-Proto", "$scheme"),
    ("Upgrade", "$http_upgrade"),
    ("Connection", "\"upgrade\""),
];

struct Location {
    path: &'static str,
    port: u16,
    upstream_path: &'static str,
    long_lived: bool,
}

/// Reverse-proxy configuration for the tenant's public host.
pub fn render_proxy_config(config: &TenantConfiguration, defaults: &RuntimeDefaults) -> String {
    let locations = [
        Location {
            path: "/",
            port: defaults.ui_port,
            upstream_path: "/",
            long_lived: false,
        },
        Location {
            path: "/widgets/",
            port: defaults.widgets_port,
            upstream_path: "/",
            long_lived: false,
        },
        Location {
            path: "/gateway/",
            port: defaults.gateway_port,
            upstream_path: "/",
            long_lived: false,
        },
        Location {
            path: "/gateway/graphql",
            port: defaults.gateway_port,
            upstream_path: "/graphql",
            long_lived: true,
        },
        Location {
            path: "/dashboard/api/",
            port: defaults.dashboard_api_port,
            upstream_path: "/",
            long_lived: false,
        },
    ];

    let mut out = String::new();
    out.push_str("server {\n");
    out.push_str("    listen 80;\n");
    out.push_str(&format!("    server_name {};\n", config.public_host()));
    out.push_str("    client_max_body_size 50M;\n");

    for location in &locations {
        out.push('\n');
        out.push_str(&format!("    location {} {{\n", location.path));
        out.push_str(&format!(
            "        proxy_pass http://127.0.0.1:{}{};\n",
            location.port, location.upstream_path
        ));
        out.push_str("        proxy_http_version 1.1;\n");
        for (header, value) in FORWARDED_HEADERS {
            out.push_str(&format!("        proxy_set_header {header} {value};\n"));
        }
        if location.long_lived {
            out.push_str("        proxy_read_timeout 3600s;\n");
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

/// `window.plugins = [...]` with the CDN host rewritten to `public_url`.
pub fn render_bootstrap_script(
    ui: &UiBootstrapList,
    cdn_host: &str,
    public_url: &str,
) -> anyhow::Result<String> {
    let literal = serde_json::to_string_pretty(ui).context("Failed to serialize UI bootstrap list")?;
    let literal = if cdn_host.is_empty() {
        literal
    } else {
        literal.replace(cdn_host.trim_end_matches('/'), public_url.trim_end_matches('/'))
    };
    Ok(format!("window.plugins = {literal};\n"))
}
