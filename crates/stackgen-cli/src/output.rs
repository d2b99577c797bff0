//! Terminal rendering of command reports.

use anyhow::Result;
use console::style;

use stackgen_core::commands::{DeployDbsReport, DeployReport, DumpReport};
use stackgen_core::config::PluginOutcome;
use stackgen_core::dispatch::{ItemOutcome, ItemStatus, UpdateReport};
use stackgen_core::writer::WrittenArtifact;

use crate::OutputFormat;

pub(crate) fn print_deploy(report: &DeployReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} {} services ({})",
        style("✓").green(),
        report.services.len(),
        report.topology
    );
    print_artifacts(&report.written.artifacts);
    if !report.ui_bundles.is_empty() {
        println!("  UI bundles: {}", report.ui_bundles.join(", "));
    }
    if report.applied {
        println!("  Stack applied");
    } else {
        println!("  {}", style("Dry run: stack not applied").yellow());
    }
    Ok(())
}

pub(crate) fn print_dbs(report: &DeployDbsReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} stateful services: {}",
        style("✓").green(),
        report.services.join(", ")
    );
    print_artifacts(&report.written);
    if report.applied {
        println!("  Stack applied");
    }
    if report.replica_set_initialized {
        println!("  Replica set initialized");
    }
    Ok(())
}

pub(crate) fn print_dump(report: &DumpReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} Dumped '{}' to {}",
        style("✓").green(),
        report.db,
        report.archive
    );
    if let Some(path) = &report.copied_to {
        println!("  Copied to {}", path.display());
    }
    Ok(())
}

/// Per-item failures are printed, never turned into an error.
pub(crate) fn print_update(report: &UpdateReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for item in report.items.iter().chain(report.restarts.iter()) {
        print_item(item);
    }
    for plugin in &report.ui_synced {
        println!("{} UI resynced: {}", style("✓").green(), plugin);
    }

    let failures = report.failures().count();
    if failures > 0 {
        println!(
            "{}",
            style(format!("{failures} item(s) failed; remaining items were processed")).yellow()
        );
    }
    Ok(())
}

pub(crate) fn print_plugin(name: &str, outcome: PluginOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "name": name, "outcome": outcome });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => match outcome {
            PluginOutcome::Changed => println!("{} Updated plugin '{}'", style("✓").green(), name),
            PluginOutcome::NoOp => println!("• Plugin '{}' unchanged", name),
        },
    }
    Ok(())
}

fn print_artifacts(artifacts: &[WrittenArtifact]) {
    for artifact in artifacts {
        let marker = if artifact.changed {
            style("changed").cyan()
        } else {
            style("unchanged").dim()
        };
        println!("  {} [{}]", artifact.path.display(), marker);
    }
}

fn print_item(item: &ItemOutcome) {
    let service = item.service.as_deref().unwrap_or("-");
    match &item.status {
        ItemStatus::Updated { image } => println!(
            "{} {} ({}) -> {}",
            style("✓").green(),
            item.name,
            service,
            image
        ),
        ItemStatus::ImageSkipped => {
            println!("• {} ({}) image unchanged", item.name, service)
        }
        ItemStatus::Restarted => println!("{} restarted {}", style("✓").green(), service),
        ItemStatus::Removed => println!("{} removed {}", style("✓").green(), service),
        ItemStatus::NotFound => println!(
            "{} {}: no platform service or plugin with this name",
            style("✗").red(),
            item.name
        ),
        ItemStatus::Failed { message } => {
            println!("{} {} ({}): {}", style("✗").red(), item.name, service, message)
        }
    }
}
