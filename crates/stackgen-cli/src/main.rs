//! stackgen - deployment manifest compiler
//!
//! Usage:
//!   stackgen deploy              # Compile, stage assets, write and apply
//!   stackgen update sales core   # Targeted image update
//!   stackgen deploy-dbs          # Stateful stack
//!   stackgen plugin install ...  # Config mutation

mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stackgen_core::commands::{
    DeployCommand, DeployDbsCommand, DeployDbsOptions, DeployOptions, DumpCommand, DumpOptions,
    ServiceCommand,
};
use stackgen_core::config::{PluginConfigService, PluginDescriptor};
use stackgen_core::context::{DeployContext, RuntimeDefaults};
use stackgen_core::dispatch::UpdateOptions;

#[derive(Parser)]
#[command(name = "stackgen")]
#[command(about = "Multi-service deployment manifest compiler", long_about = None)]
struct Cli {
    /// Working directory holding configs.json and the generated artifacts
    #[arg(long, short = 'C', global = true, default_value = ".")]
    dir: PathBuf,

    /// Tenant document outside the working directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the application stack, stage assets, write artifacts and apply
    Deploy {
        /// Reuse already-staged UI bundles and locales
        #[arg(long)]
        skip_assets: bool,
        /// Write artifacts without applying the stack
        #[arg(long)]
        dry_run: bool,
    },

    /// Update the image of one or more services or plugins
    Update {
        /// Platform aliases or plugin names
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not change images; only resync UI and restart
        #[arg(long)]
        skip_image: bool,
        /// Re-fetch UI bundles of the named plugins
        #[arg(long)]
        sync_ui: bool,
    },

    /// Force-restart one service or plugin
    Restart { name: String },

    /// Compile and apply the stateful stack
    DeployDbs {
        /// Run the replica-set bootstrap script after applying
        #[arg(long)]
        init_replica_set: bool,
        /// Write artifacts without applying the stack
        #[arg(long)]
        dry_run: bool,
    },

    /// Dump a database from the document store
    Dump {
        /// Database name (tenant default when omitted)
        #[arg(long)]
        db: Option<String>,
        /// Copy the archive to <dir>/dumps
        #[arg(long)]
        copy_out: bool,
    },

    /// Add or remove plugins in configs.json
    Plugin(PluginArgs),

    /// Remove one running service
    Remove {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args)]
struct PluginArgs {
    #[command(subcommand)]
    command: PluginSubcommand,
}

#[derive(Subcommand)]
enum PluginSubcommand {
    /// Declare a plugin
    Install {
        name: String,
        /// Image tag for this plugin only
        #[arg(long)]
        image_tag: Option<String>,
        /// Replace an existing, different definition
        #[arg(long, short)]
        force: bool,
    },
    /// Remove a plugin declaration
    #[command(alias = "rm")]
    Uninstall { name: String },
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Human-readable summary
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackgen=info,stackgen_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let defaults = RuntimeDefaults::from_env()?;
    let mut ctx = DeployContext::new(cli.dir.clone(), defaults);
    if let Some(config) = &cli.config {
        ctx = ctx.with_config_path(config.clone());
    }

    run_cli(&ctx, cli.command, cli.format)
}

fn run_cli(ctx: &DeployContext, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Deploy {
            skip_assets,
            dry_run,
        } => {
            let report = DeployCommand::new(ctx).run(DeployOptions {
                skip_assets,
                dry_run,
            })?;
            output::print_deploy(&report, format)?;
        }
        Commands::Update {
            names,
            skip_image,
            sync_ui,
        } => {
            let report =
                ServiceCommand::new(ctx).update(&names, UpdateOptions { skip_image, sync_ui })?;
            output::print_update(&report, format)?;
        }
        Commands::Restart { name } => {
            let report = ServiceCommand::new(ctx).restart(&name)?;
            output::print_update(&report, format)?;
        }
        Commands::DeployDbs {
            init_replica_set,
            dry_run,
        } => {
            let report = DeployDbsCommand::new(ctx).run(DeployDbsOptions {
                init_replica_set,
                dry_run,
            })?;
            output::print_dbs(&report, format)?;
        }
        Commands::Dump { db, copy_out } => {
            let report = DumpCommand::new(ctx).run(DumpOptions { db, copy_out })?;
            output::print_dump(&report, format)?;
        }
        Commands::Plugin(args) => run_plugin(ctx, args, format)?,
        Commands::Remove { name, yes } => run_remove(ctx, &name, yes, format)?,
    }
    Ok(())
}

fn run_plugin(ctx: &DeployContext, args: PluginArgs, format: OutputFormat) -> Result<()> {
    let service = PluginConfigService::new(ctx.config_store());
    let (name, outcome) = match args.command {
        PluginSubcommand::Install {
            name,
            image_tag,
            force,
        } => {
            let mut descriptor = PluginDescriptor::new(name.clone());
            descriptor.image_tag = image_tag;
            (name, service.install(descriptor, force)?)
        }
        PluginSubcommand::Uninstall { name } => {
            let outcome = service.uninstall(&name)?;
            (name, outcome)
        }
    };
    output::print_plugin(&name, outcome, format)
}

fn run_remove(ctx: &DeployContext, name: &str, yes: bool, format: OutputFormat) -> Result<()> {
    let command = ServiceCommand::new(ctx);

    if !yes {
        let Some(service) = command.resolve(name)? else {
            anyhow::bail!("No platform service or plugin named '{}'", name);
        };
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Remove running service '{service}'?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let report = command.remove(name)?;
    output::print_update(&report, format)
}
