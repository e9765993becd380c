//! plotmaster CLI — the main entry point.
//!
//! Commands:
//! - `plan`    — Plan one message through the generation pipeline
//! - `tables`  — Print a memory-table export as the planner sees it
//! - `config`  — Show, initialize, or locate the settings file
//! - `preset`  — List or switch prompt presets

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "plotmaster",
    about = "plotmaster — plot-planning middleware for roleplay chats",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to ~/.plotmaster/settings.toml)
    #[arg(long, global = true, env = "PLOTMASTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a message and print the enriched text
    Plan(commands::plan::PlanArgs),

    /// Format a memory-table export (JSON)
    Tables {
        /// Path to the export file
        path: PathBuf,
    },

    /// Manage the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage prompt presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Write a default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the settings file path
    Path,
}

#[derive(Subcommand)]
enum PresetAction {
    /// List saved presets
    List,

    /// Make a preset the active one and load it into the global settings
    Use {
        /// Preset name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli
        .config
        .unwrap_or_else(plotmaster_config::Settings::default_path);

    match cli.command {
        Commands::Plan(args) => commands::plan::run(&settings_path, args).await?,
        Commands::Tables { path } => commands::tables::run(&path)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&settings_path)?,
            ConfigAction::Init { force } => commands::config_cmd::init(&settings_path, force)?,
            ConfigAction::Path => commands::config_cmd::path(&settings_path),
        },
        Commands::Preset { action } => match action {
            PresetAction::List => commands::preset::list(&settings_path)?,
            PresetAction::Use { name } => commands::preset::use_preset(&settings_path, &name)?,
        },
    }

    Ok(())
}
