use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod config;
mod progress;

use crate::config::AppConfig;
use crate::progress::StderrProgressReporter;
use modgraph_lib::storage::JsonFileStore;
use modgraph_lib::AnalysisService;

/// Dependency and conflict analysis for Minecraft modpacks
#[derive(Parser, Debug)]
#[command(
    name = "modgraph",
    version,
    about = "Analyze a modpack directory for dependency problems"
)]
pub struct Cli {
    /// Path to configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory location (overrides $MODGRAPH_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a modpack directory and record its snapshot
    Scan {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Scan and report dependency problems and conflicts
    Analyze {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the dependency graph of the last scan as JSON
    Graph { dir: PathBuf },
    /// Print stored metadata for a mod id
    Show { mod_id: String },
    /// Manage known incompatibility rules
    #[command(subcommand)]
    Rules(RuleCommands),
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// List all rules
    List,
    /// Add a rule between two mods
    Add {
        mod_a: String,
        mod_b: String,
        #[arg(long, default_value = "known_incompatible")]
        kind: String,
        #[arg(long, default_value = "warning")]
        severity: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a rule by id
    Remove { rule_id: u64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::resolve_config(cli.config.clone(), cli.data_dir.clone())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
    log::debug!("Effective config: {:?}", config);

    let store = Arc::new(JsonFileStore::open(&config.store_path())?);
    let reporter = Arc::new(StderrProgressReporter { quiet: cli.quiet });
    let service = AnalysisService::new(store, config.service_options()?, reporter)?;

    match cli.command {
        Commands::Scan { dir, json } => commands::scan(&service, &dir, json),
        Commands::Analyze { dir, json } => commands::analyze(&service, &dir, json),
        Commands::Graph { dir } => commands::graph(&service, &dir),
        Commands::Show { mod_id } => commands::show_mod(&service, &mod_id),
        Commands::Rules(RuleCommands::List) => commands::list_rules(&service),
        Commands::Rules(RuleCommands::Add {
            mod_a,
            mod_b,
            kind,
            severity,
            description,
        }) => {
            let description = if description.is_empty() {
                format!("'{}' and '{}' are known to conflict", mod_a, mod_b)
            } else {
                description
            };
            commands::add_rule(&service, &mod_a, &mod_b, &kind, &severity, &description)
        }
        Commands::Rules(RuleCommands::Remove { rule_id }) => {
            commands::remove_rule(&service, rule_id)
        }
    }
}
