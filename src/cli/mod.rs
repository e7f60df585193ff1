use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod schema;
pub mod simulate;

use schema::SchemaArgs;
use simulate::SimulateArgs;

use screenflow::config::ConfigManager;

#[derive(Parser, Debug)]
#[command(
    name = "screenflow",
    about = "Screen-based conversational flows for USSD and chat",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Talk to the demo flow from the terminal
    Simulate(SimulateArgs),

    /// Emit JSON‐Schema
    Schema(SchemaArgs),
}

#[derive(Clone, Debug)]
pub struct CliContext {
    pub root: PathBuf,
    pub config_manager: ConfigManager,
}

impl CliContext {
    pub fn new(root: PathBuf, config_manager: ConfigManager) -> Self {
        Self { root, config_manager }
    }
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Simulate(args) => simulate::execute(args, context).await,
        Commands::Schema(args) => schema::execute(args, context).await,
    }
}

pub fn default_command() -> Commands {
    Commands::Simulate(SimulateArgs::default())
}
