use std::{env, path::PathBuf};

use clap::Parser;
use screenflow::config::{ConfigManager, EnvConfigManager};

mod cli;

use cli::{Cli, CliContext, default_command, execute};

/// Resolve the screenflow root directory from the environment or use default.
pub fn resolve_root_dir() -> PathBuf {
    if let Ok(path) = env::var("SCREENFLOW_ROOT") {
        PathBuf::from(path)
    } else {
        PathBuf::from(".")
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = resolve_root_dir();
    let config_manager = ConfigManager(EnvConfigManager::new(root.join(".env")));
    let context = CliContext::new(root, config_manager);

    execute(&context, cli.command.unwrap_or_else(default_command)).await
}
