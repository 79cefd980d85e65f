use anyhow::{Context, Result};
use clap::Parser;

use engagebot::config::{default_config_path, Config};
use engagebot::ledger_cli::{self, LedgerCommands};
use engagebot::logging::init_logging;

#[derive(Parser)]
#[command(name = "engagebot")]
#[command(about = "Operate the engagebot follow history")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.engagebot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: LedgerCommands,
}

fn load_config(path: Option<&str>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {path}"));
    }
    match default_config_path() {
        Some(default) if default.exists() => {
            let path = default.to_string_lossy();
            Config::load_from_file(&path)
                .with_context(|| format!("Failed to load config from {path}"))
        }
        _ => Config::from_toml(""),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.expand_paths();

    init_logging(&config.logging.level)?;

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    ledger_cli::handle_command(cli.command, &config)
}
