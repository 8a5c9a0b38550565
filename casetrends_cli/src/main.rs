mod cli;
mod server;

use std::path::Path;

use anyhow::{Context, Result};
use casetrends::config::Config;
use clap::Parser;
use cli::{Cli, RunCommand};
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";
const CONFIG_DIR_NAME: &str = "casetrends";
const CONFIG_FILE_NAME: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL);
    }
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    debug!("args: {args:?}");
    let config = load_config()?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config).await?;
    }
    Ok(())
}

/// Resolve the optional config file, e.g. ~/.config/casetrends/config.toml
/// on Linux. No config dir at all (some containers) means defaults.
fn load_config() -> Result<Config> {
    match dirs::config_dir() {
        Some(dir) => read_config(&dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
        None => Ok(Config::default()),
    }
}

/// A missing file falls back to defaults; an unreadable or invalid one is an
/// error, so a typo in the config never silently serves the wrong dataset.
fn read_config(path: &Path) -> Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)
            .with_context(|| format!("invalid TOML in {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}
