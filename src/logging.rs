use crate::config;
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::PathBuf;

pub const FILTER_ENV: &str = "RANDPLAY_LOG";

/// Sends log records to the log file in the config directory, since stderr
/// belongs to the terminal UI. Returns the file in use.
pub fn init() -> Result<PathBuf> {
    config::ensure_config_dir()?;
    let path = config::log_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    Builder::from_env(Env::default().filter_or(FILTER_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("logger already initialised")?;
    Ok(path)
}
