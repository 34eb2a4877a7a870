// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use config::{Environment as EnvSource, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `GATEWAY__SCHEDULER__TOKEN`.
pub const ENV_PREFIX: &str = "GATEWAY";

/// Load configuration from a file (YAML, JSON or TOML by extension), with
/// `GATEWAY__*` environment variables layered on top.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let builder = config::Config::builder().add_source(File::from(path));
    build(builder).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Same as [`load_config`] but from an in-memory document.
pub fn parse_config(contents: &str, format: FileFormat) -> Result<Config> {
    let builder = config::Config::builder().add_source(File::from_str(contents, format));
    build(builder)
}

fn build(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Config> {
    let config: Config = builder
        .add_source(EnvSource::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("Failed to read config sources")?
        .try_deserialize()
        .context("Failed to parse config")?;

    config.validate()?;
    Ok(config)
}
