//! Subcommand implementations.

pub mod ask;
pub mod branches;
pub mod config_cmd;
pub mod contacts;
pub mod doctor;
pub mod ingest;
pub mod init;
pub mod runtime;
pub mod serve;

use admitline_config::AppConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Load the file at `path` with environment overrides applied.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_with_env(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}
