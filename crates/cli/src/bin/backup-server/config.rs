use anyhow::{Context, Result};
use daemon::Compression;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "backup";

/// Directory holding `config.toml`, overridable for tests and packaging
const CONFIG_PATH_ENV: &str = "BACKUP_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Default destination when none is given on the command line
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub compression: Compression,
}

pub fn get_config_dir() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_config_file() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load the config file, falling back to defaults when there is none
pub fn load_config() -> Result<Config> {
    let Some(config_file) = get_config_file() else {
        tracing::debug!("No config directory available, using defaults");
        return Ok(Config::default());
    };

    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    parse_config(&contents, &config_file)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    toml::from_str(contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
