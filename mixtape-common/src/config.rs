//! Configuration loading
//!
//! Resolution priority order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `MIXTAPE_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/mixtape/config.toml` or equivalent)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MIXTAPE_CONFIG";

/// Analysis engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Worker pool size for background analysis
    pub workers: usize,
    /// Seconds `stop()` waits for workers before giving up
    pub shutdown_grace_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            shutdown_grace_secs: 5,
        }
    }
}

/// Planning oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Endpoint receiving `{kind, payload}` JSON envelopes
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Retry attempts for failed calls (exponential backoff)
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5730/oracle".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Music library roots to scan for audio files
    pub library_roots: Vec<PathBuf>,
    /// SQLite database path for analyzed track records
    pub database_path: PathBuf,
    /// Where rendered sets are written; defaults to the system temp dir
    pub output_dir: Option<PathBuf>,
    pub analysis: AnalysisConfig,
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_roots: vec![],
            database_path: default_data_dir().join("mixtape.db"),
            output_dir: None,
            analysis: AnalysisConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration following the priority order above.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        // Priority 1: command-line argument
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        // Priority 3: platform config directory
        if let Some(path) = default_config_file() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // Priority 4: compiled defaults
        Ok(Self::default())
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {e}", path.display())))
    }

    /// Directory rendered WAV files are written to.
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Default configuration file path for the platform
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mixtape").join("config.toml"))
}

/// Default data directory for the database
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mixtape"))
        .unwrap_or_else(|| PathBuf::from("./mixtape_data"))
}
