use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Persistence settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Batch translation settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Quality evaluation settings
    #[serde(default)]
    pub quality: QualityConfig,

    /// Model registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// External programs behind the process adapter
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Database location
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// SQLite file; the platform data directory is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Batch translation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum number of units translated at the same time
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Timeout of a single translation call in seconds
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,

    /// Extra passes over failed units within the same run
    #[serde(default)]
    pub retry_failed_units: u32,

    /// Evaluate translated units once a batch completes
    #[serde(default)]
    pub auto_evaluate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: default_max_concurrent_units(),
            unit_timeout_secs: default_unit_timeout_secs(),
            retry_failed_units: 0,
            auto_evaluate: false,
        }
    }
}

impl PipelineConfig {
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_secs)
    }
}

/// Quality evaluation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    #[serde(default = "default_classical_timeout_secs")]
    pub classical_timeout_secs: u64,

    #[serde(default = "default_neural_timeout_secs")]
    pub neural_timeout_secs: u64,

    /// Maximum number of units evaluated at the same time
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            classical_timeout_secs: default_classical_timeout_secs(),
            neural_timeout_secs: default_neural_timeout_secs(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
        }
    }
}

impl QualityConfig {
    pub fn classical_timeout(&self) -> Duration {
        Duration::from_secs(self.classical_timeout_secs)
    }

    pub fn neural_timeout(&self) -> Duration {
        Duration::from_secs(self.neural_timeout_secs)
    }
}

/// Model registry configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// How long an availability snapshot stays valid, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Command line of an external program
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackendCommand {
    /// Executable name or path
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl BackendCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
        }
    }
}

/// External programs for translation and evaluation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendsConfig {
    #[serde(default = "default_translator_command")]
    pub translator: BackendCommand,

    #[serde(default = "default_classical_scorer_command")]
    pub classical_scorer: BackendCommand,

    #[serde(default = "default_neural_scorer_command")]
    pub neural_scorer: BackendCommand,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            translator: default_translator_command(),
            classical_scorer: default_classical_scorer_command(),
            neural_scorer: default_neural_scorer_command(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_max_concurrent_units() -> usize {
    4
}

fn default_unit_timeout_secs() -> u64 {
    120
}

fn default_classical_timeout_secs() -> u64 {
    60
}

fn default_neural_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent_evaluations() -> usize {
    2
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_translator_command() -> BackendCommand {
    BackendCommand::new("python3", &["scripts/translate.py"])
}

fn default_classical_scorer_command() -> BackendCommand {
    BackendCommand::new("python3", &["scripts/classical_score.py"])
}

fn default_neural_scorer_command() -> BackendCommand {
    BackendCommand::new("python3", &["scripts/neural_score.py"])
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;

        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Load the file if it exists, otherwise write and return the defaults
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        log::warn!(
            "Config file not found at '{}', creating default config.",
            path.display()
        );
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_concurrent_units == 0 {
            return Err(anyhow!("pipeline.max_concurrent_units must be at least 1"));
        }
        if self.pipeline.unit_timeout_secs == 0 {
            return Err(anyhow!("pipeline.unit_timeout_secs must be at least 1"));
        }
        if self.quality.max_concurrent_evaluations == 0 {
            return Err(anyhow!("quality.max_concurrent_evaluations must be at least 1"));
        }
        if self.quality.classical_timeout_secs == 0 || self.quality.neural_timeout_secs == 0 {
            return Err(anyhow!("Evaluator timeouts must be at least 1 second"));
        }

        for (name, command) in [
            ("translator", &self.backends.translator),
            ("classical_scorer", &self.backends.classical_scorer),
            ("neural_scorer", &self.backends.neural_scorer),
        ] {
            if command.program.trim().is_empty() {
                return Err(anyhow!("backends.{}.program must not be empty", name));
            }
        }

        Ok(())
    }

    /// Database file, explicit or under the platform data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}
