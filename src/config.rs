use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".xrefs";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum number of candidate uploads passed to a single moniker search
    #[serde(default = "default_remote_batch_size")]
    pub remote_batch_size: usize,

    /// Page size used when the caller does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound on the page size a caller may request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Requests slower than this are logged at warn level
    #[serde(default = "default_slow_request_threshold_ms")]
    pub slow_request_threshold_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            remote_batch_size: default_remote_batch_size(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            slow_request_threshold_ms: default_slow_request_threshold_ms(),
        }
    }
}

impl ResolverConfig {
    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

fn default_remote_batch_size() -> usize {
    50
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    1000
}

fn default_slow_request_threshold_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to rolling files
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// Also log to stderr
    #[serde(default = "default_logging_stderr")]
    pub stderr: bool,

    /// Level for the file log: trace, debug, info, warn, error
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Log directory (relative paths resolve against the working directory)
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_logging_file_prefix")]
    pub file_prefix: String,

    /// Rotation: hourly, daily, minutely, never
    #[serde(default = "default_logging_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            stderr: default_logging_stderr(),
            level: default_logging_level(),
            directory: default_logging_directory(),
            file_prefix: default_logging_file_prefix(),
            rotation: default_logging_rotation(),
        }
    }
}

fn default_logging_enabled() -> bool {
    false
}

fn default_logging_stderr() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from(".xrefs/logs")
}

fn default_logging_file_prefix() -> String {
    "xrefs.log".to_string()
}

fn default_logging_rotation() -> String {
    "daily".to_string()
}

impl Config {
    /// Load configuration from the .xrefs directory
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the .xrefs directory
    pub fn save(&self, root: &Path) -> Result<()> {
        let config_dir = root.join(CONFIG_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }
}
