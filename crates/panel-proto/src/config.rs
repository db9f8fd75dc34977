use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the control server lives and how patiently we talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// First delay before re-opening a dropped event stream.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

/// Switch keyboard geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardConfig {
    /// Switch groups shown per page.
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_total_switches")]
    pub total_switches: usize,
    #[serde(default = "default_columns")]
    pub columns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Hold time after which a press on the speed bar becomes a drag.
    #[serde(default = "default_drag_threshold_ms")]
    pub drag_threshold_ms: u64,
    /// Speed change per arrow key press, in protocol units (0..=1000).
    #[serde(default = "default_speed_step")]
    pub speed_step: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssetsConfig {
    /// Base URL for icon assets. Empty means `<server>/static`.
    #[serde(default)]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing-subscriber filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("keyboard.group_size must be at least 1")]
    ZeroGroupSize,
    #[error("keyboard.columns must be at least 1")]
    ZeroColumns,
    #[error("keyboard.total_switches ({total}) must be a positive multiple of group_size ({group_size})")]
    UnevenPages { total: usize, group_size: usize },
    #[error("server.base_url must start with http:// or https://, got {0:?}")]
    BadBaseUrl(String),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            total_switches: default_total_switches(),
            columns: default_columns(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            drag_threshold_ms: default_drag_threshold_ms(),
            speed_step: default_speed_step(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5005".to_string()
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_reconnect_delay_ms() -> u64 {
    500
}

fn default_max_reconnect_delay_ms() -> u64 {
    10_000
}

fn default_group_size() -> usize {
    8
}

fn default_total_switches() -> usize {
    64
}

fn default_columns() -> usize {
    4
}

fn default_drag_threshold_ms() -> u64 {
    100
}

fn default_speed_step() -> u16 {
    50
}

fn default_log_filter() -> String {
    "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string()
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms.max(self.reconnect_delay_ms))
    }
}

impl KeyboardConfig {
    pub fn page_count(&self) -> usize {
        if self.group_size == 0 {
            return 0;
        }
        self.total_switches / self.group_size
    }
}

impl InputConfig {
    pub fn drag_threshold(&self) -> Duration {
        Duration::from_millis(self.drag_threshold_ms)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing a default file there first if none exists.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let kb = &self.keyboard;
        if kb.group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }
        if kb.columns == 0 {
            return Err(ConfigError::ZeroColumns);
        }
        if kb.total_switches == 0 || kb.total_switches % kb.group_size != 0 {
            return Err(ConfigError::UnevenPages {
                total: kb.total_switches,
                group_size: kb.group_size,
            });
        }
        let url = self.server.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BadBaseUrl(self.server.base_url.clone()));
        }
        Ok(())
    }

    /// Server base URL without a trailing slash.
    pub fn server_url(&self) -> String {
        self.server.base_url.trim_end_matches('/').to_string()
    }

    /// Icon asset base URL without a trailing slash.
    pub fn assets_url(&self) -> String {
        if self.assets.base_url.is_empty() {
            format!("{}/static", self.server_url())
        } else {
            self.assets.base_url.trim_end_matches('/').to_string()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            keyboard: KeyboardConfig::default(),
            input: InputConfig::default(),
            assets: AssetsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
