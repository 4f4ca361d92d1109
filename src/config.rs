//! Client configuration, read from `config.yml` in the config directory.
//! Missing files and missing keys fall back to defaults.

use crate::autosave::NAMESPACE_KEY;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "TASKDESK_CONFIG";
pub const API_URL_ENV: &str = "TASKDESK_API_URL";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Delays driving the interaction layer, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_focus_delay_ms")]
    pub focus_delay_ms: u64,
    #[serde(default = "default_notification_ttl_ms")]
    pub notification_ttl_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            autosave_debounce_ms: default_autosave_debounce_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            focus_delay_ms: default_focus_delay_ms(),
            notification_ttl_ms: default_notification_ttl_ms(),
        }
    }
}

fn default_autosave_debounce_ms() -> u64 {
    1000
}

fn default_busy_timeout_ms() -> u64 {
    3000
}

fn default_focus_delay_ms() -> u64 {
    100
}

fn default_notification_ttl_ms() -> u64 {
    5000
}

impl TimingConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Overrides the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            namespace: default_namespace(),
            data_dir: None,
        }
    }
}

fn default_namespace() -> String {
    NAMESPACE_KEY.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `TASKDESK_API_URL` on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.api.base_url = url.to_string();
            }
        }
    }
}

/// `TASKDESK_CONFIG`, when set, names the config file directly.
pub fn config_path_override() -> Option<PathBuf> {
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => None,
    }
}

pub fn default_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("config.yml")
}
