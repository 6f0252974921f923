use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::wikipedia::DEFAULT_BASE_URL;

/// Bump this when adding new fields with non-trivial defaults.
/// When a loaded config has a lower version, it is re-saved to disk
/// so that users see the new keys in their `config.toml`.
const CURRENT_CONFIG_VERSION: u32 = 1;

pub const API_BASE_ENV: &str = "WIKICHAT_API_BASE";
pub const DB_PATH_ENV: &str = "WIKICHAT_DB_PATH";

fn default_answer_endpoint() -> String {
    "http://localhost:3100/api".to_string()
}

fn default_answer_timeout_secs() -> u64 {
    60
}

fn default_search_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_search_limit() -> u32 {
    10
}

fn default_search_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub config_version: u32,
    pub db_path: Option<String>,
    #[serde(default = "default_answer_endpoint")]
    pub answer_endpoint: String,
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_version: 0,
            db_path: None,
            answer_endpoint: default_answer_endpoint(),
            answer_timeout_secs: default_answer_timeout_secs(),
            search_base_url: default_search_base_url(),
            search_limit: default_search_limit(),
            search_debounce_ms: default_search_debounce_ms(),
        }
    }
}

impl Settings {
    fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wikichat")
    }

    fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    pub fn load_global() -> Self {
        let path = Self::global_config_path();
        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            let mut settings: Self = match toml::from_str(&content) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("failed to parse {}: {e}. Using defaults.", path.display());
                    Self::default()
                }
            };

            // Re-save when config is from an older version so new fields
            // (with their defaults) appear in the file on disk.
            if settings.config_version < CURRENT_CONFIG_VERSION {
                settings.config_version = CURRENT_CONFIG_VERSION;
                if let Err(e) = settings.save() {
                    log::warn!("failed to migrate config to v{CURRENT_CONFIG_VERSION}: {e}");
                }
            }

            settings
        } else {
            Self {
                config_version: CURRENT_CONFIG_VERSION,
                ..Self::default()
            }
        };

        settings.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let global_dir = Self::global_config_dir();
        std::fs::create_dir_all(&global_dir)?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::global_config_path(), &content)?;
        Ok(())
    }

    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(endpoint) = non_empty(API_BASE_ENV) {
            self.answer_endpoint = endpoint;
        }
        if let Some(db_path) = non_empty(DB_PATH_ENV) {
            self.db_path = Some(db_path);
        }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::global_config_dir().join("chat.db"))
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs.clamp(1, 600))
    }

    pub fn search_limit(&self) -> u32 {
        self.search_limit.clamp(1, 50)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms.min(5_000))
    }
}
