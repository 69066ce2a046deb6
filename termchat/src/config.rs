use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::MatchMode;
use crate::prompt::{DEFAULT_SYMBOL, Session};
use crate::store::{DEFAULT_DEPTH, RetryPolicy};
use crate::sync::SyncConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_interval() -> u64 {
    1
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

/// Stored client configuration (`~/.termchat/config.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "ChatConfig::default_session")]
    pub session: Session,
    /// Seconds between history polls.
    #[serde(default = "default_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_depth")]
    pub history_depth: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Built-in commands left out of the table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_commands: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            session: Self::default_session(),
            poll_interval_secs: default_interval(),
            history_depth: default_depth(),
            retry: RetryPolicy::default(),
            match_mode: MatchMode::default(),
            excluded_commands: Vec::new(),
        }
    }
}

impl ChatConfig {
    fn default_session() -> Session {
        Session::default()
    }

    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".termchat")
    }

    fn config_path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from ~/.termchat/config.json.
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::config_path()).ok()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save to ~/.termchat/config.json
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: self.poll_interval(),
            depth: self.history_depth,
            prompt_symbol: if self.session.prompt_symbol.is_empty() {
                DEFAULT_SYMBOL.to_string()
            } else {
                self.session.prompt_symbol.clone()
            },
            location: format!("{}@{}", self.session.system, self.server_url),
        }
    }

    pub fn excluded(&self) -> Vec<&str> {
        self.excluded_commands.iter().map(String::as_str).collect()
    }
}
