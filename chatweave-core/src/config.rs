//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/chatweave/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/chatweave/` (~/.config/chatweave/)
//! - State/Logs: `$XDG_STATE_HOME/chatweave/` (~/.local/state/chatweave/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Chat session behaviour
    #[serde(default)]
    pub session: SessionConfig,

    /// Bot metadata used by the local bootstrap
    #[serde(default)]
    pub bot: BotSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Answer delivery pattern of the bot
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatPattern {
    /// Plain streamed answers; token usage makes the placeholder stoppable
    #[default]
    Standard,
    /// Agent mode with thought traces
    Agent,
}

/// Per-session engine settings
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Seconds to wait for the server to acknowledge a question
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    /// Answer delivery pattern
    #[serde(default)]
    pub pattern: ChatPattern,

    /// Placeholder text shown while an answer is pending
    #[serde(default = "default_loading_text")]
    pub loading_text: String,

    /// Marker appended to a message when the user stops generation
    #[serde(default = "default_stop_marker")]
    pub stop_marker: String,

    /// Greeting inserted into an empty transcript (optional)
    #[serde(default)]
    pub welcome_message: Option<String>,

    /// Delay before the greeting is considered, in milliseconds
    #[serde(default = "default_welcome_delay_ms")]
    pub welcome_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: default_ack_timeout_secs(),
            pattern: ChatPattern::default(),
            loading_text: default_loading_text(),
            stop_marker: default_stop_marker(),
            welcome_message: None,
            welcome_delay_ms: default_welcome_delay_ms(),
        }
    }
}

impl SessionConfig {
    /// Acknowledgment window as a [`Duration`]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// Welcome delay as a [`Duration`]
    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout_secs == 0 {
            return Err(Error::Config(
                "session.ack_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_ack_timeout_secs() -> u64 {
    120
}

fn default_loading_text() -> String {
    "Thinking".to_string()
}

fn default_stop_marker() -> String {
    "| Generation stopped".to_string()
}

fn default_welcome_delay_ms() -> u64 {
    500
}

/// Bot metadata handed to observers on bootstrap
#[derive(Debug, Deserialize, Clone)]
pub struct BotSettings {
    /// Display name
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Avatar URL or asset path
    #[serde(default)]
    pub avatar: Option<String>,

    /// Business identifier of the bot
    #[serde(default)]
    pub bot_biz_id: Option<String>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            avatar: None,
            bot_biz_id: None,
        }
    }
}

fn default_bot_name() -> String {
    "chatweave".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Also echo warnings and errors to stderr
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stderr: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.session.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/chatweave/config.toml` (~/.config/chatweave/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("chatweave").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/chatweave/` (~/.local/state/chatweave/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("chatweave")
    }
}
