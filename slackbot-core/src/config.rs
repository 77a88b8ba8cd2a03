// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates the bot credential up front and provides defaults for everything else
use crate::dedup::DEFAULT_CAPACITY;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...) for Web API calls
    #[serde(default)]
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,
    /// This app's id, used to ignore events the bot produced itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_app_id: Option<String>,
}

// Custom Debug impl to redact tokens
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &self.app_token.as_ref().map(|_| "[REDACTED]"))
            .field("bot_app_id", &self.bot_app_id)
            .finish()
    }
}

impl SlackConfig {
    /// App-level token, required once Socket Mode is started
    pub fn require_app_token(&self) -> Result<&str> {
        self.app_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .context("slack.app_token is required for Socket Mode (set in config.toml or SLACK_APP_TOKEN env var)")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset (e.g. "info", "debug,hyper=warn")
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for a daily-rolling log file, in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// How many recent event keys are remembered for duplicate suppression
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dedup_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Expand tilde (~) to home directory in paths
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    }
    path.to_string()
}

fn non_empty(val: String) -> Option<String> {
    let trimmed = val.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. SLACKBOT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/slackbot/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("SLACKBOT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Parse a TOML document without env overrides or validation
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from config.toml with environment variable overrides
    /// Searches: SLACKBOT_CONFIG_PATH env var, ./config.toml, then the XDG config dir
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::debug!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = val.trim().to_string();
        }
        if let Ok(val) = std::env::var("SLACK_APP_TOKEN") {
            self.slack.app_token = non_empty(val);
        }
        if let Ok(val) = std::env::var("SLACK_BOT_APP_ID") {
            self.slack.bot_app_id = non_empty(val);
        }
        if let Ok(val) = std::env::var("LOG_LEVEL") {
            self.logging.level = val.to_lowercase();
        }
        if let Ok(val) = std::env::var("LOG_FORMAT") {
            self.logging.format = match val.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got: {}", other),
            };
        }
        if let Ok(val) = std::env::var("LOG_DIR") {
            self.logging.directory = non_empty(val);
        }
        if let Ok(val) = std::env::var("DEDUP_CAPACITY") {
            self.dispatcher.dedup_capacity = val.parse().with_context(|| {
                format!("DEDUP_CAPACITY must be a non-negative number, got: {}", val)
            })?;
        }

        if let Some(dir) = self.logging.directory.as_mut() {
            *dir = expand_tilde(dir);
        }
        Ok(())
    }

    /// Missing credentials are fatal at construction time
    pub fn validate(&self) -> Result<()> {
        if self.slack.bot_token.trim().is_empty() {
            anyhow::bail!(
                "slack.bot_token is required (set in config.toml or SLACK_BOT_TOKEN env var)"
            );
        }
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }
        Ok(())
    }
}
