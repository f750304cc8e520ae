//! Bot configuration
//!
//! Loaded once at startup from a YAML file. Everything that is policy rather
//! than mechanism (thresholds, durations, message texts) lives here.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "HOOT_CONFIG";
/// Configuration file used when [`CONFIG_ENV`] is unset
pub const DEFAULT_CONFIG_FILE: &str = "config/bot.yaml";

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// The community's guild
    pub guild_id: u64,
    /// Role given to muted members
    pub mute_role_id: u64,
    /// Channel receiving audit messages
    pub log_channel_id: Option<u64>,
    /// sqlx SQLite connection URL
    pub database_url: String,
    /// Prefix for text commands
    pub command_prefix: String,
    pub infractions: InfractionConfig,
    pub mail: MailConfig,
    pub filter: FilterConfig,
    pub event_log: EventLogConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            guild_id: 0,
            mute_role_id: 0,
            log_channel_id: None,
            database_url: "sqlite://data/hoot.db".to_string(),
            command_prefix: "!".to_string(),
            infractions: InfractionConfig::default(),
            mail: MailConfig::default(),
            filter: FilterConfig::default(),
            event_log: EventLogConfig::default(),
        }
    }
}

/// Automatic action taken after an infraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoAction {
    /// Mute for this many seconds
    pub mute: Option<u64>,
}

impl AutoAction {
    #[must_use]
    pub fn mute_duration(&self) -> Option<Duration> {
        self.mute.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// Warn/strike policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfractionConfig {
    pub warns_to_strike: u32,
    pub strikes_to_ban: u32,
    pub warn_action: AutoAction,
    pub strike_action: AutoAction,
    pub messages: InfractionMessages,
}

impl Default for InfractionConfig {
    fn default() -> Self {
        Self {
            warns_to_strike: 3,
            strikes_to_ban: 3,
            warn_action: AutoAction::default(),
            strike_action: AutoAction {
                mute: Some(60 * 60),
            },
            messages: InfractionMessages::default(),
        }
    }
}

/// Direct messages sent to members. `{reason}` is substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfractionMessages {
    pub warn: String,
    pub warn_no_reason: String,
    pub strike: String,
    pub strike_no_reason: String,
    pub strike_auto: String,
}

impl Default for InfractionMessages {
    fn default() -> Self {
        Self {
            warn: "You have been warned: {reason}".to_string(),
            warn_no_reason: "You have been warned.".to_string(),
            strike: "You have received a strike: {reason}".to_string(),
            strike_no_reason: "You have received a strike.".to_string(),
            strike_auto: "Your warnings have added up to a strike.".to_string(),
        }
    }
}

/// Mail room behaviour and texts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Category new rooms are created under
    pub category_id: Option<u64>,
    /// Seconds of inactivity before a room is closed
    pub expiration: u64,
    /// Seconds a user has to confirm opening a room
    pub confirm_patience: u64,
    /// Size of the cache of channels known not to be rooms
    pub max_cache: usize,
    pub confirmation_message: String,
    pub confirm_expired: String,
    pub ending_conv: String,
    pub bad_reaction: String,
    pub closing_message: String,
    pub unknown_room: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            category_id: None,
            expiration: 60 * 60 * 24,
            confirm_patience: 60,
            max_cache: 100,
            confirmation_message: "Do you want to open a conversation with the staff? React with ✅ or ❎".to_string(),
            confirm_expired: "You took too long to answer.".to_string(),
            ending_conv: "Alright, no conversation was opened.".to_string(),
            bad_reaction: "Unknown reaction, no conversation was opened.".to_string(),
            closing_message: "Your conversation with the staff has been closed.".to_string(),
            unknown_room: "That channel is not a mail room.".to_string(),
        }
    }
}

impl MailConfig {
    #[must_use]
    pub const fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration)
    }

    #[must_use]
    pub const fn confirm_patience(&self) -> Duration {
        Duration::from_secs(self.confirm_patience)
    }
}

/// Automatic message filter. Replies substitute `{mention}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    /// Regexes matched against the start of each word
    pub patterns: Vec<String>,
    /// Characters removed before splitting a message into words
    pub strip_chars: String,
    pub max_mentions: usize,
    /// Most times a single word may appear in one message
    pub max_word_count: usize,
    pub profanity_reply: String,
    pub mentions_reply: String,
    pub repeats_reply: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: Vec::new(),
            strip_chars: "*_~`|>.,!?".to_string(),
            max_mentions: 5,
            max_word_count: 10,
            profanity_reply: "Watch your profanity {mention}".to_string(),
            mentions_reply: "Calm down, don't spam mentions {mention}".to_string(),
            repeats_reply: "Don't repeat messages {mention}".to_string(),
        }
    }
}

/// Which guild events are posted to the log channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Messages remembered per channel for edit and delete logs
    pub max_message_cache: usize,
    pub message_edit: bool,
    pub message_delete: bool,
    pub member_join: bool,
    pub member_leave: bool,
    pub member_update: bool,
    pub bans: bool,
    pub channels: bool,
    pub voice: bool,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            max_message_cache: 100,
            message_edit: true,
            message_delete: true,
            member_join: true,
            member_leave: true,
            member_update: true,
            bans: true,
            channels: true,
            voice: true,
        }
    }
}

impl BotConfig {
    /// Load the configuration named by `HOOT_CONFIG`, or the default file
    ///
    /// # Errors
    /// See [`BotConfig::load`].
    pub async fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(path).await
    }

    /// Load and validate a YAML config file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_yaml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error if `content` is not a valid configuration document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero threshold or a filter
    /// pattern that is not a valid regex.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.infractions.warns_to_strike == 0 {
            return Err(ConfigError::Invalid(
                "infractions.warns_to_strike must be at least 1".to_string(),
            ));
        }
        if self.infractions.strikes_to_ban == 0 {
            return Err(ConfigError::Invalid(
                "infractions.strikes_to_ban must be at least 1".to_string(),
            ));
        }
        for pattern in &self.filter.patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("filter pattern {pattern:?}: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Substitute `{reason}` in a message template
#[must_use]
pub fn render(template: &str, reason: &str) -> String {
    template.replace("{reason}", reason)
}
