//! Bot settings loaded from config.toml
//!
//! Every field is optional. A missing file yields the defaults; a file that does not
//! parse or fails validation is rejected so typos never silently fall back.

use crate::{
    core::{backend::SearchProvider, session::MAX_VOLUME, session::SessionSettings},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Playback tunables
    pub player: PlayerSettings,
    /// Search fallback chain
    pub search: SearchSettings,
    /// Chat front-end options
    pub bot: BotSettings,
}

/// `[player]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerSettings {
    /// Seconds a session may sit without a track before leaving voice
    pub idle_timeout_secs: u64,
    /// Volume of a fresh session, in percent
    pub default_volume: u16,
    /// Default jump for `forward`/`reverse`, in seconds
    pub seek_step_secs: u64,
    /// Queued tracks shown per `queue` listing
    pub queue_page_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            default_volume: 100,
            seek_step_secs: 5,
            queue_page_size: 9,
        }
    }
}

/// `[search]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Providers tried in order until one finds something
    pub providers: Vec<SearchProvider>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            providers: vec![SearchProvider::Direct, SearchProvider::YouTube],
        }
    }
}

/// `[bot]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotSettings {
    /// Prefix for text commands
    pub prefix: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
        }
    }
}

impl Settings {
    /// Parses and validates TOML settings.
    pub fn parse(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse settings: {e}"),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::Config {
                message: message.to_string(),
            })
        };

        if self.player.idle_timeout_secs == 0 {
            return invalid("player.idle_timeout_secs must be greater than zero");
        }
        if self.player.default_volume > MAX_VOLUME {
            return invalid("player.default_volume must be between 0 and 150");
        }
        if self.player.queue_page_size == 0 {
            return invalid("player.queue_page_size must be greater than zero");
        }
        if self.search.providers.is_empty() {
            return invalid("search.providers must name at least one provider");
        }
        if self.bot.prefix.trim().is_empty() {
            return invalid("bot.prefix must not be empty");
        }
        Ok(())
    }

    /// The subset every playback session is built with.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: Duration::from_secs(self.player.idle_timeout_secs),
            providers: self.search.providers.clone(),
            default_volume: self.player.default_volume,
        }
    }

    /// Default `forward`/`reverse` jump.
    #[must_use]
    pub const fn seek_step(&self) -> Duration {
        Duration::from_secs(self.player.seek_step_secs)
    }
}

/// Loads settings from a TOML file, falling back to defaults when it does not exist.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid or names an unknown field or provider
/// - A value fails validation
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    debug!("Loading settings from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    Settings::parse(&contents)
}
