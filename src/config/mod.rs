//! Configuration management: the settings file plus environment variables.

/// Audio node endpoint from environment variables
pub mod node;

/// Bot settings loading from config.toml
pub mod settings;

pub use node::NodeConfig;
pub use settings::Settings;

use crate::errors::Result;
use tracing::info;

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_VAR: &str = "GROOVE_CONFIG";

/// Settings file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Everything the bot needs at startup except the chat token.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Contents of the settings file
    pub settings: Settings,
    /// Audio node endpoint
    pub node: NodeConfig,
}

/// Loads the settings file and the node endpoint.
///
/// Call after `.env` was loaded so both sources see its variables.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let settings = settings::load_settings(&path)?;
    let node = NodeConfig::from_env()?;
    info!(
        node = %node.host,
        providers = ?settings.search.providers,
        idle_timeout_secs = settings.player.idle_timeout_secs,
        "Configuration loaded"
    );
    Ok(AppConfig { settings, node })
}
