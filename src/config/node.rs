//! Audio node endpoint configuration from environment variables.
//!
//! Reads `LAVALINK_HOST`, `LAVALINK_PASSWORD` and `LAVALINK_SECURE`. Every variable
//! is optional and defaults to a node running next to the bot.

use crate::errors::{Error, Result};

const DEFAULT_HOST: &str = "127.0.0.1:2333";
const DEFAULT_PASSWORD: &str = "youshallnotpass";

/// Where the Lavalink node lives and how to authenticate with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// `host:port` of the node
    pub host: String,
    /// Value of the `Authorization` header
    pub password: String,
    /// Use `https`/`wss` instead of `http`/`ws`
    pub secure: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            secure: false,
        }
    }
}

impl NodeConfig {
    /// Reads the node configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the node configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secure = match lookup("LAVALINK_SECURE") {
            None => false,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "" | "0" | "false" | "no" => false,
                "1" | "true" | "yes" => true,
                other => {
                    return Err(Error::Config {
                        message: format!("LAVALINK_SECURE must be true or false, got `{other}`"),
                    });
                }
            },
        };

        Ok(Self {
            host: lookup("LAVALINK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            password: lookup("LAVALINK_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            secure,
        })
    }

    /// Base URL of the REST API, e.g. `http://127.0.0.1:2333/v4`.
    #[must_use]
    pub fn rest_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}/v4", self.host)
    }

    /// URL of the event WebSocket.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}/v4/websocket", self.host)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = NodeConfig::from_lookup(lookup_in(&[])).unwrap();

        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.rest_base(), "http://127.0.0.1:2333/v4");
        assert_eq!(config.websocket_url(), "ws://127.0.0.1:2333/v4/websocket");
    }

    #[test]
    fn test_secure_node() {
        let config = NodeConfig::from_lookup(lookup_in(&[
            ("LAVALINK_HOST", "lava.example.com:443"),
            ("LAVALINK_PASSWORD", "hunter2"),
            ("LAVALINK_SECURE", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.password, "hunter2");
        assert_eq!(config.rest_base(), "https://lava.example.com:443/v4");
        assert_eq!(
            config.websocket_url(),
            "wss://lava.example.com:443/v4/websocket"
        );
    }

    #[test]
    fn test_rejects_garbage_secure_flag() {
        let result = NodeConfig::from_lookup(lookup_in(&[("LAVALINK_SECURE", "maybe")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
