//! Bot layer - chat-specific interface and command handlers
//!
//! This module provides the chat interface of the playback bot: slash and prefix
//! commands, reply rendering and the framework/client bootstrap.

/// Command implementations (music, queue, general)
pub mod commands;
/// Framework options, error handler and client startup
pub mod framework;
/// Reply text and embeds
pub mod render;

use crate::{config::Settings, core::registry::SessionRegistry, errors::Error};
use std::sync::Arc;

/// Shared data available to all bot commands.
pub struct BotData {
    /// Every guild's playback session
    pub registry: SessionRegistry,
    /// Settings file contents
    pub settings: Arc<Settings>,
}

impl BotData {
    /// Creates a new `BotData` from the session registry and loaded settings.
    #[must_use]
    pub const fn new(registry: SessionRegistry, settings: Arc<Settings>) -> Self {
        Self { registry, settings }
    }
}

/// Poise context every command receives.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

pub use commands::*;
pub use framework::run_bot;
