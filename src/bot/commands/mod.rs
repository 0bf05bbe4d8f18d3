//! Command implementations organized by category, plus the cache lookups they share.

#![allow(clippy::too_long_first_doc_paragraph)]

/// General utility commands
pub mod general;

/// Playback commands
pub mod music;

/// Queue management commands
pub mod queue;

// Export commands
pub use general::*;
pub use music::*;
pub use queue::*;

use crate::{
    bot::{BotData, Context, render},
    core::types::{ChannelId, ChannelMember, GuildId, UserId},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        join(),
        leave(),
        play(),
        pause(),
        resume(),
        stop(),
        skip(),
        volume(),
        seek(),
        forward(),
        reverse(),
        nowplaying(),
        queue(),
        clear(),
        remove(),
        shuffle(),
        ping(),
        help(),
    ]
}

/// Guild the command was invoked in.
pub(crate) fn guild_id(ctx: Context<'_>) -> Result<GuildId> {
    ctx.guild_id()
        .map(|guild| GuildId(guild.get()))
        .ok_or(Error::NotConnected)
}

/// Text channel the command was invoked in.
pub(crate) fn text_channel(ctx: Context<'_>) -> ChannelId {
    ChannelId(ctx.channel_id().get())
}

/// Invoking user.
pub(crate) fn author(ctx: Context<'_>) -> UserId {
    UserId(ctx.author().id.get())
}

/// Voice channel the invoking user currently sits in, from the gateway cache.
pub(crate) fn author_voice_channel(ctx: Context<'_>) -> Option<ChannelId> {
    let guild = ctx.guild()?;
    guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|state| state.channel_id)
        .map(|channel| ChannelId(channel.get()))
}

/// Everyone in `channel` right now, bots flagged.
pub(crate) fn channel_members(ctx: Context<'_>, channel: ChannelId) -> Vec<ChannelMember> {
    let Some(guild) = ctx.guild() else {
        return Vec::new();
    };
    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id.map(serenity::ChannelId::get) == Some(channel.0))
        .map(|state| {
            let is_bot = state
                .member
                .as_ref()
                .or_else(|| guild.members.get(&state.user_id))
                .is_some_and(|member| member.user.bot);
            ChannelMember {
                id: UserId(state.user_id.get()),
                is_bot,
            }
        })
        .collect()
}

/// Display name of a guild channel, falling back to a mention.
pub(crate) fn channel_name(ctx: Context<'_>, channel: ChannelId) -> String {
    ctx.guild()
        .and_then(|guild| {
            guild
                .channels
                .iter()
                .find(|(id, _)| id.get() == channel.0)
                .map(|(_, c)| c.name.clone())
        })
        .unwrap_or_else(|| format!("<#{channel}>"))
}

/// Replies with a playback embed.
pub(crate) async fn say_music(ctx: Context<'_>, message: impl Into<String>) -> Result<()> {
    ctx.send(poise::CreateReply::default().embed(render::music_embed(message)))
        .await?;
    Ok(())
}

/// Replies with an error embed without failing the command.
pub(crate) async fn say_error(ctx: Context<'_>, message: impl Into<String>) -> Result<()> {
    ctx.send(poise::CreateReply::default().embed(render::error_embed(message)))
        .await?;
    Ok(())
}
