//! Playback commands - join, leave, play, transport controls, skip votes and seeking.
//!
//! Each command looks up the guild's session in the registry, runs one session
//! operation under its lock and renders the outcome. Failures propagate to the
//! framework error handler, except range errors whose wording depends on the command.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            commands::{
                author, author_voice_channel, channel_members, guild_id, say_error, say_music,
                text_channel,
            },
            render,
        },
        core::registry::JoinOutcome,
        errors::{Error, Result},
    };
    use std::time::Duration;

    /// Joins the voice channel you are in.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn join(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_id(ctx)?;
        let voice = author_voice_channel(ctx);

        match ctx
            .data()
            .registry
            .join(guild, voice, text_channel(ctx))
            .await?
        {
            JoinOutcome::Joined => {
                let channel = voice.map_or_else(String::new, |c| format!(" <#{c}>"));
                say_music(ctx, format!("Joined{channel}.")).await
            }
            JoinOutcome::AlreadyHere => say_music(ctx, "I'm already here.").await,
        }
    }

    /// Leaves the voice channel and forgets the queue.
    #[poise::command(slash_command, prefix_command, guild_only, aliases("gtfo"))]
    pub async fn leave(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let guild = guild_id(ctx)?;
        ctx.data().registry.leave(guild).await?;
        say_music(ctx, "Disconnected.").await
    }

    /// Searches for a track or playlist and adds it to the queue.
    ///
    /// Joins your voice channel first when the bot is not connected.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn play(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Link or search terms"]
        #[rest]
        query: String,
    ) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return say_error(ctx, "Please provide search terms.").await;
        }
        let guild = guild_id(ctx)?;
        let voice = author_voice_channel(ctx);
        ctx.defer().await?;

        let outcome = ctx
            .data()
            .registry
            .play(guild, voice, text_channel(ctx), query, Some(author(ctx)))
            .await?;

        let mut reply = poise::CreateReply::default()
            .embed(render::enqueued_embed(&outcome.enqueued, &ctx.author().name));
        if let Some(started) = &outcome.started {
            reply = reply.embed(render::track_embed(
                "Now Playing:",
                started,
                format!("Duration: {}", render::format_duration(started.duration())),
            ));
        }
        ctx.send(reply).await?;
        Ok(())
    }

    /// Pauses the current track.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn pause(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let track = shared.lock().await.pause().await?;
        say_music(ctx, format!("Paused: {}", track.info.title)).await
    }

    /// Resumes the paused track.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn resume(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let track = shared.lock().await.resume().await?;
        say_music(ctx, format!("Resumed: {}", track.info.title)).await
    }

    /// Stops playback and clears the queue.
    #[poise::command(slash_command, prefix_command, guild_only, aliases("stfu"))]
    pub async fn stop(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let outcome = shared.lock().await.stop().await?;

        let title = outcome
            .stopped
            .as_ref()
            .map_or_else(|| "playback".to_string(), |t| t.info.title.clone());
        let message = if outcome.cleared > 0 {
            format!(
                "Stopped {title} and removed {} track{} from queue.",
                outcome.cleared,
                render::plural(outcome.cleared)
            )
        } else {
            format!("Stopped {title}.")
        };
        say_music(ctx, message).await
    }

    /// Votes to skip the current track. Half of the listeners, rounded up, must agree.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn skip(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let mut session = shared.lock().await;
        let members = channel_members(ctx, session.voice_channel());
        let outcome = session.vote_skip(author(ctx), &members).await?;
        drop(session);

        say_music(ctx, render::vote_message(&outcome)).await
    }

    /// Changes the volume, from 0 to 150 percent.
    #[poise::command(slash_command, prefix_command, guild_only, aliases("vol", "v"))]
    pub async fn volume(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Volume in percent (0-150)"] level: i64,
    ) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let result = shared.lock().await.set_volume(level).await;

        match result {
            Ok(volume) => say_music(ctx, format!("Changed the volume to {volume}.")).await,
            Err(Error::OutOfRange { value, min, max }) => {
                let message = if value < min {
                    format!("Minimum volume is {min}.")
                } else {
                    format!("Maximum volume is {max}.")
                };
                say_error(ctx, message).await
            }
            Err(e) => Err(e),
        }
    }

    /// Jumps to a timestamp in the current track.
    #[poise::command(slash_command, prefix_command, guild_only, aliases("goto"))]
    pub async fn seek(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Position as ss, mm:ss or hh:mm:ss"] position: String,
    ) -> Result<()> {
        let target = match render::parse_timestamp(&position) {
            Ok(target) => target,
            Err(Error::OutOfRange { .. }) => {
                return say_error(ctx, "Position should not be negative.").await;
            }
            Err(e) => return Err(e),
        };

        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let result = shared.lock().await.seek(target).await;
        reply_seek(
            ctx,
            result,
            "Current track is now at",
            "Position is greater than the length of the track.",
        )
        .await
    }

    /// Skips ahead in the current track, by the configured step if no amount is given.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn forward(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Seconds to skip ahead"] seconds: Option<u64>,
    ) -> Result<()> {
        let delta = seconds.map_or_else(|| ctx.data().settings.seek_step(), Duration::from_secs);
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let result = shared.lock().await.forward(delta).await;
        reply_seek(
            ctx,
            result,
            "Forwarded to",
            "Can't move forward; not enough time left in track.",
        )
        .await
    }

    /// Rewinds the current track, by the configured step if no amount is given.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn reverse(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Seconds to rewind"] seconds: Option<u64>,
    ) -> Result<()> {
        let delta = seconds.map_or_else(|| ctx.data().settings.seek_step(), Duration::from_secs);
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let result = shared.lock().await.reverse(delta).await;
        reply_seek(
            ctx,
            result,
            "Reversed to",
            "Can't reverse; not enough time passed in track.",
        )
        .await
    }

    /// Shows the current track and how far into it playback is.
    #[poise::command(
        slash_command,
        prefix_command,
        guild_only,
        aliases("np", "song", "track")
    )]
    pub async fn nowplaying(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let now = shared.lock().await.now_playing()?;
        ctx.send(poise::CreateReply::default().embed(render::now_playing_embed(&now)))
            .await?;
        Ok(())
    }

    async fn reply_seek(
        ctx: poise::Context<'_, BotData, Error>,
        result: Result<Duration>,
        done: &str,
        out_of_range: &str,
    ) -> Result<()> {
        match result {
            Ok(position) => {
                say_music(ctx, format!("{done} {}.", render::format_duration(position))).await
            }
            Err(Error::OutOfRange { .. }) => say_error(ctx, out_of_range).await,
            Err(e) => Err(e),
        }
    }
}

// Re-export all commands
pub use inner::*;
