//! Queue commands - listing, clearing, removing and shuffling upcoming tracks.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            commands::{channel_name, guild_id, say_error, say_music},
            render,
        },
        errors::{Error, Result},
    };

    /// Shows the current track and what is queued after it.
    #[poise::command(slash_command, prefix_command, guild_only, aliases("q"))]
    pub async fn queue(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let page_size = ctx.data().settings.player.queue_page_size;
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let (snapshot, channel) = {
            let session = shared.lock().await;
            (session.snapshot(page_size)?, session.voice_channel())
        };

        let embed = render::queue_embed(&channel_name(ctx, channel), &snapshot);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Removes every upcoming track. The current track keeps playing.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn clear(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let count = shared.lock().await.clear_queue()?;
        say_music(
            ctx,
            format!("Cleared {count} track{} from queue.", render::plural(count)),
        )
        .await
    }

    /// Removes the tracks at positions `start` through `end`, or only `start`.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn remove(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "First queue position to remove"] start: usize,
        #[description = "Last queue position to remove"] end: Option<usize>,
    ) -> Result<()> {
        let end = end.unwrap_or(start);
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let result = shared.lock().await.remove_range(start, end);

        let removed = match result {
            Ok(removed) => removed,
            Err(Error::OutOfRange { max, .. }) => {
                return say_error(ctx, format!("Positions must be between 1 and {max}.")).await;
            }
            Err(e) => return Err(e),
        };

        match removed.as_slice() {
            [track] => {
                say_music(
                    ctx,
                    format!("Removed **{start}. {}** from queue.", render::track_link(track)),
                )
                .await
            }
            tracks => say_music(ctx, format!("Removed {} tracks from queue.", tracks.len())).await,
        }
    }

    /// Shuffles the upcoming tracks.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn shuffle(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let shared = ctx.data().registry.session(guild_id(ctx)?)?;
        let next = shared.lock().await.shuffle_queue()?;
        say_music(
            ctx,
            format!("Shuffled the queue. Up next: {}", render::track_link(&next)),
        )
        .await
    }
}

// Re-export all commands
pub use inner::*;
