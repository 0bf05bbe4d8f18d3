//! Framework options, the command error handler and client startup.

use crate::{
    bot::{BotData, commands, render},
    config::AppConfig,
    core::{backend::AudioBackend, registry::SessionRegistry},
    errors::Error,
    lavalink::{LavalinkBackend, socket::EventSocket},
};
use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            panic!("Failed to start bot: {error:?}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            match &error {
                Error::ConnectFailure { .. } => {
                    warn!("Command `{}` failed at the audio node: {error}", ctx.command().name);
                }
                Error::Config { .. } | Error::EnvVar(_) | Error::Io(_) | Error::Framework(_) => {
                    error!("Error in command `{}`: {error:?}", ctx.command().name);
                }
                _ => debug!("Command `{}` rejected: {error}", ctx.command().name),
            }
            let reply = poise::CreateReply::default()
                .embed(render::error_embed(render::describe_error(&error)));
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to the chat gateway and runs until the client stops.
///
/// The audio node client needs the bot's user id, so it is created in the
/// framework setup once the gateway reported ready; its event listener is spawned
/// there too.
#[instrument(skip(token, config))]
pub async fn run_bot(token: String, config: AppConfig) -> Result<(), serenity::Error> {
    let AppConfig { settings, node } = config;
    let settings = Arc::new(settings);
    let voice = Songbird::serenity();
    let prefix = settings.bot.prefix.clone();

    let setup_settings = Arc::clone(&settings);
    let setup_voice = Arc::clone(&voice);
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let backend = Arc::new(LavalinkBackend::new(
                    node,
                    ready.user.id.get(),
                    setup_voice,
                ));
                let registry = SessionRegistry::new(
                    Arc::clone(&backend) as Arc<dyn AudioBackend>,
                    setup_settings.session_settings(),
                );
                EventSocket::new(backend, Arc::new(registry.clone())).spawn();
                info!("Audio node listener started");

                Ok(BotData::new(registry, setup_settings))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT; // prefix commands

    info!("Setting up Serenity client for Poise framework...");
    let client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .register_songbird_with(voice)
        .await;

    match client {
        Ok(mut c) => {
            info!("Starting bot client...");
            if let Err(why) = c.start().await {
                error!("Client error: {why:?}");
                return Err(why);
            }
        }
        Err(e) => {
            error!("Error creating client: {e:?}");
            return Err(e);
        }
    }
    Ok(())
}
