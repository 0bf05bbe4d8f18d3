//! Audio node client for a Lavalink v4 server.
//!
//! Requests go over the node's REST API; track lifecycle events arrive on its
//! WebSocket (see [`socket`]). The voice handshake with the chat gateway is done by
//! songbird in gateway-only mode and the resulting credentials are handed to the
//! node, which streams the audio itself.

/// Wire types of the REST API and the event stream
pub mod models;
/// Event stream listener
pub mod socket;

use crate::{
    config::NodeConfig,
    core::{
        backend::{AudioBackend, SearchProvider, SearchResult},
        track::Track,
        types::{ChannelId, GuildId},
    },
    errors::{BackendError, BackendResult},
};
use async_trait::async_trait;
use models::{ErrorResponse, LoadResult, PlayerUpdate, UpdateTrack, VoiceState};
use reqwest::{Response, header::AUTHORIZATION};
use songbird::{Songbird, error::JoinError};
use std::{num::NonZeroU64, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// [`AudioBackend`] backed by one Lavalink node.
pub struct LavalinkBackend {
    http: reqwest::Client,
    node: NodeConfig,
    user_id: u64,
    session_id: RwLock<Option<String>>,
    voice: Arc<Songbird>,
}

impl std::fmt::Debug for LavalinkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LavalinkBackend")
            .field("node", &self.node.host)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl LavalinkBackend {
    /// Creates a client for `node`, acting as bot user `user_id`.
    #[must_use]
    pub fn new(node: NodeConfig, user_id: u64, voice: Arc<Songbird>) -> Self {
        Self {
            http: reqwest::Client::new(),
            node,
            user_id,
            session_id: RwLock::new(None),
            voice,
        }
    }

    /// Node endpoint this client talks to.
    #[must_use]
    pub const fn node(&self) -> &NodeConfig {
        &self.node
    }

    /// Bot user id sent with the WebSocket handshake.
    #[must_use]
    pub const fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Records the session id from the node's `ready` message.
    pub async fn set_session(&self, session_id: Option<String>) {
        *self.session_id.write().await = session_id;
    }

    async fn session(&self) -> BackendResult<String> {
        self.session_id
            .read()
            .await
            .clone()
            .ok_or(BackendError::NotReady)
    }

    async fn player_url(&self, guild: GuildId) -> BackendResult<String> {
        let session = self.session().await?;
        Ok(format!(
            "{}/sessions/{session}/players/{guild}",
            self.node.rest_base()
        ))
    }

    async fn update_player(&self, guild: GuildId, update: &PlayerUpdate) -> BackendResult<()> {
        let url = self.player_url(guild).await?;
        debug!(%guild, ?update, "updating player");
        let response = self
            .http
            .patch(url)
            .header(AUTHORIZATION, &self.node.password)
            .json(update)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn destroy_player(&self, guild: GuildId) -> BackendResult<()> {
        let url = self.player_url(guild).await?;
        let response = self
            .http
            .delete(url)
            .header(AUTHORIZATION, &self.node.password)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }
}

/// Turns a non-success response into [`BackendError::Status`].
async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

fn voice_ids(
    guild: GuildId,
    channel: Option<ChannelId>,
) -> BackendResult<(songbird::id::GuildId, Option<songbird::id::ChannelId>)> {
    let guild = NonZeroU64::new(guild.0)
        .ok_or_else(|| BackendError::Voice("guild id must not be zero".to_string()))?;
    let channel = channel
        .map(|channel| {
            NonZeroU64::new(channel.0)
                .ok_or_else(|| BackendError::Voice("channel id must not be zero".to_string()))
        })
        .transpose()?;
    Ok((guild.into(), channel.map(Into::into)))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl AudioBackend for LavalinkBackend {
    #[instrument(skip(self))]
    async fn join(&self, guild: GuildId, channel: ChannelId) -> BackendResult<()> {
        let (voice_guild, voice_channel) = voice_ids(guild, Some(channel))?;
        let voice_channel =
            voice_channel.ok_or_else(|| BackendError::Voice("missing channel".to_string()))?;
        // Fail before touching voice if the node never said hello.
        self.session().await?;

        let (info, _call) = self
            .voice
            .join_gateway(voice_guild, voice_channel)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        let update = PlayerUpdate {
            voice: Some(VoiceState {
                token: info.token,
                endpoint: info.endpoint,
                session_id: info.session_id,
            }),
            ..PlayerUpdate::default()
        };
        if let Err(e) = self.update_player(guild, &update).await {
            if let Err(leave) = self.voice.remove(voice_guild).await {
                warn!(%guild, "could not leave voice after node refused it: {leave}");
            }
            return Err(e);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn leave(&self, guild: GuildId) -> BackendResult<()> {
        let (voice_guild, _) = voice_ids(guild, None)?;
        if let Err(e) = self.destroy_player(guild).await {
            warn!(%guild, "could not destroy player: {e}");
        }
        match self.voice.remove(voice_guild).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(BackendError::Voice(e.to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn search(&self, provider: SearchProvider, query: &str) -> BackendResult<SearchResult> {
        let identifier = format!("{}{query}", provider.prefix());
        let response = self
            .http
            .get(format!("{}/loadtracks", self.node.rest_base()))
            .header(AUTHORIZATION, &self.node.password)
            .query(&[("identifier", identifier)])
            .send()
            .await?;
        let result: LoadResult = check(response).await?.json().await?;
        Ok(result.into())
    }

    async fn play(&self, guild: GuildId, track: &Track) -> BackendResult<()> {
        let update = PlayerUpdate {
            track: Some(UpdateTrack {
                encoded: Some(track.encoded.clone()),
            }),
            paused: Some(false),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }

    async fn pause(&self, guild: GuildId) -> BackendResult<()> {
        let update = PlayerUpdate {
            paused: Some(true),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }

    async fn resume(&self, guild: GuildId) -> BackendResult<()> {
        let update = PlayerUpdate {
            paused: Some(false),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }

    async fn stop(&self, guild: GuildId) -> BackendResult<()> {
        let update = PlayerUpdate {
            track: Some(UpdateTrack { encoded: None }),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }

    async fn seek(&self, guild: GuildId, position: Duration) -> BackendResult<()> {
        let update = PlayerUpdate {
            position: Some(millis(position)),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }

    async fn set_volume(&self, guild: GuildId, level: u16) -> BackendResult<()> {
        let update = PlayerUpdate {
            volume: Some(level),
            ..PlayerUpdate::default()
        };
        self.update_player(guild, &update).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_voice_ids_reject_zero() {
        assert!(voice_ids(GuildId(0), None).is_err());
        assert!(voice_ids(GuildId(1), Some(ChannelId(0))).is_err());

        let (guild, channel) = voice_ids(GuildId(5), Some(ChannelId(6))).unwrap();
        assert_eq!(guild, songbird::id::GuildId::from(NonZeroU64::new(5).unwrap()));
        assert_eq!(
            channel,
            Some(songbird::id::ChannelId::from(NonZeroU64::new(6).unwrap()))
        );
    }

    #[tokio::test]
    async fn test_requests_wait_for_ready() {
        let backend = LavalinkBackend::new(NodeConfig::default(), 1, Songbird::serenity());

        let result = backend.pause(GuildId(5)).await;
        assert!(matches!(result, Err(BackendError::NotReady)));

        backend.set_session(Some("abc".to_string())).await;
        assert_eq!(
            backend.player_url(GuildId(5)).await.unwrap(),
            "http://127.0.0.1:2333/v4/sessions/abc/players/5"
        );
    }
}
