//! Event stream listener.
//!
//! Keeps one WebSocket open to the node, records the session id it announces and
//! routes player updates and track events to a [`BackendEvents`] sink by guild.
//! A dropped connection is retried with bounded exponential backoff.

use crate::{
    core::{backend::BackendEvents, types::GuildId},
    errors::BackendResult,
    lavalink::{
        LavalinkBackend,
        models::{IncomingMessage, NodeEvent},
    },
};
use futures::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    self, Message,
    client::IntoClientRequest,
    http::{HeaderName, HeaderValue},
};
use tracing::{debug, error, info, warn};

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const CLIENT_NAME: &str = concat!("groove-buddy/", env!("CARGO_PKG_VERSION"));

/// Delay before reconnect attempt number `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    (BASE_BACKOFF * 2u32.pow(exponent)).min(MAX_BACKOFF)
}

/// Listens to one node's event stream.
pub struct EventSocket {
    backend: Arc<LavalinkBackend>,
    events: Arc<dyn BackendEvents>,
}

impl EventSocket {
    /// Creates a listener that feeds `events` and keeps `backend`'s session id current.
    #[must_use]
    pub fn new(backend: Arc<LavalinkBackend>, events: Arc<dyn BackendEvents>) -> Self {
        Self { backend, events }
    }

    /// Runs the listener on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connects, listens and reconnects forever.
    pub async fn run(self) {
        let mut attempt = 0u32;
        loop {
            match self.listen(&mut attempt).await {
                Ok(()) => warn!("Lavalink closed the event stream"),
                Err(e) => error!("Lavalink event stream failed: {e}"),
            }
            self.backend.set_session(None).await;

            attempt = attempt.saturating_add(1);
            let delay = backoff(attempt);
            info!("Reconnecting to Lavalink in {delay:?} (attempt {attempt})");
            tokio::time::sleep(delay).await;
        }
    }

    async fn listen(&self, attempt: &mut u32) -> BackendResult<()> {
        let node = self.backend.node();
        let mut request = node.websocket_url().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in [
            ("authorization", node.password.clone()),
            ("user-id", self.backend.user_id().to_string()),
            ("client-name", CLIENT_NAME.to_string()),
        ] {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!("Connected to Lavalink at {}", node.host);

        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => {
                    let Ok(message) = serde_json::from_str::<IncomingMessage>(text.as_str())
                    else {
                        debug!("ignoring unparseable node message: {}", text.as_str());
                        continue;
                    };
                    if matches!(message, IncomingMessage::Ready { .. }) {
                        *attempt = 0;
                    }
                    self.dispatch(message).await;
                }
                Message::Close(frame) => {
                    debug!(?frame, "node sent close frame");
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Applies one node message.
    pub async fn dispatch(&self, message: IncomingMessage) {
        match message {
            IncomingMessage::Ready {
                resumed,
                session_id,
            } => {
                info!(resumed, "Lavalink session {session_id} ready");
                self.backend.set_session(Some(session_id)).await;
            }
            IncomingMessage::PlayerUpdate { guild_id, state } => {
                if let Some(guild) = parse_guild(&guild_id) {
                    self.events
                        .player_update(guild, Duration::from_millis(state.position))
                        .await;
                }
            }
            IncomingMessage::Event(NodeEvent::TrackStart { guild_id, track }) => {
                if let Some(guild) = parse_guild(&guild_id) {
                    self.events.track_started(guild, track.into()).await;
                }
            }
            IncomingMessage::Event(NodeEvent::TrackEnd {
                guild_id,
                track,
                reason,
            }) => {
                if let Some(guild) = parse_guild(&guild_id) {
                    self.events.track_ended(guild, track.into(), reason).await;
                }
            }
            IncomingMessage::Event(NodeEvent::Other) | IncomingMessage::Other => {}
        }
    }
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    match raw.parse() {
        Ok(id) => Some(GuildId(id)),
        Err(_) => {
            warn!("node sent an invalid guild id `{raw}`");
            None
        }
    }
}
