//! Process-wide mapping from guild to playback session.
//!
//! Each session sits behind its own async mutex; the map itself is a [`DashMap`]
//! so guilds joining and leaving at the same time never contend on one lock. A map
//! guard is never held across an `.await`: callers clone the session handle out of
//! the map first and lock it afterwards.

use crate::{
    core::{
        backend::{AudioBackend, BackendEvents, TrackEndReason, resolve},
        session::{
            IdleHandler, PlayOutcome, PlaybackSession, PlaybackState, SessionContext,
            SessionSettings,
        },
        timer::Generation,
        track::Track,
        types::{ChannelId, GuildId, UserId},
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// A session handle shared between commands and node callbacks.
pub type SharedSession = Arc<Mutex<PlaybackSession>>;

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new voice connection was made
    Joined,
    /// The bot was already in the requested channel
    AlreadyHere,
}

struct RegistryInner {
    sessions: DashMap<GuildId, SharedSession>,
    backend: Arc<dyn AudioBackend>,
    settings: Arc<SessionSettings>,
}

/// Owns every live [`PlaybackSession`]. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.inner.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Creates an empty registry whose sessions talk to `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn AudioBackend>, settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                backend,
                settings: Arc::new(settings),
            }),
        }
    }

    /// Tunables shared by every session.
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Handle of the guild's session, if one exists.
    #[must_use]
    pub fn get(&self, guild: GuildId) -> Option<SharedSession> {
        self.inner
            .sessions
            .get(&guild)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Handle of the guild's session, or [`Error::NotConnected`].
    pub fn session(&self, guild: GuildId) -> Result<SharedSession> {
        self.get(guild).ok_or(Error::NotConnected)
    }

    /// Whether the guild has a session.
    #[must_use]
    pub fn contains(&self, guild: GuildId) -> bool {
        self.inner.sessions.contains_key(&guild)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Whether no guild has a session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Joins `voice` in `guild`, creating the session on first use.
    ///
    /// `voice` is the requesting user's current voice channel. A guild that is
    /// already connected elsewhere reports [`Error::AlreadyConnected`]; a failed
    /// connect leaves no session behind.
    #[instrument(skip(self))]
    pub async fn join(
        &self,
        guild: GuildId,
        voice: Option<ChannelId>,
        text: ChannelId,
    ) -> Result<JoinOutcome> {
        loop {
            if let Some(shared) = self.get(guild) {
                let session = shared.lock().await;
                if !session.is_closed() && session.state() != PlaybackState::Idle {
                    let connected = session.voice_channel();
                    return if voice == Some(connected) {
                        Ok(JoinOutcome::AlreadyHere)
                    } else {
                        Err(Error::AlreadyConnected {
                            channel: connected.0,
                        })
                    };
                }
            }

            let voice = voice.ok_or(Error::NoVoiceTarget)?;
            let shared = Arc::clone(
                self.inner
                    .sessions
                    .entry(guild)
                    .or_insert_with(|| {
                        Arc::new(Mutex::new(PlaybackSession::new(
                            guild,
                            voice,
                            text,
                            self.context(),
                        )))
                    })
                    .value(),
            );

            let mut session = shared.lock().await;
            if session.is_closed() {
                drop(session);
                self.remove_if_same(guild, &shared);
                continue;
            }
            if session.state() != PlaybackState::Idle {
                // Another join won the race; report against its connection.
                continue;
            }

            session.retarget(voice, text);
            return match session.connect().await {
                Ok(()) => Ok(JoinOutcome::Joined),
                Err(e) => {
                    session.close();
                    drop(session);
                    self.remove_if_same(guild, &shared);
                    Err(e)
                }
            };
        }
    }

    /// Queues `query`, joining the requester's channel first if the guild has no
    /// connected session.
    ///
    /// The query is resolved before joining so a search that finds nothing never
    /// pulls the bot into voice.
    #[instrument(skip(self))]
    pub async fn play(
        &self,
        guild: GuildId,
        voice: Option<ChannelId>,
        text: ChannelId,
        query: &str,
        requester: Option<UserId>,
    ) -> Result<PlayOutcome> {
        if let Some(shared) = self.get(guild) {
            let mut session = shared.lock().await;
            if !session.is_closed() && session.state() != PlaybackState::Idle {
                return session.play_request(query, requester).await;
            }
        }

        let resolved = resolve(
            self.inner.backend.as_ref(),
            &self.inner.settings.providers,
            query,
        )
        .await?;
        self.join(guild, voice, text).await?;

        let shared = self.session(guild)?;
        let mut session = shared.lock().await;
        session.enqueue_resolved(resolved, requester).await
    }

    /// Leaves voice and drops the guild's session.
    #[instrument(skip(self))]
    pub async fn leave(&self, guild: GuildId) -> Result<()> {
        let shared = self.session(guild)?;
        let mut session = shared.lock().await;
        session.leave().await?;
        drop(session);
        self.remove_if_same(guild, &shared);
        Ok(())
    }

    /// Idle timer expiry for `guild`; removes the session if `generation` was live.
    #[instrument(skip(self))]
    pub async fn expire_idle(&self, guild: GuildId, generation: Generation) {
        let Some(shared) = self.get(guild) else {
            debug!("idle timer fired for a guild without a session");
            return;
        };
        let mut session = shared.lock().await;
        if session.expire(generation).await {
            drop(session);
            self.remove_if_same(guild, &shared);
            info!(remaining = self.len(), "session removed after idle timeout");
        }
    }

    /// Removes `guild`'s entry only if it still holds `shared`, so a session
    /// created after this one was torn down survives.
    fn remove_if_same(&self, guild: GuildId, shared: &SharedSession) {
        self.inner
            .sessions
            .remove_if(&guild, |_, current| Arc::ptr_eq(current, shared));
    }

    fn context(&self) -> SessionContext {
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let on_idle: IdleHandler = Arc::new(move |guild: GuildId, generation: Generation| {
            let registry = Weak::clone(&registry);
            async move {
                if let Some(inner) = registry.upgrade() {
                    SessionRegistry { inner }
                        .expire_idle(guild, generation)
                        .await;
                }
            }
            .boxed()
        });

        SessionContext {
            backend: Arc::clone(&self.inner.backend),
            settings: Arc::clone(&self.inner.settings),
            on_idle,
        }
    }
}

#[async_trait]
impl BackendEvents for SessionRegistry {
    async fn track_started(&self, guild: GuildId, track: Track) {
        match self.get(guild) {
            Some(shared) => shared.lock().await.on_track_started(track),
            None => debug!(%guild, "dropping track start for a guild without a session"),
        }
    }

    async fn track_ended(&self, guild: GuildId, track: Track, reason: TrackEndReason) {
        match self.get(guild) {
            Some(shared) => shared.lock().await.on_track_ended(&track, reason).await,
            None => debug!(%guild, "dropping track end for a guild without a session"),
        }
    }

    async fn player_update(&self, guild: GuildId, position: Duration) {
        if let Some(shared) = self.get(guild) {
            shared.lock().await.on_player_update(position);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::backend::{SearchProvider, SearchResult},
        test_utils::{Call, MockBackend, sample_track, sample_tracks},
    };

    const GUILD: GuildId = GuildId(7);
    const VOICE: ChannelId = ChannelId(70);
    const TEXT: ChannelId = ChannelId(71);
    const IDLE: Duration = Duration::from_secs(10);

    fn registry(backend: &Arc<MockBackend>) -> SessionRegistry {
        SessionRegistry::new(
            Arc::clone(backend) as Arc<dyn AudioBackend>,
            SessionSettings {
                idle_timeout: IDLE,
                ..SessionSettings::default()
            },
        )
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_join_creates_connected_session() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);

        assert_eq!(registry.join(GUILD, Some(VOICE), TEXT).await?, JoinOutcome::Joined);

        let shared = registry.session(GUILD)?;
        let session = shared.lock().await;
        assert_eq!(session.state(), PlaybackState::Connecting);
        assert_eq!(session.voice_channel(), VOICE);
        assert_eq!(session.text_channel(), TEXT);
        assert_eq!(backend.calls(), vec![Call::Join(GUILD, VOICE)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_join_reports_existing_connection() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);
        registry.join(GUILD, Some(VOICE), TEXT).await?;

        assert_eq!(
            registry.join(GUILD, Some(VOICE), TEXT).await?,
            JoinOutcome::AlreadyHere
        );
        assert!(matches!(
            registry.join(GUILD, Some(ChannelId(99)), TEXT).await,
            Err(Error::AlreadyConnected { channel: 70 })
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(backend.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_join_without_voice_channel() {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);

        assert!(matches!(
            registry.join(GUILD, None, TEXT).await,
            Err(Error::NoVoiceTarget)
        ));
        assert!(registry.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_join_leaves_no_session() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);
        backend.fail_calls("join");

        assert!(matches!(
            registry.join(GUILD, Some(VOICE), TEXT).await,
            Err(Error::ConnectFailure { .. })
        ));
        assert!(!registry.contains(GUILD));

        backend.clear_failures();
        assert_eq!(registry.join(GUILD, Some(VOICE), TEXT).await?, JoinOutcome::Joined);
        Ok(())
    }

    #[tokio::test]
    async fn test_leave_removes_session() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);

        assert!(matches!(registry.leave(GUILD).await, Err(Error::NotConnected)));

        registry.join(GUILD, Some(VOICE), TEXT).await?;
        let shared = registry.session(GUILD)?;
        registry.leave(GUILD).await?;

        assert!(registry.is_empty());
        assert!(shared.lock().await.is_closed());
        assert!(backend.calls().contains(&Call::Leave(GUILD)));
        Ok(())
    }

    #[tokio::test]
    async fn test_sessions_are_independent_per_guild() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);
        let other = GuildId(8);

        registry.join(GUILD, Some(VOICE), TEXT).await?;
        registry.join(other, Some(ChannelId(80)), TEXT).await?;
        registry.leave(GUILD).await?;

        assert!(!registry.contains(GUILD));
        assert!(registry.contains(other));
        Ok(())
    }

    #[tokio::test]
    async fn test_play_joins_when_needed() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        backend.script_search(
            SearchProvider::Direct,
            SearchResult::Track(sample_track("song", 120)),
        );
        let registry = registry(&backend);

        let outcome = registry
            .play(GUILD, Some(VOICE), TEXT, "song", Some(UserId(3)))
            .await?;

        assert_eq!(outcome.started.unwrap().info.title, "song");
        let shared = registry.session(GUILD)?;
        assert_eq!(shared.lock().await.state(), PlaybackState::Playing);
        let calls = backend.calls();
        assert_eq!(calls.first(), Some(&Call::Join(GUILD, VOICE)));
        assert!(calls.contains(&Call::Play(GUILD, "song".to_string())));
        Ok(())
    }

    #[tokio::test]
    async fn test_play_without_matches_does_not_join() {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);

        let result = registry.play(GUILD, Some(VOICE), TEXT, "nothing", None).await;

        assert!(matches!(result, Err(Error::NoMatches { .. })));
        assert!(registry.is_empty());
        assert!(!backend.calls().iter().any(|c| matches!(c, Call::Join(..))));
    }

    #[tokio::test]
    async fn test_callbacks_without_session_are_dropped() {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);

        registry.track_started(GUILD, sample_track("a", 10)).await;
        registry
            .track_ended(GUILD, sample_track("a", 10), TrackEndReason::Finished)
            .await;
        registry.player_update(GUILD, Duration::from_secs(3)).await;

        assert!(registry.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_track_end_is_routed_to_session() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        backend.script_search(
            SearchProvider::Direct,
            SearchResult::Playlist {
                name: "mix".to_string(),
                tracks: sample_tracks(2),
            },
        );
        let registry = registry(&backend);
        registry.play(GUILD, Some(VOICE), TEXT, "mix", None).await?;

        registry
            .track_ended(GUILD, sample_tracks(1).remove(0), TrackEndReason::Finished)
            .await;

        assert_eq!(backend.played_titles(), vec!["track 1", "track 2"]);
        let shared = registry.session(GUILD)?;
        assert_eq!(shared.lock().await.current().unwrap().info.title, "track 2");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_removed_after_timeout() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);
        registry.join(GUILD, Some(VOICE), TEXT).await?;

        tokio::time::sleep(IDLE - Duration::from_secs(1)).await;
        assert!(registry.contains(GUILD));

        tokio::time::sleep(Duration::from_secs(2)).await;
        wait_until(|| registry.is_empty()).await;

        assert!(registry.is_empty());
        assert!(backend.calls().contains(&Call::Leave(GUILD)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_playing_defuses_idle_timer() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        backend.script_search(
            SearchProvider::Direct,
            SearchResult::Track(sample_track("long", 600)),
        );
        let registry = registry(&backend);
        registry.join(GUILD, Some(VOICE), TEXT).await?;
        registry.play(GUILD, Some(VOICE), TEXT, "long", None).await?;

        tokio::time::sleep(IDLE * 3).await;
        tokio::task::yield_now().await;

        assert!(registry.contains(GUILD));
        assert!(!backend.calls().contains(&Call::Leave(GUILD)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_does_not_remove_rearmed_session() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        backend.script_search(
            SearchProvider::Direct,
            SearchResult::Track(sample_track("short", 30)),
        );
        let registry = registry(&backend);
        // Generation 1 is armed on join and defused when the track starts.
        registry.play(GUILD, Some(VOICE), TEXT, "short", None).await?;
        // Generation 2 is armed when the queue runs dry.
        registry
            .track_ended(GUILD, sample_track("short", 30), TrackEndReason::Finished)
            .await;

        registry.expire_idle(GUILD, Generation(1)).await;
        assert!(registry.contains(GUILD));

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        wait_until(|| registry.is_empty()).await;
        assert!(registry.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_keep_batches_contiguous() -> Result<()> {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(&backend);
        let mut queries = Vec::new();
        for batch in 0..4 {
            let name = format!("mix {batch}");
            let tracks: Vec<Track> = (1..=5)
                .map(|part| sample_track(&format!("mix {batch} part {part}"), 60))
                .collect();
            backend.script_query(
                &name,
                SearchResult::Playlist {
                    name: name.clone(),
                    tracks,
                },
            );
            queries.push(name);

            let single = format!("single {batch}");
            backend.script_query(&single, SearchResult::Track(sample_track(&single, 60)));
            queries.push(single);
        }

        let requests: Vec<_> = queries
            .into_iter()
            .map(|query| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .play(GUILD, Some(VOICE), TEXT, &query, None)
                        .await
                        .map(|_| ())
                })
            })
            .collect();
        let finisher = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                    let Some(shared) = registry.get(GUILD) else {
                        continue;
                    };
                    let current = shared.lock().await.current().cloned();
                    if let Some(current) = current {
                        registry
                            .track_ended(GUILD, current, TrackEndReason::Finished)
                            .await;
                    }
                }
            })
        };
        for request in requests {
            request.await.unwrap()?;
        }
        finisher.await.unwrap();

        // Everything played so far left the queue front first, so played titles
        // followed by the remaining queue is the admission order.
        let shared = registry.session(GUILD)?;
        let snapshot = shared.lock().await.snapshot(100)?;
        let mut order = backend.played_titles();
        order.extend(snapshot.upcoming.iter().map(|t| t.info.title.clone()));

        assert_eq!(order.len(), 24);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|call| matches!(call, Call::Join(..)))
                .count(),
            1
        );
        for batch in 0..4 {
            let start = order
                .iter()
                .position(|title| *title == format!("mix {batch} part 1"))
                .unwrap();
            let expected: Vec<String> = (1..=5)
                .map(|part| format!("mix {batch} part {part}"))
                .collect();
            assert_eq!(order[start..start + 5], expected[..], "batch {batch} was split");
        }
        Ok(())
    }
}
