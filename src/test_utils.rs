//! Shared test utilities for `GrooveBuddy`.
//!
//! [`MockBackend`] stands in for the audio node: it records every request, answers
//! searches from a script and can be told to refuse particular requests.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        backend::{AudioBackend, SearchProvider, SearchResult},
        session::{IdleHandler, SessionContext, SessionSettings},
        timer::Generation,
        track::{Track, TrackInfo},
        types::{ChannelId, GuildId},
    },
    errors::{BackendError, BackendResult},
};
use async_trait::async_trait;
use futures::FutureExt;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

/// One request received by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `join(guild, channel)`
    Join(GuildId, ChannelId),
    /// `leave(guild)`
    Leave(GuildId),
    /// `search(provider, query)`
    Search(SearchProvider, String),
    /// `play(guild, track)`, recorded by title
    Play(GuildId, String),
    /// `pause(guild)`
    Pause(GuildId),
    /// `resume(guild)`
    Resume(GuildId),
    /// `stop(guild)`
    Stop(GuildId),
    /// `seek(guild, position)`
    Seek(GuildId, Duration),
    /// `set_volume(guild, level)`
    Volume(GuildId, u16),
}

impl Call {
    const fn op(&self) -> &'static str {
        match self {
            Self::Join(..) => "join",
            Self::Leave(..) => "leave",
            Self::Search(..) => "search",
            Self::Play(..) => "play",
            Self::Pause(..) => "pause",
            Self::Resume(..) => "resume",
            Self::Stop(..) => "stop",
            Self::Seek(..) => "seek",
            Self::Volume(..) => "volume",
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    searches: HashMap<SearchProvider, SearchResult>,
    queries: HashMap<String, SearchResult>,
    failing: HashSet<&'static str>,
}

/// Recording in-memory audio backend.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// A backend that accepts everything and finds nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Titles passed to `play`/`skip`, in order.
    pub fn played_titles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Play(_, title) => Some(title),
                _ => None,
            })
            .collect()
    }

    /// Providers searched so far, in order.
    pub fn searched_providers(&self) -> Vec<SearchProvider> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search(provider, _) => Some(provider),
                _ => None,
            })
            .collect()
    }

    /// Answers every search on `provider` with `result`. Unscripted providers
    /// return [`SearchResult::Empty`].
    pub fn script_search(&self, provider: SearchProvider, result: SearchResult) {
        self.state.lock().unwrap().searches.insert(provider, result);
    }

    /// Answers searches for exactly `query` with `result` on every provider,
    /// ahead of anything scripted per provider.
    pub fn script_query(&self, query: &str, result: SearchResult) {
        self.state
            .lock()
            .unwrap()
            .queries
            .insert(query.to_string(), result);
    }

    /// Makes every later request of kind `op` fail until [`Self::clear_failures`].
    pub fn fail_calls(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    /// Accepts every request again.
    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    fn record(&self, call: Call) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(BackendError::Status {
                status: 500,
                message: format!("{op} refused"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> BackendResult<()> {
        self.record(Call::Join(guild, channel))
    }

    async fn leave(&self, guild: GuildId) -> BackendResult<()> {
        self.record(Call::Leave(guild))
    }

    async fn search(
        &self,
        provider: SearchProvider,
        query: &str,
    ) -> BackendResult<SearchResult> {
        self.record(Call::Search(provider, query.to_string()))?;
        // Give concurrent callers a chance to run, like a real round trip would.
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .queries
            .get(query)
            .or_else(|| state.searches.get(&provider))
            .cloned()
            .unwrap_or(SearchResult::Empty))
    }

    async fn play(&self, guild: GuildId, track: &Track) -> BackendResult<()> {
        self.record(Call::Play(guild, track.info.title.clone()))?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn pause(&self, guild: GuildId) -> BackendResult<()> {
        self.record(Call::Pause(guild))
    }

    async fn resume(&self, guild: GuildId) -> BackendResult<()> {
        self.record(Call::Resume(guild))
    }

    async fn stop(&self, guild: GuildId) -> BackendResult<()> {
        self.record(Call::Stop(guild))
    }

    async fn seek(&self, guild: GuildId, position: Duration) -> BackendResult<()> {
        self.record(Call::Seek(guild, position))
    }

    async fn set_volume(&self, guild: GuildId, level: u16) -> BackendResult<()> {
        self.record(Call::Volume(guild, level))
    }
}

/// Creates a track with sensible defaults.
///
/// # Defaults
/// * `encoded`: `"enc:<title>"`
/// * `author`: `"tester"`
pub fn sample_track(title: &str, secs: u64) -> Track {
    Track::new(
        format!("enc:{title}"),
        TrackInfo {
            title: title.to_string(),
            author: "tester".to_string(),
            uri: Some(format!("https://example.com/{}", title.replace(' ', "-"))),
            artwork_url: None,
            duration: Duration::from_secs(secs),
            is_stream: false,
        },
    )
}

/// `count` one-minute tracks titled `"track 1"` to `"track <count>"`.
pub fn sample_tracks(count: usize) -> Vec<Track> {
    (1..=count)
        .map(|i| sample_track(&format!("track {i}"), 60))
        .collect()
}

/// Session collaborators backed by `backend`, with default settings and an idle
/// handler that does nothing.
pub fn session_context(backend: &Arc<MockBackend>) -> SessionContext {
    let on_idle: IdleHandler =
        Arc::new(|_: GuildId, _: Generation| futures::future::ready(()).boxed());
    SessionContext {
        backend: Arc::clone(backend) as Arc<dyn AudioBackend>,
        settings: Arc::new(SessionSettings::default()),
        on_idle,
    }
}
