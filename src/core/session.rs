//! Per-guild playback session.
//!
//! A [`PlaybackSession`] owns the queue, the skip votes, the idle timer and the
//! current track of one guild. It is always reached through the session registry
//! behind a single async mutex, so every operation and every node callback runs to
//! completion before the next one starts. State only advances after the audio node
//! accepted the corresponding request; a failed request leaves the session as it was.

use crate::{
    core::{
        backend::{AudioBackend, Resolved, SearchProvider, TrackEndReason, resolve},
        queue::TrackQueue,
        timer::{DisconnectTimer, Generation},
        track::Track,
        types::{ChannelId, ChannelMember, GuildId, UserId},
        votes::{VoteResult, VoteSet},
    },
    errors::{Error, Result},
};
use futures::future::BoxFuture;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Highest accepted volume, in percent.
pub const MAX_VOLUME: u16 = 150;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Not connected to voice
    Idle,
    /// Connected, no track has started yet
    Connecting,
    /// A track is playing
    Playing,
    /// A track is paused
    Paused,
    /// Connected with nothing playing
    Stopped,
}

/// Tunables shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// How long a session may sit without a track before leaving voice
    pub idle_timeout: Duration,
    /// Search fallback chain
    pub providers: Vec<SearchProvider>,
    /// Volume reported for a fresh session
    pub default_volume: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            providers: vec![SearchProvider::Direct, SearchProvider::YouTube],
            default_volume: 100,
        }
    }
}

/// Invoked when a session's idle timer expires.
pub type IdleHandler = Arc<dyn Fn(GuildId, Generation) -> BoxFuture<'static, ()> + Send + Sync>;

/// Collaborators every session is built with.
#[derive(Clone)]
pub struct SessionContext {
    /// Audio node client
    pub backend: Arc<dyn AudioBackend>,
    /// Shared tunables
    pub settings: Arc<SessionSettings>,
    /// Auto-leave callback
    pub on_idle: IdleHandler,
}

/// What a play request added to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// A single track at a 1-based queue position
    Track {
        /// The queued track
        track: Track,
        /// Position in the queue when it was added
        position: usize,
    },
    /// A whole collection
    Playlist {
        /// Collection name
        name: String,
        /// Number of tracks added
        count: usize,
        /// Combined length of the added tracks
        total_duration: Duration,
        /// First track of the collection, for artwork
        first: Track,
    },
}

/// Result of a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    /// What was queued
    pub enqueued: Enqueued,
    /// The track that started because nothing was playing
    pub started: Option<Track>,
}

/// Result of a skip vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote counted but quorum is not reached yet
    Pending {
        /// Distinct votes so far
        votes: usize,
        /// Votes required
        needed: usize,
    },
    /// Quorum reached and the track was skipped
    Skipped {
        /// The track that was playing
        skipped: Track,
        /// The track that replaced it, if the queue had one
        next: Option<Track>,
    },
}

/// Result of stopping playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    /// The track that was playing
    pub stopped: Option<Track>,
    /// Queued tracks dropped with it
    pub cleared: usize,
}

/// The current track and its playhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Current track
    pub track: Track,
    /// Estimated playhead
    pub position: Duration,
    /// Whether playback is paused
    pub paused: bool,
}

/// Display view of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Current track, if any
    pub now_playing: Option<NowPlaying>,
    /// First tracks of the queue in order
    pub upcoming: Vec<Track>,
    /// Number of queued tracks not included in `upcoming`
    pub hidden: usize,
    /// Time left on the current track plus every queued track
    pub remaining: Duration,
}

/// Playhead extrapolated from the last known position.
#[derive(Debug, Clone, Copy, Default)]
struct Playhead {
    base: Duration,
    running_since: Option<Instant>,
}

impl Playhead {
    fn running(at: Duration) -> Self {
        Self {
            base: at,
            running_since: Some(Instant::now()),
        }
    }

    fn frozen(at: Duration) -> Self {
        Self {
            base: at,
            running_since: None,
        }
    }

    fn position(&self) -> Duration {
        self.base + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }

    fn freeze(&mut self) {
        *self = Self::frozen(self.position());
    }

    fn run(&mut self) {
        *self = Self::running(self.position());
    }
}

/// One guild's playback aggregate.
pub struct PlaybackSession {
    guild: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    state: PlaybackState,
    closed: bool,
    current: Option<Track>,
    playhead: Playhead,
    volume: u16,
    queue: TrackQueue,
    votes: VoteSet,
    timer: DisconnectTimer,
    context: SessionContext,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("guild", &self.guild)
            .field("voice_channel", &self.voice_channel)
            .field("state", &self.state)
            .field("current", &self.current.as_ref().map(|t| &t.info.title))
            .field("queued", &self.queue.len())
            .field("votes", &self.votes.count())
            .field("idle_timer_armed", &self.timer.is_armed())
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Creates an unconnected session for `guild`.
    #[must_use]
    pub fn new(
        guild: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        context: SessionContext,
    ) -> Self {
        let volume = context.settings.default_volume;
        Self {
            guild,
            voice_channel,
            text_channel,
            state: PlaybackState::Idle,
            closed: false,
            current: None,
            playhead: Playhead::default(),
            volume,
            queue: TrackQueue::new(),
            votes: VoteSet::new(),
            timer: DisconnectTimer::new(),
            context,
        }
    }

    /// Guild this session belongs to.
    #[must_use]
    pub const fn guild(&self) -> GuildId {
        self.guild
    }

    /// Voice channel the bot is in.
    #[must_use]
    pub const fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    /// Text channel status messages go to.
    #[must_use]
    pub const fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the session was torn down and must not be used again.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current track, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Current volume in percent.
    #[must_use]
    pub const fn volume(&self) -> u16 {
        self.volume
    }

    /// Number of queued tracks.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of skip votes cast for the current track.
    #[must_use]
    pub fn vote_count(&self) -> usize {
        self.votes.count()
    }

    /// Whether the idle auto-leave timer is running.
    #[must_use]
    pub fn idle_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Estimated playhead of the current track, clamped to its length.
    #[must_use]
    pub fn position(&self) -> Duration {
        let position = self.playhead.position();
        match &self.current {
            Some(track) if !track.info.is_stream => position.min(track.duration()),
            _ => position,
        }
    }

    /// Points an unconnected session at other channels before connecting.
    pub fn retarget(&mut self, voice_channel: ChannelId, text_channel: ChannelId) {
        if self.state == PlaybackState::Idle {
            self.voice_channel = voice_channel;
            self.text_channel = text_channel;
        }
    }

    /// Connects to the voice channel: `Idle -> Connecting`.
    ///
    /// Arms the idle timer so a session that never plays anything still leaves.
    pub async fn connect(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state != PlaybackState::Idle {
            return Err(Error::AlreadyConnected {
                channel: self.voice_channel.0,
            });
        }

        self.context
            .backend
            .join(self.guild, self.voice_channel)
            .await?;

        self.state = PlaybackState::Connecting;
        self.arm_idle_timer();
        info!(guild = %self.guild, channel = %self.voice_channel, "joined voice channel");
        Ok(())
    }

    /// Leaves voice and tears the session down.
    ///
    /// If the node refuses, the session stays connected.
    pub async fn leave(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.context.backend.leave(self.guild).await?;
        self.close();
        info!(guild = %self.guild, "left voice channel");
        Ok(())
    }

    /// Handles expiry of the idle timer instance `generation`.
    ///
    /// Returns `true` when the session left voice; a stale generation does nothing.
    pub async fn expire(&mut self, generation: Generation) -> bool {
        if self.closed || !self.timer.complete(generation) {
            debug!(guild = %self.guild, generation = generation.0, "ignoring stale idle timer");
            return false;
        }

        if let Err(e) = self.context.backend.leave(self.guild).await {
            warn!(guild = %self.guild, "node refused idle leave, dropping session anyway: {e}");
        }
        self.close();
        info!(guild = %self.guild, "left voice channel after idle timeout");
        true
    }

    /// Marks the session dead and drops everything it owns.
    pub fn close(&mut self) {
        self.timer.defuse();
        self.queue.clear();
        self.votes.reset();
        self.current = None;
        self.playhead = Playhead::default();
        self.state = PlaybackState::Idle;
        self.closed = true;
    }

    /// Resolves `query` through the provider chain without touching the session.
    pub async fn search(&self, query: &str) -> Result<Resolved> {
        resolve(
            self.context.backend.as_ref(),
            &self.context.settings.providers,
            query,
        )
        .await
    }

    /// Resolves `query`, queues the result and starts playback if nothing is playing.
    pub async fn play_request(
        &mut self,
        query: &str,
        requester: Option<UserId>,
    ) -> Result<PlayOutcome> {
        self.ensure_connected()?;
        let resolved = self.search(query).await?;
        self.enqueue_resolved(resolved, requester).await
    }

    /// Queues already-resolved tracks and starts playback if nothing is playing.
    pub async fn enqueue_resolved(
        &mut self,
        resolved: Resolved,
        requester: Option<UserId>,
    ) -> Result<PlayOutcome> {
        self.ensure_connected()?;
        let attribute = |track: Track| match requester {
            Some(user) => track.requested_by(user),
            None => track,
        };

        let enqueued = match resolved {
            Resolved::Single(track) => {
                let track = attribute(track);
                let position = self.queue.enqueue(track.clone());
                Enqueued::Track { track, position }
            }
            Resolved::Playlist { name, tracks } => {
                let tracks: Vec<Track> = tracks.into_iter().map(attribute).collect();
                let total_duration = crate::core::track::total_duration(&tracks);
                let first = tracks.first().cloned().ok_or_else(|| Error::NoMatches {
                    query: name.clone(),
                })?;
                let count = self.queue.enqueue_many(tracks);
                Enqueued::Playlist {
                    name,
                    count,
                    total_duration,
                    first,
                }
            }
        };
        debug!(guild = %self.guild, queued = self.queue.len(), "enqueued");

        let started = self.start_next_if_idle().await?;
        Ok(PlayOutcome { enqueued, started })
    }

    /// Pauses the current track: `Playing -> Paused`.
    pub async fn pause(&mut self) -> Result<Track> {
        self.ensure_connected()?;
        let track = match (&self.current, self.state) {
            (Some(track), PlaybackState::Playing) => track.clone(),
            _ => return Err(Error::NotPlaying),
        };

        self.context.backend.pause(self.guild).await?;
        self.state = PlaybackState::Paused;
        self.playhead.freeze();
        Ok(track)
    }

    /// Resumes the current track: `Paused -> Playing`.
    pub async fn resume(&mut self) -> Result<Track> {
        self.ensure_connected()?;
        let track = match (&self.current, self.state) {
            (Some(track), PlaybackState::Paused) => track.clone(),
            _ => return Err(Error::NotPaused),
        };

        self.context.backend.resume(self.guild).await?;
        self.state = PlaybackState::Playing;
        self.playhead.run();
        Ok(track)
    }

    /// Stops playback and empties the queue: `Playing/Paused -> Stopped`.
    ///
    /// A connected session whose first track never started can be stopped too,
    /// which drops the tracks still waiting in its queue.
    pub async fn stop(&mut self) -> Result<StopOutcome> {
        self.ensure_connected()?;
        let stranded = self.state == PlaybackState::Connecting && !self.queue.is_empty();
        if !stranded && !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(Error::NothingPlaying);
        }

        if self.current.is_some() {
            self.context.backend.stop(self.guild).await?;
        }
        let cleared = self.queue.clear();
        let stopped = self.current.take();
        self.enter_stopped();
        info!(guild = %self.guild, cleared, "playback stopped");
        Ok(StopOutcome { stopped, cleared })
    }

    /// Casts a vote to skip the current track.
    ///
    /// Only non-bot members of the voice channel are eligible. Once half of them,
    /// rounded up, have voted the track is replaced by the queue front, or playback
    /// stops when the queue is empty.
    pub async fn vote_skip(
        &mut self,
        voter: UserId,
        members: &[ChannelMember],
    ) -> Result<VoteOutcome> {
        self.ensure_connected()?;
        let skipped = match (&self.current, self.state) {
            (Some(track), PlaybackState::Playing) => track.clone(),
            _ => return Err(Error::NotPlaying),
        };

        let eligible = members.iter().filter(|m| !m.is_bot).count();
        if !members.iter().any(|m| !m.is_bot && m.id == voter) {
            return Err(Error::NotInChannel);
        }
        if self.votes.try_add_vote(voter) == VoteResult::AlreadyVoted {
            return Err(Error::DuplicateVote);
        }

        if !self.votes.has_quorum(eligible) {
            return Ok(VoteOutcome::Pending {
                votes: self.votes.count(),
                needed: VoteSet::threshold(eligible),
            });
        }

        info!(guild = %self.guild, title = %skipped.info.title, "skip vote passed");
        if let Some(next) = self.queue.try_dequeue_front() {
            if let Err(e) = self.context.backend.skip(self.guild, &next).await {
                self.queue.restore_front(next);
                self.votes.remove(voter);
                return Err(e.into());
            }
            self.begin(next.clone());
            Ok(VoteOutcome::Skipped {
                skipped,
                next: Some(next),
            })
        } else {
            if let Err(e) = self.context.backend.stop(self.guild).await {
                self.votes.remove(voter);
                return Err(e.into());
            }
            self.current = None;
            self.enter_stopped();
            Ok(VoteOutcome::Skipped {
                skipped,
                next: None,
            })
        }
    }

    /// Sets the playback volume in percent, `0..=150`.
    pub async fn set_volume(&mut self, level: i64) -> Result<u16> {
        self.ensure_connected()?;
        let volume = u16::try_from(level)
            .ok()
            .filter(|v| *v <= MAX_VOLUME)
            .ok_or(Error::OutOfRange {
                value: level,
                min: 0,
                max: i64::from(MAX_VOLUME),
            })?;

        self.context.backend.set_volume(self.guild, volume).await?;
        self.volume = volume;
        Ok(volume)
    }

    /// Moves the playhead to `position` within the current track.
    pub async fn seek(&mut self, position: Duration) -> Result<Duration> {
        self.ensure_connected()?;
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(Error::NotPlaying);
        }
        self.seek_to(position).await
    }

    /// Moves the playhead forward by `delta`. Requires `Playing`.
    pub async fn forward(&mut self, delta: Duration) -> Result<Duration> {
        self.ensure_connected()?;
        if self.state != PlaybackState::Playing {
            return Err(Error::NotPlaying);
        }
        let target = self.position().saturating_add(delta);
        self.seek_to(target).await
    }

    /// Moves the playhead back by `delta`. Requires `Playing`.
    pub async fn reverse(&mut self, delta: Duration) -> Result<Duration> {
        self.ensure_connected()?;
        if self.state != PlaybackState::Playing {
            return Err(Error::NotPlaying);
        }
        let position = self.position();
        let target = position.checked_sub(delta).ok_or_else(|| Error::OutOfRange {
            value: millis(position) - millis(delta),
            min: 0,
            max: self.current.as_ref().map_or(0, |t| millis(t.duration())),
        })?;
        self.seek_to(target).await
    }

    /// Removes queued tracks at 1-based positions `start..=end`.
    pub fn remove_range(&mut self, start: usize, end: usize) -> Result<Vec<Track>> {
        self.ensure_connected()?;
        if self.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }
        self.queue.remove_range(start, end)
    }

    /// Drops every queued track, returning how many were removed.
    pub fn clear_queue(&mut self) -> Result<usize> {
        self.ensure_connected()?;
        if self.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }
        Ok(self.queue.clear())
    }

    /// Shuffles the queue and returns the new front.
    pub fn shuffle_queue(&mut self) -> Result<Track> {
        self.ensure_connected()?;
        if self.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }
        self.queue.shuffle();
        self.queue.peek(1).into_iter().next().ok_or(Error::QueueEmpty)
    }

    /// The current track and its playhead.
    pub fn now_playing(&self) -> Result<NowPlaying> {
        self.ensure_connected()?;
        match (&self.current, self.state) {
            (Some(track), PlaybackState::Playing | PlaybackState::Paused) => Ok(NowPlaying {
                track: track.clone(),
                position: self.position(),
                paused: self.state == PlaybackState::Paused,
            }),
            _ => Err(Error::NothingPlaying),
        }
    }

    /// Display view of the current track and the first `page_size` queued tracks.
    pub fn snapshot(&self, page_size: usize) -> Result<QueueSnapshot> {
        self.ensure_connected()?;
        let now_playing = self.now_playing().ok();
        if now_playing.is_none() && self.queue.is_empty() {
            return Err(Error::QueueEmpty);
        }

        let current_left = now_playing
            .as_ref()
            .map_or(Duration::ZERO, |np| np.track.duration().saturating_sub(np.position));
        Ok(QueueSnapshot {
            now_playing,
            upcoming: self.queue.peek(page_size),
            hidden: self.queue.len().saturating_sub(page_size),
            remaining: current_left + self.queue.total_duration(),
        })
    }

    /// Node callback: `track` started playing.
    pub fn on_track_started(&mut self, track: Track) {
        if self.closed {
            return;
        }
        match &self.current {
            Some(current) if current.is_same_item(&track) => {}
            _ => {
                self.votes.reset();
                self.current = Some(track);
            }
        }
        self.state = PlaybackState::Playing;
        self.playhead = Playhead::running(Duration::ZERO);
        self.timer.defuse();
        debug!(guild = %self.guild, "track started");
    }

    /// Node callback: `track` ended for `reason`.
    ///
    /// Only a natural finish advances the queue; other reasons were caused by an
    /// operation that already moved the session on.
    pub async fn on_track_ended(&mut self, track: &Track, reason: TrackEndReason) {
        if self.closed || reason != TrackEndReason::Finished {
            debug!(guild = %self.guild, ?reason, "track end needs no action");
            return;
        }
        if self.current.as_ref().is_some_and(|c| !c.is_same_item(track)) {
            debug!(guild = %self.guild, "ignoring end of a track that is no longer current");
            return;
        }

        self.current = None;
        self.votes.reset();
        match self.queue.try_dequeue_front() {
            Some(next) => match self.context.backend.play(self.guild, &next).await {
                Ok(()) => self.begin(next),
                Err(e) => {
                    warn!(guild = %self.guild, title = %next.info.title, "could not start next track: {e}");
                    self.queue.restore_front(next);
                    self.enter_stopped();
                }
            },
            None => {
                info!(guild = %self.guild, "queue finished");
                self.enter_stopped();
            }
        }
    }

    /// Node callback: periodic playhead report.
    pub fn on_player_update(&mut self, position: Duration) {
        if self.current.is_none() {
            return;
        }
        self.playhead = match self.state {
            PlaybackState::Playing => Playhead::running(position),
            _ => Playhead::frozen(position),
        };
    }

    async fn seek_to(&mut self, target: Duration) -> Result<Duration> {
        let duration = self
            .current
            .as_ref()
            .map(Track::duration)
            .ok_or(Error::NotPlaying)?;
        if target > duration {
            return Err(Error::OutOfRange {
                value: millis(target),
                min: 0,
                max: millis(duration),
            });
        }

        self.context.backend.seek(self.guild, target).await?;
        self.playhead = match self.state {
            PlaybackState::Playing => Playhead::running(target),
            _ => Playhead::frozen(target),
        };
        Ok(target)
    }

    async fn start_next_if_idle(&mut self) -> Result<Option<Track>> {
        let idle = self.current.is_none()
            && matches!(
                self.state,
                PlaybackState::Connecting | PlaybackState::Stopped
            );
        if !idle {
            return Ok(None);
        }
        let Some(next) = self.queue.try_dequeue_front() else {
            return Ok(None);
        };

        if let Err(e) = self.context.backend.play(self.guild, &next).await {
            self.queue.restore_front(next);
            return Err(e.into());
        }
        self.begin(next.clone());
        Ok(Some(next))
    }

    /// Bookkeeping once the node accepted `track` as the new current track.
    fn begin(&mut self, track: Track) {
        self.votes.reset();
        self.current = Some(track);
        self.state = PlaybackState::Playing;
        self.playhead = Playhead::running(Duration::ZERO);
        self.timer.defuse();
    }

    fn enter_stopped(&mut self) {
        self.votes.reset();
        self.playhead = Playhead::default();
        self.state = PlaybackState::Stopped;
        self.arm_idle_timer();
    }

    fn arm_idle_timer(&mut self) {
        let on_idle = Arc::clone(&self.context.on_idle);
        let guild = self.guild;
        self.timer.arm(self.context.settings.idle_timeout, move |generation| {
            on_idle(guild, generation)
        });
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.closed || matches!(self.state, PlaybackState::Idle) {
            return Err(Error::NotConnected);
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
