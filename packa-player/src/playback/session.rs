//! Playback session
//!
//! Binds one [`TrackScheduler`] to one audio provider (the voice connection
//! handle) and one default reply destination.
//!
//! **Concurrency:** every mutation (transport commands, provider callbacks,
//! timer expiry) runs under the session mutex, held only for the duration
//! of a state transition. Source resolution happens before the lock is
//! taken. Provider commands are fire-and-forget and never awaited. A
//! provider "ended" event only advances the queue when it names the track
//! the session considers current, so a skip racing a natural end advances
//! exactly once.
//!
//! **State machine:** IDLE → PLAYING on enqueue while nothing plays,
//! PLAYING ↔ PAUSED on pause/resume, PLAYING → IDLE when the queue is
//! exhausted (arming the queue-empty timer), IDLE → destroyed when a timer
//! fires.

use crate::error::{Error, Result};
use crate::playback::registry::SessionRegistry;
use crate::playback::scheduler::{LoopMode, SkipRangeOutcome, TrackEndAction, TrackScheduler};
use crate::playback::timer::InactivityTimers;
use crate::provider::{AudioProvider, LoadResult, ProviderEvent, ProviderEventReceiver, SourceResolver};
use crate::track::TrackRef;
use packa_common::config::SessionConfig;
use packa_common::events::{
    DestroyReason, EventBus, PlaybackState, SessionEvent, TimerPurpose, TrackEndReason,
};
use packa_common::{DestinationId, GroupId};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What an enqueue request did
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// Nothing was playing; the track started immediately
    Started(TrackRef),
    /// Track queued at `position` (0-based)
    Enqueued { track: TrackRef, position: usize },
    /// Playlist queued; `started` is set if playback began with it
    PlaylistEnqueued {
        name: String,
        count: usize,
        started: Option<TrackRef>,
    },
    /// Resolver found nothing
    NoMatch,
    /// Resolver failed
    Failed(String),
}

/// Currently playing track with its position
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub track: TrackRef,
    pub position: Duration,
    pub paused: bool,
}

/// Point-in-time copy of a session's queue
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub group_id: GroupId,
    pub now_playing: Option<NowPlaying>,
    /// Pending tracks in play order, without the now-playing track
    pub queue: Vec<TrackRef>,
    pub queue_duration: Duration,
}

/// Mutable session state, guarded by the session mutex
struct SessionInner {
    scheduler: TrackScheduler,

    /// Track the session started (or the provider confirmed) and not yet ended
    current: Option<TrackRef>,

    paused: bool,

    shuffled: bool,

    timers: InactivityTimers,

    /// Track stopped by clear_queue; its end must not loop or re-append
    halted: Option<Uuid>,

    destroyed: bool,
}

impl SessionInner {
    fn state(&self) -> PlaybackState {
        match (&self.current, self.paused) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }
}

/// One group's active playback context
pub struct Session {
    group_id: GroupId,
    reply_to: DestinationId,
    provider: Arc<dyn AudioProvider>,
    resolver: Arc<dyn SourceResolver>,
    settings: SessionConfig,
    events: EventBus,
    registry: Weak<SessionRegistry>,
    me: Weak<Session>,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Build a session; registration is done by [`SessionRegistry::create`]
    pub(crate) fn new(
        group_id: GroupId,
        provider: Arc<dyn AudioProvider>,
        resolver: Arc<dyn SourceResolver>,
        reply_to: DestinationId,
        settings: SessionConfig,
        events: EventBus,
        registry: Weak<SessionRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            group_id,
            reply_to,
            provider,
            resolver,
            settings,
            events,
            registry,
            me: me.clone(),
            inner: Mutex::new(SessionInner {
                scheduler: TrackScheduler::new(),
                current: None,
                paused: false,
                shuffled: false,
                timers: InactivityTimers::new(),
                halted: None,
                destroyed: false,
            }),
        })
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Default reply destination for notices
    pub fn reply_destination(&self) -> DestinationId {
        self.reply_to
    }

    // ========================================
    // Enqueue
    // ========================================

    /// Resolve `locator` and append the result.
    ///
    /// A playlist is queued as a whole (shuffled first if the session is
    /// shuffled). Playback starts only if nothing is currently playing.
    pub async fn load_and_enqueue(&self, locator: &str) -> Result<EnqueueOutcome> {
        self.ensure_alive().await?;
        let result = self.resolver.resolve(locator).await;

        let mut inner = self.lock_alive().await?;
        let before = inner.state();
        self.renew_liveness(&mut inner);

        let outcome = match result {
            LoadResult::Track(track) => {
                inner.scheduler.enqueue(track.clone());
                match self.start_next_if_idle(&mut inner) {
                    Some(started) => EnqueueOutcome::Started(started),
                    None => EnqueueOutcome::Enqueued {
                        position: inner.scheduler.len() - 1,
                        track,
                    },
                }
            }
            LoadResult::Playlist { name, tracks } => {
                let count = tracks.len();
                if inner.shuffled {
                    inner
                        .scheduler
                        .enqueue_all_shuffled(tracks, &mut rand::thread_rng());
                } else {
                    for track in tracks {
                        inner.scheduler.enqueue(track);
                    }
                }
                let started = self.start_next_if_idle(&mut inner);
                info!("Group {}: playlist '{}' queued ({} tracks)", self.group_id, name, count);
                EnqueueOutcome::PlaylistEnqueued { name, count, started }
            }
            LoadResult::NoMatch => {
                debug!("Group {}: no match for '{}'", self.group_id, locator);
                EnqueueOutcome::NoMatch
            }
            LoadResult::Failed(message) => {
                warn!("Group {}: loading '{}' failed: {}", self.group_id, locator, message);
                EnqueueOutcome::Failed(message)
            }
        };

        self.settle_idle(&mut inner);
        self.emit_queue_changed(&inner);
        self.emit_state_change(before, inner.state());
        Ok(outcome)
    }

    /// Resolve exactly one item and put it at the front of the queue.
    ///
    /// For a playlist result only its first track is used.
    pub async fn play_next(&self, locator: &str) -> Result<EnqueueOutcome> {
        self.ensure_alive().await?;
        let result = self.resolver.resolve(locator).await;

        let track = match result {
            LoadResult::Track(track) => track,
            LoadResult::Playlist { tracks, .. } => match tracks.into_iter().next() {
                Some(track) => track,
                None => return Ok(EnqueueOutcome::NoMatch),
            },
            LoadResult::NoMatch => return Ok(EnqueueOutcome::NoMatch),
            LoadResult::Failed(message) => {
                warn!("Group {}: loading '{}' failed: {}", self.group_id, locator, message);
                return Ok(EnqueueOutcome::Failed(message));
            }
        };

        let mut inner = self.lock_alive().await?;
        let before = inner.state();
        self.renew_liveness(&mut inner);

        inner.scheduler.enqueue_front(track.clone());
        let outcome = match self.start_next_if_idle(&mut inner) {
            Some(started) => EnqueueOutcome::Started(started),
            None => EnqueueOutcome::Enqueued { track, position: 0 },
        };

        self.settle_idle(&mut inner);
        self.emit_queue_changed(&inner);
        self.emit_state_change(before, inner.state());
        Ok(outcome)
    }

    // ========================================
    // Transport
    // ========================================

    /// Pause with the configured grace period
    pub async fn pause(&self) -> Result<bool> {
        self.pause_for(self.settings.pause_grace()).await
    }

    /// Pause and arm the pause-grace timer with `grace`.
    ///
    /// Returns false if nothing is playing; an idle session still gets its
    /// queue-empty timer restarted.
    pub async fn pause_for(&self, grace: Duration) -> Result<bool> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);
        if inner.current.is_none() {
            self.settle_idle(&mut inner);
            return Ok(false);
        }

        let before = inner.state();
        inner.paused = true;
        self.provider.set_paused(true);
        self.arm_timer(&mut inner, TimerPurpose::PauseGrace, grace);
        self.emit_state_change(before, inner.state());
        Ok(true)
    }

    /// Cancel inactivity timers and un-pause. Returns false if nothing is playing.
    ///
    /// When idle, the queue-empty timer restarts from now.
    pub async fn resume(&self) -> Result<bool> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);
        if inner.current.is_none() {
            self.settle_idle(&mut inner);
            return Ok(false);
        }

        let before = inner.state();
        inner.paused = false;
        self.provider.set_paused(false);
        self.emit_state_change(before, inner.state());
        Ok(true)
    }

    /// Stop the live track; the provider's end event advances the queue.
    ///
    /// Never starts the next track itself. Returns the skipped track.
    pub async fn skip_current(&self) -> Result<Option<TrackRef>> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        let current = inner.current.clone();
        if let Some(track) = &current {
            info!("Group {}: skipping '{}'", self.group_id, track.title());
            self.provider.stop();
        }

        self.settle_idle(&mut inner);
        Ok(current)
    }

    /// Remove the pending track at `index` (0-based)
    pub async fn skip_at(&self, index: usize) -> Result<Option<TrackRef>> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        let removed = inner.scheduler.skip_at(index);
        if removed.is_some() {
            self.emit_queue_changed(&inner);
        }

        self.settle_idle(&mut inner);
        Ok(removed)
    }

    /// Remove pending positions `start..=end` (0-based)
    pub async fn skip_from_to(&self, start: i64, end: i64) -> Result<SkipRangeOutcome> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        let outcome = inner.scheduler.skip_range(start, end);
        if outcome.is_success() {
            self.emit_queue_changed(&inner);
        }

        self.settle_idle(&mut inner);
        Ok(outcome)
    }

    /// Toggle shuffling; returns the new shuffled flag
    pub async fn shuffle(&self) -> Result<bool> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        inner.shuffled = !inner.shuffled;
        if inner.shuffled {
            inner.scheduler.shuffle();
        } else {
            inner.scheduler.unshuffle();
        }

        self.settle_idle(&mut inner);
        self.emit_queue_changed(&inner);
        Ok(inner.shuffled)
    }

    /// Shuffle again, switching shuffling on if it was off
    pub async fn reshuffle(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        inner.shuffled = true;
        inner.scheduler.shuffle();

        self.settle_idle(&mut inner);
        self.emit_queue_changed(&inner);
        Ok(())
    }

    /// Set the loop mode; no playback side effect
    pub async fn set_loop(&self, mode: LoopMode) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        inner.scheduler.set_loop(mode);
        debug!("Group {}: loop mode {}", self.group_id, mode);
        Ok(())
    }

    /// Turn looping off; no playback side effect
    pub async fn unloop(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        inner.scheduler.unloop();
        Ok(())
    }

    /// Replay the current track from the start.
    ///
    /// A fresh instance is queued at the front and the live track stopped, so
    /// the provider's end event starts the new instance.
    pub async fn restart(&self) -> Result<Option<TrackRef>> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        let restarted = match inner.current.clone() {
            Some(current) => {
                let again = current.fresh_instance();
                inner.scheduler.enqueue_front(again.clone());
                self.provider.stop();
                Some(again)
            }
            None => None,
        };

        self.settle_idle(&mut inner);
        Ok(restarted)
    }

    /// Empty the queue and stop the live track.
    ///
    /// Returns whether a track was playing.
    pub async fn clear_queue(&self) -> Result<bool> {
        let mut inner = self.lock_alive().await?;
        self.renew_liveness(&mut inner);

        inner.scheduler.clear();
        let was_playing = match inner.current.clone() {
            Some(current) => {
                inner.halted = Some(current.id());
                self.provider.stop();
                true
            }
            None => false,
        };

        self.settle_idle(&mut inner);
        self.emit_queue_changed(&inner);
        Ok(was_playing)
    }

    /// Arm the queue-empty inactivity timer
    pub async fn on_queue_empty(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        self.arm_timer(&mut inner, TimerPurpose::QueueEmpty, self.settings.queue_empty_grace());
        Ok(())
    }

    /// Clear the queue, stop playback, cancel all timers and deregister.
    ///
    /// Returns false if the session was already destroyed.
    pub async fn destroy(&self) -> bool {
        self.destroy_with(DestroyReason::Leave).await
    }

    pub(crate) async fn destroy_with(&self, reason: DestroyReason) -> bool {
        let destroyed = {
            let mut inner = self.inner.lock().await;
            self.destroy_locked(&mut inner, reason)
        };
        if destroyed {
            self.deregister().await;
        }
        destroyed
    }

    // ========================================
    // Provider callbacks
    // ========================================

    /// Feed one provider event into the session
    pub async fn handle_provider_event(&self, event: ProviderEvent) -> Result<()> {
        match event {
            ProviderEvent::Started(track) => self.on_track_started(track).await,
            ProviderEvent::Ended(track, reason) => self.on_track_ended(track, reason).await,
            ProviderEvent::Stuck(track, threshold) => self.on_track_stuck(track, threshold).await,
            ProviderEvent::Exception(track, message) => {
                self.on_track_exception(track, message).await
            }
        }
    }

    /// Spawn the pump that feeds provider events into this session, in order.
    ///
    /// The pump ends when the channel closes or the session is destroyed.
    /// A failing event is logged and the pump keeps running.
    pub fn attach_provider_events(self: &Arc<Self>, mut rx: ProviderEventReceiver) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let group_id = self.group_id;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = session.handle_provider_event(event).await {
                    match e {
                        Error::SessionDestroyed(_) => break,
                        e => error!("Group {}: provider event failed: {}", group_id, e),
                    }
                }
            }
            debug!("Group {}: provider event pump stopped", group_id);
        })
    }

    pub async fn on_track_started(&self, track: TrackRef) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        let before = inner.state();

        inner.scheduler.on_track_started(&track);
        if inner.current.as_ref() != Some(&track) {
            inner.current = Some(track.clone());
            inner.paused = false;
        }

        self.emit(SessionEvent::TrackStarted {
            group_id: self.group_id,
            track_id: track.id(),
            title: track.title().to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.emit_queue_changed(&inner);
        self.emit_state_change(before, inner.state());
        Ok(())
    }

    pub async fn on_track_ended(&self, track: TrackRef, reason: TrackEndReason) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        let before = inner.state();

        self.emit(SessionEvent::TrackEnded {
            group_id: self.group_id,
            track_id: track.id(),
            reason,
            timestamp: chrono::Utc::now(),
        });

        if inner.current.as_ref() != Some(&track) {
            debug!(
                "Group {}: end of non-current track {} ({}), not advancing",
                self.group_id,
                track.id(),
                reason
            );
            return Ok(());
        }
        inner.current = None;
        inner.paused = false;

        let action = if inner.halted == Some(track.id()) {
            inner.halted = None;
            match inner.scheduler.peek_next() {
                Some(next) => Ok(TrackEndAction::Start(next.clone())),
                None => Ok(TrackEndAction::QueueEmpty),
            }
        } else {
            inner.scheduler.on_track_ended(&track, reason)
        };

        let result = match action {
            Ok(TrackEndAction::Start(next)) => {
                if !self.start_locked(&mut inner, next) {
                    self.queue_exhausted(&mut inner);
                }
                Ok(())
            }
            Ok(TrackEndAction::QueueEmpty) => {
                self.queue_exhausted(&mut inner);
                Ok(())
            }
            Ok(TrackEndAction::Hold) => Ok(()),
            Err(e) => {
                // Nothing will start; make sure the idle session still expires
                self.queue_exhausted(&mut inner);
                Err(e)
            }
        };

        self.emit_queue_changed(&inner);
        self.emit_state_change(before, inner.state());
        result
    }

    /// Stop a stuck track and tell the reply destination; no retry
    pub async fn on_track_stuck(&self, track: TrackRef, threshold: Duration) -> Result<()> {
        let inner = self.lock_alive().await?;
        if inner.current.as_ref() != Some(&track) {
            return Ok(());
        }

        warn!(
            "Group {}: track '{}' stuck for {:?}, stopping",
            self.group_id,
            track.title(),
            threshold
        );
        self.provider.stop();
        self.notify(format!("Track `{}` is stuck. Skipping track...", track.title()));
        Ok(())
    }

    /// Log a playback failure and stop the track; its end event follows
    pub async fn on_track_exception(&self, track: TrackRef, message: String) -> Result<()> {
        let inner = self.lock_alive().await?;
        error!(
            "Group {}: error while playing track [{}][{}]: {}",
            self.group_id,
            track.id(),
            track.title(),
            message
        );
        if inner.current.as_ref() == Some(&track) {
            self.provider.stop();
        }
        Ok(())
    }

    // ========================================
    // Queries
    // ========================================

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state()
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.lock().await.current.is_some()
    }

    pub async fn is_shuffled(&self) -> bool {
        self.inner.lock().await.shuffled
    }

    pub async fn is_destroyed(&self) -> bool {
        self.inner.lock().await.destroyed
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.inner.lock().await.scheduler.loop_mode()
    }

    pub async fn current_track(&self) -> Option<TrackRef> {
        self.inner.lock().await.current.clone()
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        let inner = self.inner.lock().await;
        self.now_playing_locked(&inner)
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.scheduler.len()
    }

    pub async fn queue_duration(&self) -> Duration {
        self.inner.lock().await.scheduler.queue_duration()
    }

    /// Pending tracks in play order
    pub async fn queue(&self) -> Vec<TrackRef> {
        self.inner.lock().await.scheduler.queue().iter().cloned().collect()
    }

    /// Pending tracks in insertion order
    pub async fn canonical_queue(&self) -> Vec<TrackRef> {
        self.inner
            .lock()
            .await
            .scheduler
            .canonical_queue()
            .iter()
            .cloned()
            .collect()
    }

    /// Earliest pending disconnect deadline
    pub async fn inactivity_deadline(&self) -> Option<Instant> {
        self.inner.lock().await.timers.earliest_deadline()
    }

    /// Deadline of one timer purpose
    pub async fn timer_deadline(&self, purpose: TimerPurpose) -> Option<Instant> {
        self.inner.lock().await.timers.deadline(purpose)
    }

    /// Copy of the queue for rendering
    pub async fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        let now_playing = self.now_playing_locked(&inner);
        let queue: Vec<TrackRef> = inner
            .scheduler
            .queue()
            .iter()
            .filter(|t| inner.current.as_ref() != Some(*t))
            .cloned()
            .collect();
        let queue_duration = queue.iter().map(TrackRef::length).sum();

        QueueSnapshot {
            group_id: self.group_id,
            now_playing,
            queue,
            queue_duration,
        }
    }

    // ========================================
    // Internals (caller holds the lock)
    // ========================================

    async fn ensure_alive(&self) -> Result<()> {
        if self.inner.lock().await.destroyed {
            return Err(Error::SessionDestroyed(self.group_id));
        }
        Ok(())
    }

    async fn lock_alive(&self) -> Result<tokio::sync::MutexGuard<'_, SessionInner>> {
        let inner = self.inner.lock().await;
        if inner.destroyed {
            return Err(Error::SessionDestroyed(self.group_id));
        }
        Ok(inner)
    }

    fn now_playing_locked(&self, inner: &SessionInner) -> Option<NowPlaying> {
        inner.current.as_ref().map(|track| NowPlaying {
            track: track.clone(),
            position: self.provider.position(),
            paused: inner.paused,
        })
    }

    /// Explicit user action: cancel every pending disconnect timer
    fn renew_liveness(&self, inner: &mut SessionInner) {
        let cancelled = inner.timers.cancel_all();
        if cancelled > 0 {
            debug!("Group {}: cancelled {} inactivity timer(s)", self.group_id, cancelled);
        }
    }

    /// An idle session with no timer left gets a fresh queue-empty timer
    fn settle_idle(&self, inner: &mut SessionInner) {
        if inner.current.is_none() && inner.timers.earliest_deadline().is_none() {
            self.arm_timer(inner, TimerPurpose::QueueEmpty, self.settings.queue_empty_grace());
        }
    }

    fn start_next_if_idle(&self, inner: &mut SessionInner) -> Option<TrackRef> {
        if inner.current.is_some() {
            return None;
        }
        let next = inner.scheduler.peek_next()?.clone();
        if self.start_locked(inner, next.clone()) {
            Some(next)
        } else {
            None
        }
    }

    /// Command the provider to start `track`; returns false if refused
    fn start_locked(&self, inner: &mut SessionInner, track: TrackRef) -> bool {
        inner.timers.cancel_all();
        inner.current = Some(track.clone());
        inner.paused = false;

        if self.provider.start(track.clone(), false) {
            debug!("Group {}: starting '{}'", self.group_id, track.title());
            true
        } else {
            warn!(
                "Group {}: provider refused to start '{}'",
                self.group_id,
                track.title()
            );
            inner.current = None;
            false
        }
    }

    fn queue_exhausted(&self, inner: &mut SessionInner) {
        info!("Group {}: queue exhausted", self.group_id);
        self.emit(SessionEvent::QueueExhausted {
            group_id: self.group_id,
            timestamp: chrono::Utc::now(),
        });
        self.arm_timer(inner, TimerPurpose::QueueEmpty, self.settings.queue_empty_grace());
    }

    fn arm_timer(&self, inner: &mut SessionInner, purpose: TimerPurpose, delay: Duration) {
        let weak = self.me.clone();
        inner.timers.arm(purpose, delay, move |generation| async move {
            if let Some(session) = weak.upgrade() {
                session.on_inactivity_timeout(purpose, generation).await;
            }
        });

        debug!("Group {}: armed {} timer ({:?})", self.group_id, purpose, delay);
        self.emit(SessionEvent::InactivityTimerArmed {
            group_id: self.group_id,
            purpose,
            delay_secs: delay.as_secs(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Arm the join-grace timer of a freshly registered session
    pub(crate) async fn arm_join_grace(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.destroyed {
            self.arm_timer(&mut inner, TimerPurpose::JoinGrace, self.settings.join_grace());
        }
    }

    async fn on_inactivity_timeout(&self, purpose: TimerPurpose, generation: u64) {
        let destroyed = {
            let mut inner = self.inner.lock().await;
            if inner.destroyed || !inner.timers.take_if_current(purpose, generation) {
                debug!(
                    "Group {}: stale {} timer (gen {}) ignored",
                    self.group_id, purpose, generation
                );
                return;
            }
            info!("Group {}: {} timer expired, leaving", self.group_id, purpose);
            self.notify("Left the voice channel due to inactivity.".to_string());
            self.destroy_locked(&mut inner, DestroyReason::Inactivity(purpose))
        };
        if destroyed {
            self.deregister().await;
        }
    }

    fn destroy_locked(&self, inner: &mut SessionInner, reason: DestroyReason) -> bool {
        if inner.destroyed {
            return false;
        }
        inner.destroyed = true;
        inner.scheduler.clear();
        inner.timers.cancel_all();
        inner.current = None;
        inner.paused = false;
        inner.halted = None;

        self.provider.stop();
        self.provider.destroy();

        info!("Group {}: session destroyed ({:?})", self.group_id, reason);
        self.emit(SessionEvent::SessionDestroyed {
            group_id: self.group_id,
            reason,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    async fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.group_id, self).await;
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.events.emit_lossy(event);
    }

    fn notify(&self, message: String) {
        self.emit(SessionEvent::Notice {
            group_id: self.group_id,
            destination_id: self.reply_to,
            message,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_queue_changed(&self, inner: &SessionInner) {
        self.emit(SessionEvent::QueueChanged {
            group_id: self.group_id,
            length: inner.scheduler.len(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_state_change(&self, old_state: PlaybackState, new_state: PlaybackState) {
        if old_state != new_state {
            debug!("Group {}: {} -> {}", self.group_id, old_state, new_state);
            self.emit(SessionEvent::PlaybackStateChanged {
                group_id: self.group_id,
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("group_id", &self.group_id)
            .field("reply_to", &self.reply_to)
            .finish_non_exhaustive()
    }
}
