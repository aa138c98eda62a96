//! In-process collaborators
//!
//! [`SimulatedProvider`] stands in for a voice connection: it accepts
//! start/stop/pause commands and reports outcomes on the ordered provider
//! event channel, optionally finishing tracks on its own after their
//! (scaled) length. [`CatalogResolver`] resolves a tiny locator language
//! without any network access:
//!
//! | Locator            | Result                                  |
//! |--------------------|-----------------------------------------|
//! | `title=95`         | track "title", 95 s                     |
//! | `title=live`       | live stream "title"                     |
//! | `title`            | track "title", 180 s                    |
//! | `a=10,b=20`        | playlist of two tracks                  |
//! | `missing:<x>`      | no match                                |
//! | `fail:<reason>`    | load failure with `<reason>`            |

use crate::provider::{AudioProvider, LoadResult, ProviderEvent, ProviderEventSender, SourceResolver};
use crate::track::{TrackInfo, TrackRef};
use async_trait::async_trait;
use packa_common::events::TrackEndReason;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const DEFAULT_TRACK_SECS: u64 = 180;

/// Slowest auto-finish speed: one track second per 100 wall-clock seconds
pub const MIN_TIME_SCALE: f64 = 0.01;

struct PlayingTrack {
    track: TrackRef,
    /// Track time played before the current run
    played: Duration,
    /// Start of the current run; `None` while paused
    resumed_at: Option<Instant>,
    finish: Option<CancellationToken>,
}

#[derive(Default)]
struct SimState {
    playing: Option<PlayingTrack>,
    started: Vec<TrackRef>,
    stop_count: usize,
    destroyed: bool,
}

/// Audio provider that plays nothing
pub struct SimulatedProvider {
    events: ProviderEventSender,
    /// Track seconds per wall-clock second; `None` disables auto-finish
    time_scale: Option<f64>,
    state: Mutex<SimState>,
    me: Weak<SimulatedProvider>,
}

impl SimulatedProvider {
    /// Provider whose tracks only end on command
    pub fn new(events: ProviderEventSender) -> Arc<Self> {
        Self::build(events, None)
    }

    /// Provider that finishes each track after `length / time_scale`.
    ///
    /// Scales below [`MIN_TIME_SCALE`] (including zero, negative and NaN)
    /// are raised to it.
    pub fn auto_finishing(events: ProviderEventSender, time_scale: f64) -> Arc<Self> {
        Self::build(events, Some(time_scale.max(MIN_TIME_SCALE)))
    }

    fn build(events: ProviderEventSender, time_scale: Option<f64>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            events,
            time_scale,
            state: Mutex::new(SimState::default()),
            me: me.clone(),
        })
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: ProviderEvent) {
        trace!("Simulated provider event: {:?}", event);
        // Receiver gone means the session is gone
        let _ = self.events.send(event);
    }

    fn scale(&self) -> f64 {
        self.time_scale.unwrap_or(1.0)
    }

    fn schedule_finish(&self, playing: &mut PlayingTrack) {
        let Some(scale) = self.time_scale else {
            return;
        };
        if playing.track.info().is_stream {
            return;
        }

        let remaining = playing.track.length().saturating_sub(playing.played);
        let wait = Duration::from_secs_f64(remaining.as_secs_f64() / scale);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let track = playing.track.clone();
        let weak = self.me.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(wait) => {
                    if let Some(provider) = weak.upgrade() {
                        provider.end_if_current(&track, TrackEndReason::Finished);
                    }
                }
            }
        });
        playing.finish = Some(token);
    }

    fn end_if_current(&self, track: &TrackRef, reason: TrackEndReason) -> bool {
        let mut state = self.state();
        if state.playing.as_ref().map(|p| &p.track) != Some(track) {
            return false;
        }
        if let Some(playing) = state.playing.take() {
            if let Some(finish) = playing.finish {
                finish.cancel();
            }
            self.send(ProviderEvent::Ended(playing.track, reason));
        }
        true
    }

    /// End the playing track as finished
    pub fn finish_current(&self) -> bool {
        match self.playing() {
            Some(track) => self.end_if_current(&track, TrackEndReason::Finished),
            None => false,
        }
    }

    /// End the playing track as a failed load
    pub fn fail_current_load(&self) -> bool {
        match self.playing() {
            Some(track) => self.end_if_current(&track, TrackEndReason::LoadFailed),
            None => false,
        }
    }

    /// Report the playing track as throwing `message`
    pub fn raise_exception(&self, message: &str) -> bool {
        match self.playing() {
            Some(track) => {
                self.send(ProviderEvent::Exception(track, message.to_string()));
                true
            }
            None => false,
        }
    }

    /// Report the playing track as stuck for `threshold`
    pub fn report_stuck(&self, threshold: Duration) -> bool {
        match self.playing() {
            Some(track) => {
                self.send(ProviderEvent::Stuck(track, threshold));
                true
            }
            None => false,
        }
    }

    pub fn playing(&self) -> Option<TrackRef> {
        self.state().playing.as_ref().map(|p| p.track.clone())
    }

    pub fn is_paused(&self) -> bool {
        self.state()
            .playing
            .as_ref()
            .is_some_and(|p| p.resumed_at.is_none())
    }

    /// Every track a start command was accepted for, in order
    pub fn started_tracks(&self) -> Vec<TrackRef> {
        self.state().started.clone()
    }

    pub fn stop_count(&self) -> usize {
        self.state().stop_count
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }
}

impl AudioProvider for SimulatedProvider {
    fn start(&self, track: TrackRef, immediate: bool) -> bool {
        let mut state = self.state();
        if state.destroyed {
            return false;
        }

        if let Some(previous) = state.playing.take() {
            if !immediate {
                state.playing = Some(previous);
                return false;
            }
            if let Some(finish) = previous.finish {
                finish.cancel();
            }
            self.send(ProviderEvent::Ended(previous.track, TrackEndReason::Replaced));
        }

        debug!("Simulated provider starting '{}'", track.title());
        let mut playing = PlayingTrack {
            track: track.clone(),
            played: Duration::ZERO,
            resumed_at: Some(Instant::now()),
            finish: None,
        };
        self.schedule_finish(&mut playing);
        state.playing = Some(playing);
        state.started.push(track.clone());
        self.send(ProviderEvent::Started(track));
        true
    }

    fn stop(&self) {
        let mut state = self.state();
        state.stop_count += 1;
        if let Some(playing) = state.playing.take() {
            if let Some(finish) = playing.finish {
                finish.cancel();
            }
            self.send(ProviderEvent::Ended(playing.track, TrackEndReason::Stopped));
        }
    }

    fn set_paused(&self, paused: bool) {
        let scale = self.scale();
        let mut state = self.state();
        let Some(playing) = state.playing.as_mut() else {
            return;
        };

        match (paused, playing.resumed_at) {
            (true, Some(since)) => {
                playing.played += since.elapsed().mul_f64(scale);
                playing.resumed_at = None;
                if let Some(finish) = playing.finish.take() {
                    finish.cancel();
                }
            }
            (false, None) => {
                playing.resumed_at = Some(Instant::now());
                self.schedule_finish(playing);
            }
            _ => {}
        }
    }

    fn position(&self) -> Duration {
        let scale = self.scale();
        let state = self.state();
        match &state.playing {
            Some(playing) => {
                let running = playing
                    .resumed_at
                    .map(|since| since.elapsed().mul_f64(scale))
                    .unwrap_or_default();
                let position = playing.played + running;
                if playing.track.info().is_stream {
                    position
                } else {
                    position.min(playing.track.length())
                }
            }
            None => Duration::ZERO,
        }
    }

    fn destroy(&self) {
        let mut state = self.state();
        state.destroyed = true;
        if let Some(playing) = state.playing.take() {
            if let Some(finish) = playing.finish {
                finish.cancel();
            }
        }
    }
}

/// Resolver for the locator language in the module docs
#[derive(Debug, Clone, Default)]
pub struct CatalogResolver {
    requested_by: Option<String>,
    latency: Duration,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every resolved track with a requester
    pub fn requested_by(mut self, user: impl Into<String>) -> Self {
        self.requested_by = Some(user.into());
        self
    }

    /// Delay each resolution, like a network lookup
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn parse_item(&self, item: &str) -> Result<TrackRef, String> {
        let (title, length) = match item.split_once('=') {
            Some((title, length)) => (title.trim(), Some(length.trim())),
            None => (item.trim(), None),
        };
        if title.is_empty() {
            return Err(format!("empty title in '{}'", item));
        }

        let mut info = TrackInfo::new(title, Duration::from_secs(DEFAULT_TRACK_SECS))
            .with_uri(format!("sim://{}", title.replace(' ', "_")))
            .with_author("Simulated");
        match length {
            Some("live") => info = info.stream(),
            Some(secs) => {
                let secs: u64 = secs
                    .parse()
                    .map_err(|_| format!("invalid length '{}' for '{}'", secs, title))?;
                info.length = Duration::from_secs(secs);
            }
            None => {}
        }
        if let Some(user) = &self.requested_by {
            info = info.requested_by(user.clone());
        }
        Ok(TrackRef::new(info))
    }

    /// Resolve without latency
    pub fn resolve_now(&self, locator: &str) -> LoadResult {
        let locator = locator.trim();
        if locator.starts_with("missing:") || locator.is_empty() {
            return LoadResult::NoMatch;
        }
        if let Some(reason) = locator.strip_prefix("fail:") {
            return LoadResult::Failed(reason.to_string());
        }

        if locator.contains(',') {
            let tracks: Result<Vec<TrackRef>, String> = locator
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .map(|item| self.parse_item(item))
                .collect();
            return match tracks {
                Ok(tracks) => LoadResult::Playlist {
                    name: format!("Playlist ({} tracks)", tracks.len()),
                    tracks,
                },
                Err(e) => LoadResult::Failed(e),
            };
        }

        match self.parse_item(locator) {
            Ok(track) => LoadResult::Track(track),
            Err(e) => LoadResult::Failed(e),
        }
    }
}

#[async_trait]
impl SourceResolver for CatalogResolver {
    async fn resolve(&self, locator: &str) -> LoadResult {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.resolve_now(locator)
    }
}
