//! External collaborators
//!
//! The engine never decodes audio or resolves search terms itself. It talks
//! to two collaborators:
//! - [`AudioProvider`]: the playback handle bound to a voice connection.
//!   Commands are fire-and-forget; outcomes come back as [`ProviderEvent`]s
//!   on an ordered channel.
//! - [`SourceResolver`]: turns a locator (URL or search term) into a
//!   [`LoadResult`].

use crate::track::TrackRef;
use async_trait::async_trait;
use packa_common::events::TrackEndReason;
use std::time::Duration;
use tokio::sync::mpsc;

/// Playback handle for one voice connection
///
/// Implementations must not block and must not call back into the session
/// synchronously: every outcome is reported through the provider's event
/// channel, in order. "Started" for a track is always sent before any
/// "ended" for that same track.
pub trait AudioProvider: Send + Sync {
    /// Start playing `track`.
    ///
    /// With `immediate == false` the call is refused (returns false) while
    /// another track is playing. With `immediate == true` a playing track is
    /// replaced (its end is reported as [`TrackEndReason::Replaced`]).
    fn start(&self, track: TrackRef, immediate: bool) -> bool;

    /// Stop the playing track; its end is reported as `Stopped`
    fn stop(&self);

    /// Pause or resume output
    fn set_paused(&self, paused: bool);

    /// Position within the playing track
    fn position(&self) -> Duration {
        Duration::ZERO
    }

    /// Release the voice connection; no further events are expected
    fn destroy(&self) {}
}

/// Events reported by the audio provider
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Track began producing audio
    Started(TrackRef),
    /// Track stopped playing
    Ended(TrackRef, TrackEndReason),
    /// Track produced no audio for `threshold`
    Stuck(TrackRef, Duration),
    /// Playing track threw; an `Ended` event follows separately
    Exception(TrackRef, String),
}

/// Sender half handed to provider implementations
pub type ProviderEventSender = mpsc::UnboundedSender<ProviderEvent>;

/// Receiver half consumed by the session's event pump
pub type ProviderEventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Create the ordered provider event channel
pub fn provider_channel() -> (ProviderEventSender, ProviderEventReceiver) {
    mpsc::unbounded_channel()
}

/// Outcome of resolving one locator
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// A single playable item
    Track(TrackRef),
    /// A list of items
    Playlist { name: String, tracks: Vec<TrackRef> },
    /// Nothing matched the locator
    NoMatch,
    /// Resolution failed
    Failed(String),
}

/// Resolves locators into playable items
///
/// Resolution is network-bound; callers run it outside any session lock.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, locator: &str) -> LoadResult;
}
