//! # Packa Player Library (packa-player)
//!
//! Playback-session engine for a chat bot that streams audio into group
//! voice sessions.
//!
//! **Purpose:** Keep one queue per group, decide what plays next (loop
//! modes, shuffle, skips), disconnect idle sessions, and render paginated,
//! auto-expiring views of a queue.
//!
//! **Architecture:** Audio decoding, voice transport and locator resolution
//! are external collaborators behind [`provider::AudioProvider`] and
//! [`provider::SourceResolver`]. Each session serializes its own state
//! transitions; sessions share nothing.

pub mod error;
pub mod playback;
pub mod provider;
pub mod queue_view;
pub mod service;
pub mod simulation;
pub mod track;

pub use error::{Error, Result};
pub use playback::{LoopMode, Session, SessionRegistry, SkipRangeOutcome};
pub use service::PlaybackService;
pub use track::{TrackInfo, TrackRef};
