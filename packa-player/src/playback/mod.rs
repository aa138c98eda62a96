//! Playback engine
//!
//! - [`scheduler`]: queue and loop policy (pure, synchronous)
//! - [`timer`]: cancelable inactivity timers
//! - [`session`]: per-group state machine over scheduler + provider
//! - [`registry`]: group → session map

pub mod registry;
pub mod scheduler;
pub mod session;
pub mod timer;

pub use registry::SessionRegistry;
pub use scheduler::{LoopMode, SkipRangeOutcome, TrackEndAction, TrackScheduler};
pub use session::{EnqueueOutcome, NowPlaying, QueueSnapshot, Session};
pub use timer::InactivityTimers;
