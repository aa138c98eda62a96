//! Event types for the Packa event system
//!
//! Provides the shared event definitions and the EventBus used by the
//! playback engine. Events are broadcast to any number of subscribers (the
//! gateway layer that posts notices, loggers, tests) and can be serialized
//! as JSON.

use crate::ids::{DestinationId, GroupId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Session playback state
///
/// IDLE → PLAYING on enqueue while nothing plays, PLAYING ↔ PAUSED on
/// pause/resume, PLAYING → IDLE when the queue is exhausted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing is playing
    #[default]
    Idle,
    /// A track is playing
    Playing,
    /// A track is loaded but paused
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Why a track stopped playing, as reported by the audio provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackEndReason {
    /// Track reached its end (or died on an exception)
    Finished,
    /// Loading the track failed
    LoadFailed,
    /// The player was stopped
    Stopped,
    /// Another track started while this one had not finished
    Replaced,
    /// Player was not polled for a while and released the track
    Cleanup,
}

impl TrackEndReason {
    /// Whether the scheduler may advance the queue after this ending
    pub fn may_start_next(self) -> bool {
        !matches!(self, TrackEndReason::Replaced)
    }
}

impl fmt::Display for TrackEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackEndReason::Finished => "FINISHED",
            TrackEndReason::LoadFailed => "LOAD_FAILED",
            TrackEndReason::Stopped => "STOPPED",
            TrackEndReason::Replaced => "REPLACED",
            TrackEndReason::Cleanup => "CLEANUP",
        };
        write!(f, "{}", s)
    }
}

/// Purpose of an inactivity timer
///
/// Each purpose owns one slot; arming a purpose replaces the previous timer
/// of the same purpose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimerPurpose {
    /// Armed on session creation until something plays
    JoinGrace,
    /// Armed by pause
    PauseGrace,
    /// Armed when the queue runs dry
    QueueEmpty,
}

impl fmt::Display for TimerPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerPurpose::JoinGrace => write!(f, "join-grace"),
            TimerPurpose::PauseGrace => write!(f, "pause-grace"),
            TimerPurpose::QueueEmpty => write!(f, "queue-empty"),
        }
    }
}

/// Why a session was torn down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    /// Explicit leave command
    Leave,
    /// An inactivity timer fired
    Inactivity(TimerPurpose),
    /// Process shutdown
    Shutdown,
}

/// Packa event types
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding. All events use this central enum for exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A session was registered for a group
    SessionCreated {
        group_id: GroupId,
        /// Default reply destination for notices
        destination_id: DestinationId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Provider confirmed a track started
    TrackStarted {
        group_id: GroupId,
        /// Instance id of the started track
        track_id: Uuid,
        title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Provider reported a track ended
    TrackEnded {
        group_id: GroupId,
        track_id: Uuid,
        reason: TrackEndReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback state changed
    PlaybackStateChanged {
        group_id: GroupId,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending queue changed (notification only, carries the new length)
    QueueChanged {
        group_id: GroupId,
        length: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Last track finished and nothing is left to play
    QueueExhausted {
        group_id: GroupId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An inactivity timer was armed
    InactivityTimerArmed {
        group_id: GroupId,
        purpose: TimerPurpose,
        delay_secs: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-facing message for the session's reply destination
    Notice {
        group_id: GroupId,
        destination_id: DestinationId,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session was destroyed and deregistered
    SessionDestroyed {
        group_id: GroupId,
        reason: DestroyReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A queue view was removed by the expiry sweep
    QueueViewExpired {
        destination_id: DestinationId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Group the event belongs to, if any
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            SessionEvent::SessionCreated { group_id, .. }
            | SessionEvent::TrackStarted { group_id, .. }
            | SessionEvent::TrackEnded { group_id, .. }
            | SessionEvent::PlaybackStateChanged { group_id, .. }
            | SessionEvent::QueueChanged { group_id, .. }
            | SessionEvent::QueueExhausted { group_id, .. }
            | SessionEvent::InactivityTimerArmed { group_id, .. }
            | SessionEvent::Notice { group_id, .. }
            | SessionEvent::SessionDestroyed { group_id, .. } => Some(*group_id),
            SessionEvent::QueueViewExpired { .. } => None,
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use packa_common::events::{EventBus, SessionEvent};
/// use packa_common::GroupId;
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(SessionEvent::QueueExhausted {
///     group_id: GroupId(1),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(SessionEvent::QueueExhausted { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SessionEvent::TrackEnded {
            group_id: GroupId(5),
            track_id: Uuid::nil(),
            reason: TrackEndReason::LoadFailed,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TrackEnded");
        assert_eq!(json["group_id"], 5);
        assert_eq!(json["reason"], "LOAD_FAILED");
    }

    #[test]
    fn test_destroy_reason_serialization() {
        let json = serde_json::to_value(DestroyReason::Inactivity(TimerPurpose::QueueEmpty)).unwrap();
        assert_eq!(json["inactivity"], "queue_empty");
    }

    #[test]
    fn test_replaced_does_not_start_next() {
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(TrackEndReason::Stopped.may_start_next());
    }

    #[test]
    fn test_event_bus_without_subscribers() {
        let bus = EventBus::new(4);
        let result = bus.emit(SessionEvent::QueueViewExpired {
            destination_id: DestinationId(1),
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_all_subscribers() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let delivered = bus
            .emit(SessionEvent::QueueExhausted {
                group_id: GroupId(3),
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 2);

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.group_id(), Some(GroupId(3)));
        assert_eq!(e2.group_id(), Some(GroupId(3)));
    }
}
