//! Inactivity timers
//!
//! One cancelable slot per [`TimerPurpose`]. Arming a purpose cancels the
//! timer previously armed for that purpose. A fired timer does not touch
//! session state itself: it runs the callback the session supplied, which
//! posts into the session's serialized context and re-checks the
//! generation there, so a timer that fires after being replaced or
//! cancelled is a no-op.

use packa_common::events::TimerPurpose;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A timer waiting to fire
#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
}

/// Inactivity timer slots for one session
#[derive(Debug, Default)]
pub struct InactivityTimers {
    armed: HashMap<TimerPurpose, ArmedTimer>,
    next_generation: u64,
}

impl InactivityTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `purpose` to run `on_fire(generation)` after `delay`.
    ///
    /// Must be called from within a tokio runtime. Returns the generation
    /// the callback will receive.
    pub fn arm<F, Fut>(&mut self, purpose: TimerPurpose, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(purpose);

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("{} timer (gen {}) cancelled", purpose, generation);
                }
                _ = tokio::time::sleep(delay) => {
                    on_fire(generation).await;
                }
            }
        });

        self.armed.insert(
            purpose,
            ArmedTimer {
                generation,
                deadline: Instant::now() + delay,
                cancel,
            },
        );
        generation
    }

    /// Cancel the timer for `purpose`; returns whether one was armed
    pub fn cancel(&mut self, purpose: TimerPurpose) -> bool {
        match self.armed.remove(&purpose) {
            Some(timer) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer; returns how many were armed
    pub fn cancel_all(&mut self) -> usize {
        let count = self.armed.len();
        for (_, timer) in self.armed.drain() {
            timer.cancel.cancel();
        }
        count
    }

    /// Whether `generation` is still the live timer for `purpose`.
    ///
    /// Consumes the slot when it matches, so a timer fires at most once.
    pub fn take_if_current(&mut self, purpose: TimerPurpose, generation: u64) -> bool {
        match self.armed.get(&purpose) {
            Some(timer) if timer.generation == generation => {
                self.armed.remove(&purpose);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, purpose: TimerPurpose) -> bool {
        self.armed.contains_key(&purpose)
    }

    /// Deadline of the timer for `purpose`
    pub fn deadline(&self, purpose: TimerPurpose) -> Option<Instant> {
        self.armed.get(&purpose).map(|t| t.deadline)
    }

    /// Earliest deadline among armed timers
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|t| t.deadline).min()
    }

    /// Purposes currently armed
    pub fn armed_purposes(&self) -> Vec<TimerPurpose> {
        self.armed.keys().copied().collect()
    }
}

impl Drop for InactivityTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
