//! Track Scheduler
//!
//! Pure in-memory queue state machine for one session. Owns the play order,
//! the loop policy and the skip/removal algorithms, and decides what plays
//! next when the provider reports a track ended.
//!
//! Two lists are kept:
//! - `queue`: effective play order (shuffled or not)
//! - `canonical`: insertion order, the source of truth for unshuffling
//!
//! Both always hold the same multiset of handles. Every removal goes through
//! identity on both lists.

use crate::error::{Error, Result};
use crate::track::TrackRef;
use packa_common::events::TrackEndReason;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error};

/// Policy for what happens when the current track finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Advance through the queue once
    #[default]
    Off,
    /// Repeat the current track
    Single,
    /// Cycle through the queue indefinitely
    Queue,
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Single => write!(f, "single"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

/// What the session should do after a track ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEndAction {
    /// Start this track now
    Start(TrackRef),
    /// Nothing left to play
    QueueEmpty,
    /// Another track already took over; do nothing
    Hold,
}

/// Result of a range skip
///
/// Each failure maps to a distinct user message, so the numeric codes are
/// part of the contract with the command layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipRangeOutcome {
    /// Range removed; carries the number of removed tracks
    Removed(usize),
    /// `start < 0`
    StartNegative,
    /// `end < 1`, or `end < start`
    EndTooSmall,
    /// `start` is past the last position
    StartOutOfRange,
    /// `end` is past the last position
    EndOutOfRange,
}

impl SkipRangeOutcome {
    /// Numeric result code: 1 success, -1..-4 failures
    pub fn code(self) -> i32 {
        match self {
            SkipRangeOutcome::Removed(_) => 1,
            SkipRangeOutcome::StartNegative => -1,
            SkipRangeOutcome::EndTooSmall => -2,
            SkipRangeOutcome::StartOutOfRange => -3,
            SkipRangeOutcome::EndOutOfRange => -4,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, SkipRangeOutcome::Removed(_))
    }
}

/// Per-session queue and loop policy
#[derive(Debug, Default)]
pub struct TrackScheduler {
    /// Effective play order
    queue: VecDeque<TrackRef>,

    /// Insertion order, never shuffled
    canonical: VecDeque<TrackRef>,

    /// Loop flag; the mode is only consulted while this is set
    looped: bool,

    /// Remembered loop mode (kept when looping is switched off)
    loop_mode: Option<LoopMode>,
}

impl TrackScheduler {
    /// Create new empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to both queues
    pub fn enqueue(&mut self, track: TrackRef) {
        self.queue.push_back(track.clone());
        self.canonical.push_back(track);
    }

    /// Prepend to both queues
    pub fn enqueue_front(&mut self, track: TrackRef) {
        self.queue.push_front(track.clone());
        self.canonical.push_front(track);
    }

    /// Append a batch in shuffled play order.
    ///
    /// The canonical queue receives the batch in its given order, so
    /// unshuffling later restores the batch's original sequence.
    pub fn enqueue_all_shuffled<R: Rng + ?Sized>(&mut self, tracks: Vec<TrackRef>, rng: &mut R) {
        let mut shuffled = tracks.clone();
        shuffled.shuffle(rng);
        self.canonical.extend(tracks);
        self.queue.extend(shuffled);
    }

    /// The started track is now playing, no longer pending.
    ///
    /// Removes it by identity (the head in the normal case). Returns false if
    /// the track was not queued, e.g. a loop restart instance.
    pub fn on_track_started(&mut self, track: &TrackRef) -> bool {
        self.remove(track)
    }

    /// Decide what plays after `track` ended.
    ///
    /// - SINGLE: a finished track restarts as a fresh instance. Explicit stops
    ///   and failures fall through to normal advancement.
    /// - QUEUE: a fresh instance of the ended track is appended, then the
    ///   head starts. Failed loads are not re-appended.
    /// - OFF: the head starts, or the queue is reported empty.
    ///
    /// Looping with no usable mode set is an invariant violation.
    pub fn on_track_ended(
        &mut self,
        track: &TrackRef,
        reason: TrackEndReason,
    ) -> Result<TrackEndAction> {
        if !reason.may_start_next() {
            debug!("Track {} ended with {}, not advancing", track.id(), reason);
            return Ok(TrackEndAction::Hold);
        }

        if self.looped {
            match self.loop_mode {
                Some(LoopMode::Single) => {
                    if reason == TrackEndReason::Finished {
                        return Ok(TrackEndAction::Start(track.fresh_instance()));
                    }
                }
                Some(LoopMode::Queue) => {
                    if reason != TrackEndReason::LoadFailed {
                        self.enqueue(track.fresh_instance());
                    }
                }
                other => {
                    error!(
                        target: "packa::operator",
                        "Loop error: looping enabled with loop mode {:?}",
                        other
                    );
                    return Err(Error::LoopModeUnset(other));
                }
            }
        }

        Ok(self.next_action())
    }

    fn next_action(&self) -> TrackEndAction {
        match self.queue.front() {
            Some(next) => TrackEndAction::Start(next.clone()),
            None => TrackEndAction::QueueEmpty,
        }
    }

    /// Remove the track at `index` (0-based) of the play order
    pub fn skip_at(&mut self, index: usize) -> Option<TrackRef> {
        let track = self.queue.remove(index)?;
        remove_by_identity(&mut self.canonical, &track);
        Some(track)
    }

    /// Remove positions `start..=end` (0-based, inclusive) of the play order.
    ///
    /// Bounds are validated before anything is removed.
    pub fn skip_range(&mut self, start: i64, end: i64) -> SkipRangeOutcome {
        let len = self.queue.len() as i64;
        if start < 0 {
            return SkipRangeOutcome::StartNegative;
        }
        if end < 1 {
            return SkipRangeOutcome::EndTooSmall;
        }
        if start >= len {
            return SkipRangeOutcome::StartOutOfRange;
        }
        if end >= len {
            return SkipRangeOutcome::EndOutOfRange;
        }
        if end < start {
            return SkipRangeOutcome::EndTooSmall;
        }

        let removed: Vec<TrackRef> = self
            .queue
            .drain(start as usize..=end as usize)
            .collect();
        for track in &removed {
            remove_by_identity(&mut self.canonical, track);
        }
        SkipRangeOutcome::Removed(removed.len())
    }

    /// Randomize the play order; canonical order is untouched
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Randomize the play order with the given RNG
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.queue.make_contiguous().shuffle(rng);
    }

    /// Restore the play order from the canonical queue
    pub fn unshuffle(&mut self) {
        self.queue.clone_from(&self.canonical);
    }

    /// Empty both queues
    pub fn clear(&mut self) {
        self.queue.clear();
        self.canonical.clear();
    }

    /// Sum of remaining track lengths
    pub fn queue_duration(&self) -> Duration {
        self.queue.iter().map(TrackRef::length).sum()
    }

    /// Pending tracks in play order
    pub fn queue(&self) -> &VecDeque<TrackRef> {
        &self.queue
    }

    /// Pending tracks in insertion order
    pub fn canonical_queue(&self) -> &VecDeque<TrackRef> {
        &self.canonical
    }

    /// Next track to play
    pub fn peek_next(&self) -> Option<&TrackRef> {
        self.queue.front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Switch to a loop mode; `Off` clears the loop flag
    pub fn set_loop(&mut self, mode: LoopMode) {
        match mode {
            LoopMode::Off => self.looped = false,
            mode => {
                self.looped = true;
                self.loop_mode = Some(mode);
            }
        }
    }

    /// Turn looping off, remembering the last mode
    pub fn unloop(&mut self) {
        self.looped = false;
    }

    /// Raw setter for the loop flag and mode
    pub fn set_looped(&mut self, looped: bool, mode: Option<LoopMode>) {
        self.looped = looped;
        self.loop_mode = mode;
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// Effective loop mode
    pub fn loop_mode(&self) -> LoopMode {
        if self.looped {
            self.loop_mode.unwrap_or_default()
        } else {
            LoopMode::Off
        }
    }

    /// Remove `track` by identity from both queues
    pub fn remove(&mut self, track: &TrackRef) -> bool {
        let in_queue = remove_by_identity(&mut self.queue, track);
        let in_canonical = remove_by_identity(&mut self.canonical, track);
        in_queue || in_canonical
    }
}

fn remove_by_identity(list: &mut VecDeque<TrackRef>, track: &TrackRef) -> bool {
    match list.iter().position(|t| t == track) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackInfo;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn create_test_track(name: &str, secs: u64) -> TrackRef {
        TrackRef::new(TrackInfo::new(name, Duration::from_secs(secs)))
    }

    fn scheduler_with(n: usize) -> (TrackScheduler, Vec<TrackRef>) {
        let mut scheduler = TrackScheduler::new();
        let tracks: Vec<TrackRef> = (0..n)
            .map(|i| create_test_track(&format!("t{}", i), 60))
            .collect();
        for track in &tracks {
            scheduler.enqueue(track.clone());
        }
        (scheduler, tracks)
    }

    fn ids(list: &VecDeque<TrackRef>) -> Vec<uuid::Uuid> {
        list.iter().map(TrackRef::id).collect()
    }

    fn assert_same_multiset(scheduler: &TrackScheduler) {
        let a: HashSet<_> = scheduler.queue().iter().map(TrackRef::id).collect();
        let b: HashSet<_> = scheduler.canonical_queue().iter().map(TrackRef::id).collect();
        assert_eq!(scheduler.queue().len(), scheduler.canonical_queue().len());
        assert_eq!(a, b);
    }

    #[test]
    fn test_scheduler_creation() {
        let scheduler = TrackScheduler::new();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.loop_mode(), LoopMode::Off);
        assert_eq!(scheduler.queue_duration(), Duration::ZERO);
    }

    #[test]
    fn test_enqueue_front_and_back() {
        let mut scheduler = TrackScheduler::new();
        let a = create_test_track("a", 10);
        let b = create_test_track("b", 20);
        scheduler.enqueue(a.clone());
        scheduler.enqueue_front(b.clone());

        assert_eq!(ids(scheduler.queue()), vec![b.id(), a.id()]);
        assert_eq!(ids(scheduler.canonical_queue()), vec![b.id(), a.id()]);
        assert_eq!(scheduler.queue_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_started_track_leaves_both_queues() {
        let (mut scheduler, tracks) = scheduler_with(3);
        scheduler.shuffle_with(&mut StdRng::seed_from_u64(7));
        let head = scheduler.peek_next().unwrap().clone();

        assert!(scheduler.on_track_started(&head));
        assert_eq!(scheduler.len(), 2);
        assert!(!scheduler.canonical_queue().contains(&head));
        assert_same_multiset(&scheduler);

        // A track that was never queued (loop restart) is not an error
        assert!(!scheduler.on_track_started(&tracks[0].fresh_instance()));
    }

    #[test]
    fn test_loop_off_advances_then_reports_empty() {
        let (mut scheduler, tracks) = scheduler_with(2);
        scheduler.on_track_started(&tracks[0]);

        let action = scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Finished)
            .unwrap();
        assert_eq!(action, TrackEndAction::Start(tracks[1].clone()));

        scheduler.on_track_started(&tracks[1]);
        let action = scheduler
            .on_track_ended(&tracks[1], TrackEndReason::Finished)
            .unwrap();
        assert_eq!(action, TrackEndAction::QueueEmpty);
    }

    #[test]
    fn test_loop_single_restarts_fresh_instance() {
        let (mut scheduler, tracks) = scheduler_with(2);
        scheduler.set_loop(LoopMode::Single);
        scheduler.on_track_started(&tracks[0]);

        for _ in 0..3 {
            match scheduler
                .on_track_ended(&tracks[0], TrackEndReason::Finished)
                .unwrap()
            {
                TrackEndAction::Start(next) => {
                    assert_ne!(next, tracks[0]);
                    assert!(next.same_item(&tracks[0]));
                }
                other => panic!("expected restart, got {:?}", other),
            }
        }
        // Nothing else was consumed
        assert_eq!(ids(scheduler.queue()), vec![tracks[1].id()]);
    }

    #[test]
    fn test_loop_single_skip_advances() {
        let (mut scheduler, tracks) = scheduler_with(2);
        scheduler.set_loop(LoopMode::Single);
        scheduler.on_track_started(&tracks[0]);

        let action = scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Stopped)
            .unwrap();
        assert_eq!(action, TrackEndAction::Start(tracks[1].clone()));
    }

    #[test]
    fn test_loop_queue_cycles_with_stable_length() {
        let (mut scheduler, tracks) = scheduler_with(2);
        scheduler.set_loop(LoopMode::Queue);

        let mut played = vec![tracks[0].clone()];
        scheduler.on_track_started(&tracks[0]);
        assert_eq!(scheduler.len(), 1);

        for _ in 0..4 {
            let ended = played.last().unwrap().clone();
            let next = match scheduler
                .on_track_ended(&ended, TrackEndReason::Finished)
                .unwrap()
            {
                TrackEndAction::Start(next) => next,
                other => panic!("expected start, got {:?}", other),
            };
            scheduler.on_track_started(&next);
            assert_eq!(scheduler.len(), 1);
            played.push(next);
        }

        let titles: Vec<&str> = played.iter().map(TrackRef::title).collect();
        assert_eq!(titles, vec!["t0", "t1", "t0", "t1", "t0"]);
    }

    #[test]
    fn test_loop_queue_single_track_keeps_playing() {
        let (mut scheduler, tracks) = scheduler_with(1);
        scheduler.set_loop(LoopMode::Queue);
        scheduler.on_track_started(&tracks[0]);

        match scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Finished)
            .unwrap()
        {
            TrackEndAction::Start(next) => assert!(next.same_item(&tracks[0])),
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn test_replaced_holds() {
        let (mut scheduler, tracks) = scheduler_with(2);
        scheduler.on_track_started(&tracks[0]);
        let action = scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Replaced)
            .unwrap();
        assert_eq!(action, TrackEndAction::Hold);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_loop_flag_without_mode_is_an_error() {
        let (mut scheduler, tracks) = scheduler_with(1);
        scheduler.set_looped(true, None);
        let err = scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Finished)
            .unwrap_err();
        assert!(matches!(err, Error::LoopModeUnset(None)));

        scheduler.set_looped(true, Some(LoopMode::Off));
        assert!(scheduler
            .on_track_ended(&tracks[0], TrackEndReason::Finished)
            .is_err());
    }

    #[test]
    fn test_unloop_remembers_mode() {
        let mut scheduler = TrackScheduler::new();
        scheduler.set_loop(LoopMode::Queue);
        scheduler.unloop();
        assert_eq!(scheduler.loop_mode(), LoopMode::Off);
        assert!(!scheduler.is_looped());
        scheduler.set_looped(true, Some(LoopMode::Queue));
        assert_eq!(scheduler.loop_mode(), LoopMode::Queue);
    }

    #[test]
    fn test_skip_at() {
        let (mut scheduler, tracks) = scheduler_with(3);
        assert_eq!(scheduler.skip_at(1), Some(tracks[1].clone()));
        assert_eq!(ids(scheduler.queue()), vec![tracks[0].id(), tracks[2].id()]);
        assert_eq!(scheduler.skip_at(2), None);
        assert_same_multiset(&scheduler);
    }

    #[test]
    fn test_skip_range_codes() {
        let (mut scheduler, tracks) = scheduler_with(5);

        assert_eq!(scheduler.skip_range(-1, 3).code(), -1);
        assert_eq!(scheduler.skip_range(1, 0).code(), -2);
        assert_eq!(scheduler.skip_range(10, 12).code(), -3);
        assert_eq!(scheduler.skip_range(1, 5).code(), -4);
        assert_eq!(scheduler.skip_range(3, 2).code(), -2);
        assert_eq!(scheduler.len(), 5, "failed skips must not mutate");

        let outcome = scheduler.skip_range(1, 3);
        assert_eq!(outcome, SkipRangeOutcome::Removed(3));
        assert_eq!(outcome.code(), 1);
        assert_eq!(ids(scheduler.queue()), vec![tracks[0].id(), tracks[4].id()]);
        assert_same_multiset(&scheduler);
    }

    #[test]
    fn test_skip_range_on_shuffled_queue_removes_from_canonical_too() {
        let (mut scheduler, _) = scheduler_with(6);
        scheduler.shuffle_with(&mut StdRng::seed_from_u64(3));
        let doomed: Vec<_> = scheduler.queue().iter().skip(2).take(3).cloned().collect();

        assert!(scheduler.skip_range(2, 4).is_success());
        for track in &doomed {
            assert!(!scheduler.canonical_queue().contains(track));
        }
        assert_same_multiset(&scheduler);
    }

    #[test]
    fn test_unshuffle_restores_canonical_order() {
        let (mut scheduler, tracks) = scheduler_with(8);
        scheduler.shuffle_with(&mut StdRng::seed_from_u64(42));
        assert_same_multiset(&scheduler);

        scheduler.skip_at(0);
        scheduler.unshuffle();
        assert_eq!(ids(scheduler.queue()), ids(scheduler.canonical_queue()));

        let once = ids(scheduler.queue());
        scheduler.unshuffle();
        assert_eq!(ids(scheduler.queue()), once);

        // Remaining tracks keep their original relative order
        let expected: Vec<_> = tracks
            .iter()
            .filter(|t| scheduler.canonical_queue().contains(t))
            .map(TrackRef::id)
            .collect();
        assert_eq!(once, expected);
    }

    #[test]
    fn test_multiset_invariant_over_mixed_operations() {
        let mut rng = StdRng::seed_from_u64(99);
        let (mut scheduler, _) = scheduler_with(12);

        for step in 0..60u32 {
            match step % 7 {
                0 => scheduler.shuffle_with(&mut rng),
                1 => {
                    scheduler.skip_at(rng.gen_range(0..=scheduler.len()));
                }
                2 => {
                    let len = scheduler.len() as i64;
                    scheduler.skip_range(rng.gen_range(-1..=len), rng.gen_range(-1..=len + 1));
                }
                3 => scheduler.enqueue(create_test_track("x", 5)),
                4 => scheduler.enqueue_front(create_test_track("y", 5)),
                5 => scheduler.unshuffle(),
                _ => {
                    if let Some(head) = scheduler.peek_next().cloned() {
                        scheduler.on_track_started(&head);
                    }
                }
            }
            assert_same_multiset(&scheduler);
        }
    }

    #[test]
    fn test_shuffled_batch_keeps_insertion_order_in_canonical() {
        let (mut scheduler, first) = scheduler_with(2);
        let batch: Vec<TrackRef> = (0..6)
            .map(|i| create_test_track(&format!("p{}", i), 30))
            .collect();
        scheduler.enqueue_all_shuffled(batch.clone(), &mut StdRng::seed_from_u64(11));
        assert_same_multiset(&scheduler);

        scheduler.unshuffle();
        let expected: Vec<_> = first.iter().chain(batch.iter()).map(TrackRef::id).collect();
        assert_eq!(ids(scheduler.queue()), expected);
    }

    #[test]
    fn test_clear() {
        let (mut scheduler, _) = scheduler_with(4);
        scheduler.clear();
        assert!(scheduler.is_empty());
        assert!(scheduler.canonical_queue().is_empty());
    }
}
