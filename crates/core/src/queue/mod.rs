//! Beat-quantized pattern switching.
//!
//! While playing, a requested pattern walks through two stages: it is
//! *prequeued* on request, promoted to *queued* on step 12 and committed as
//! the selected pattern on step 15, so the switch lands on the next measure
//! boundary. While paused the switch is immediate and the queued marker only
//! lingers for a short pulse window.

use serde::{Deserialize, Serialize};

use crate::{
    store::{self, KeyValueStore, SELECTED_PATTERN_KEY},
    Millis, Tempo, TimerId, TimerQueue,
};

/// Beat index on which a prequeued pattern becomes queued.
pub const PROMOTE_STEP: i32 = 12;

/// Beat index on which a queued pattern becomes the selected pattern.
pub const COMMIT_STEP: i32 = 15;

/// Pattern selected when the store holds nothing usable.
pub const DEFAULT_PATTERN: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub queued: Option<usize>,
    pub prequeued: Option<usize>,
}

/// What [`PatternQueueManager::on_beat_index`] did, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTransition {
    Promoted(usize),
    Committed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueEvent {
    PulseElapsed,
}

#[derive(Debug)]
pub struct PatternQueueManager {
    selected: usize,
    bank_len: usize,
    state: QueueState,
    timers: TimerQueue<QueueEvent>,
    pulse: Option<TimerId>,
}

impl PatternQueueManager {
    /// Restores the selected pattern from `store`, falling back to pattern 1
    /// when the stored index is missing or outside the bank.
    pub fn load(store: &dyn KeyValueStore, bank_len: usize) -> Self {
        let bank_len = bank_len.max(1);
        let selected = store::load_value::<usize>(store, SELECTED_PATTERN_KEY)
            .filter(|index| (1..=bank_len).contains(index))
            .unwrap_or(DEFAULT_PATTERN);

        Self {
            selected,
            bank_len,
            state: QueueState::default(),
            timers: TimerQueue::new(),
            pulse: None,
        }
    }

    pub fn selected_pattern(&self) -> usize {
        self.selected
    }

    pub fn queued(&self) -> Option<usize> {
        self.state.queued
    }

    pub fn prequeued(&self) -> Option<usize> {
        self.state.prequeued
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// How long the queued marker stays up after a switch while paused.
    pub fn pulse_window(tempo: Tempo) -> Millis {
        tempo.beat_ms()
    }

    /// Requests a switch to pattern `index` (1-indexed). Returns `false` and
    /// changes nothing when the index is outside the bank.
    pub fn queue_pattern(
        &mut self,
        index: usize,
        playing: bool,
        tempo: Tempo,
        now: Millis,
        store: &mut dyn KeyValueStore,
    ) -> bool {
        if !(1..=self.bank_len).contains(&index) {
            tracing::warn!(index, bank_len = self.bank_len, "ignoring out-of-range pattern");
            return false;
        }

        if playing {
            tracing::debug!(index, "pattern prequeued");
            self.state.prequeued = Some(index);
            return true;
        }

        self.state.prequeued = None;
        self.state.queued = Some(index);
        self.commit(index, store);

        self.cancel_pulse();
        self.pulse = Some(self.timers.schedule(
            now,
            Self::pulse_window(tempo),
            QueueEvent::PulseElapsed,
        ));
        true
    }

    /// Reacts to the clock's current beat index. Safe to call every frame:
    /// repeated calls on the same step are no-ops once the transition ran.
    pub fn on_beat_index(
        &mut self,
        beat_index: i32,
        store: &mut dyn KeyValueStore,
    ) -> Option<QueueTransition> {
        if beat_index == PROMOTE_STEP {
            if let Some(index) = self.state.prequeued.take() {
                // a paused-mode pulse must not clear the promoted entry
                self.cancel_pulse();
                self.state.queued = Some(index);
                tracing::debug!(index, "pattern queued for next measure");
                return Some(QueueTransition::Promoted(index));
            }
        } else if beat_index == COMMIT_STEP {
            if let Some(index) = self.state.queued.take() {
                self.commit(index, store);
                return Some(QueueTransition::Committed(index));
            }
        }
        None
    }

    /// Fires the pulse timer if it is due.
    pub fn advance(&mut self, now: Millis) {
        while let Some((id, QueueEvent::PulseElapsed)) = self.timers.pop_due(now) {
            tracing::trace!(?id, "queue pulse elapsed");
            self.pulse = None;
            self.state.queued = None;
        }
    }

    pub fn cancel_pulse(&mut self) {
        if let Some(id) = self.pulse.take() {
            self.timers.cancel(id);
        }
    }

    /// Drops pending requests and timers. The selection is kept.
    pub fn clear(&mut self) {
        self.pulse = None;
        self.timers.cancel_all();
        self.state = QueueState::default();
    }

    fn commit(&mut self, index: usize, store: &mut dyn KeyValueStore) {
        tracing::debug!(from = self.selected, to = index, "selected pattern committed");
        self.selected = index;
        store::persist(store, SELECTED_PATTERN_KEY, &index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    const TEMPO: Tempo = Tempo::DEFAULT;

    fn manager(store: &MemoryStore) -> PatternQueueManager {
        PatternQueueManager::load(store, 16)
    }

    #[test]
    fn restores_selection_from_store() {
        let mut store = MemoryStore::new();
        assert_eq!(manager(&store).selected_pattern(), 1);

        store::store_value(&mut store, SELECTED_PATTERN_KEY, &9_usize).unwrap();
        assert_eq!(manager(&store).selected_pattern(), 9);

        store::store_value(&mut store, SELECTED_PATTERN_KEY, &40_usize).unwrap();
        assert_eq!(manager(&store).selected_pattern(), 1);
    }

    #[test]
    fn playing_switch_waits_for_steps_twelve_and_fifteen() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        assert!(queue.queue_pattern(4, true, TEMPO, 0.0, &mut store));
        assert_eq!(queue.prequeued(), Some(4));
        assert_eq!(queue.queued(), None);

        for index in 3..12 {
            assert_eq!(queue.on_beat_index(index, &mut store), None);
        }
        assert_eq!(queue.on_beat_index(12, &mut store), Some(QueueTransition::Promoted(4)));
        assert_eq!(queue.state(), QueueState { queued: Some(4), prequeued: None });
        assert_eq!(queue.on_beat_index(12, &mut store), None);
        assert_eq!(queue.on_beat_index(13, &mut store), None);
        assert_eq!(queue.selected_pattern(), 1);

        assert_eq!(queue.on_beat_index(15, &mut store), Some(QueueTransition::Committed(4)));
        assert_eq!(queue.selected_pattern(), 4);
        assert_eq!(queue.queued(), None);
        assert_eq!(store::load_value::<usize>(&store, SELECTED_PATTERN_KEY), Some(4));
    }

    #[test]
    fn request_after_step_twelve_waits_a_full_measure() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        queue.queue_pattern(2, true, TEMPO, 0.0, &mut store);
        for index in [13, 14, 15, 0, 1] {
            assert_eq!(queue.on_beat_index(index, &mut store), None);
        }
        assert_eq!(queue.selected_pattern(), 1);
        queue.on_beat_index(12, &mut store);
        queue.on_beat_index(15, &mut store);
        assert_eq!(queue.selected_pattern(), 2);
    }

    #[test]
    fn paused_switch_commits_immediately_and_pulses() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        queue.queue_pattern(6, false, TEMPO, 1_000.0, &mut store);
        assert_eq!(queue.selected_pattern(), 6);
        assert_eq!(queue.queued(), Some(6));

        queue.advance(1_499.0);
        assert_eq!(queue.queued(), Some(6));
        queue.advance(1_500.0);
        assert_eq!(queue.queued(), None);
        assert!(!queue.has_pending_timers());
    }

    #[test]
    fn paused_requeue_restarts_the_pulse() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        queue.queue_pattern(6, false, TEMPO, 0.0, &mut store);
        queue.advance(400.0);
        queue.queue_pattern(6, false, TEMPO, 400.0, &mut store);
        queue.advance(600.0);
        assert_eq!(queue.queued(), Some(6));
        queue.advance(900.0);
        assert_eq!(queue.queued(), None);
    }

    #[test]
    fn out_of_range_requests_are_ignored() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        assert!(!queue.queue_pattern(0, false, TEMPO, 0.0, &mut store));
        assert!(!queue.queue_pattern(17, true, TEMPO, 0.0, &mut store));
        assert_eq!(queue.state(), QueueState::default());
        assert_eq!(queue.selected_pattern(), 1);
    }

    #[test]
    fn promotion_outlives_a_stale_paused_pulse() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        queue.queue_pattern(3, false, TEMPO, 0.0, &mut store);
        queue.queue_pattern(5, true, TEMPO, 10.0, &mut store);
        queue.on_beat_index(12, &mut store);
        queue.advance(10_000.0);
        assert_eq!(queue.queued(), Some(5));
        queue.on_beat_index(15, &mut store);
        assert_eq!(queue.selected_pattern(), 5);
    }

    #[test]
    fn clear_drops_requests_but_keeps_selection() {
        let mut store = MemoryStore::new();
        let mut queue = manager(&store);

        queue.queue_pattern(8, false, TEMPO, 0.0, &mut store);
        queue.queue_pattern(2, true, TEMPO, 0.0, &mut store);
        queue.clear();
        assert_eq!(queue.state(), QueueState::default());
        assert!(!queue.has_pending_timers());
        assert_eq!(queue.selected_pattern(), 8);
    }
}
