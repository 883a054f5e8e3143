//! Sewing-machine spool cue shown while a pattern switch is pending.

use serde::{Deserialize, Serialize};

use crate::{Millis, Tempo, TimerQueue};

/// Positions stepped through after a switch while paused. Position 0 is the
/// resting spool, 3 the furthest out.
const MANUAL_SEQUENCE: [u8; 6] = [1, 2, 3, 2, 1, 0];

/// Spool position for a fractional beat while playing.
pub fn spool_for_beat(current_beat: f64) -> u8 {
    let phase = current_beat.rem_euclid(4.0);
    if phase < 0.8 {
        1
    } else if phase < 1.6 {
        2
    } else if phase < 2.4 {
        3
    } else if phase < 3.2 {
        2
    } else {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpoolMode {
    /// No pattern queued; the spool rests at 0.
    Idle,
    /// Follows the clock every tick.
    Synced,
    /// Runs the fixed sequence on its own timers.
    Manual,
}

#[derive(Debug)]
pub struct SpoolAnimator {
    position: u8,
    queued: Option<usize>,
    playing: bool,
    last_beat: f64,
    tempo: Tempo,
    mode: SpoolMode,
    timers: TimerQueue<u8>,
}

impl SpoolAnimator {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            position: 0,
            queued: None,
            playing: false,
            last_beat: 0.0,
            tempo,
            mode: SpoolMode::Idle,
            timers: TimerQueue::new(),
        }
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn mode(&self) -> SpoolMode {
        self.mode
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Gap between two positions of the paused sequence.
    pub fn manual_step(tempo: Tempo) -> Millis {
        tempo.beat_ms() / MANUAL_SEQUENCE.len() as f64
    }

    /// Reports the queued pattern. Every call while paused restarts the
    /// manual sequence, so re-queuing the same pattern replays the cue.
    pub fn on_selection_queued(&mut self, queued: Option<usize>, now: Millis) {
        self.queued = queued;
        self.reconcile(now);
    }

    pub fn set_tempo(&mut self, tempo: Tempo, now: Millis) {
        if tempo == self.tempo {
            return;
        }
        self.tempo = tempo;
        if self.mode == SpoolMode::Manual && self.has_pending_timers() {
            self.reconcile(now);
        }
    }

    /// Per-frame update with the clock's fractional beat.
    pub fn on_tick(&mut self, current_beat: f64, playing: bool, now: Millis) {
        self.last_beat = current_beat;
        if playing != self.playing {
            self.playing = playing;
            self.reconcile(now);
        }

        self.advance(now);
        if self.mode == SpoolMode::Synced {
            self.position = spool_for_beat(current_beat);
        }
    }

    /// Fires due steps of the manual sequence.
    pub fn advance(&mut self, now: Millis) {
        while let Some((_, position)) = self.timers.pop_due(now) {
            tracing::trace!(position, now, "spool step");
            self.position = position;
        }
    }

    /// Cancels all timers and rests the spool.
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.queued = None;
        self.playing = false;
        self.last_beat = 0.0;
        self.position = 0;
        self.mode = SpoolMode::Idle;
    }

    fn reconcile(&mut self, now: Millis) {
        self.timers.cancel_all();

        self.mode = match (self.queued, self.playing) {
            (None, _) => {
                self.position = 0;
                SpoolMode::Idle
            }
            (Some(_), true) => {
                self.position = spool_for_beat(self.last_beat);
                SpoolMode::Synced
            }
            (Some(_), false) => {
                let step = Self::manual_step(self.tempo);
                for (index, &position) in MANUAL_SEQUENCE.iter().enumerate() {
                    self.timers.schedule(now, step * (index + 1) as f64, position);
                }
                SpoolMode::Manual
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_bands_follow_the_phase() {
        let positions: Vec<u8> = [0.0, 0.79, 0.8, 1.6, 2.4, 3.2, 3.99, 4.0, 5.7]
            .iter()
            .map(|&beat| spool_for_beat(beat))
            .collect();
        assert_eq!(positions, vec![1, 1, 2, 3, 2, 1, 1, 1, 3]);
    }

    #[test]
    fn follows_the_clock_while_playing() {
        let mut spool = SpoolAnimator::new(Tempo::new(120));
        spool.on_tick(0.0, true, 0.0);
        spool.on_selection_queued(Some(3), 0.0);
        assert_eq!(spool.mode(), SpoolMode::Synced);

        let mut seen = Vec::new();
        for beat in [0.1, 0.9, 1.7, 2.5, 3.3] {
            spool.on_tick(beat, true, beat * 125.0);
            seen.push(spool.position());
        }
        assert_eq!(seen, vec![1, 2, 3, 2, 1]);
        assert!(!spool.has_pending_timers());
    }

    #[test]
    fn runs_fixed_sequence_while_paused() {
        // 60 BPM: the six steps are 1000 / 6 ms apart.
        let mut spool = SpoolAnimator::new(Tempo::new(60));
        let step = 1_000.0 / 6.0;
        spool.on_selection_queued(Some(2), 0.0);
        assert_eq!(spool.mode(), SpoolMode::Manual);
        assert_eq!(spool.position(), 0);

        let mut seen = Vec::new();
        for n in 1..=6 {
            spool.advance(step * n as f64 + 0.001);
            seen.push(spool.position());
        }
        assert_eq!(seen, vec![1, 2, 3, 2, 1, 0]);
        assert!(!spool.has_pending_timers());
    }

    #[test]
    fn clearing_the_queue_rests_immediately() {
        let mut spool = SpoolAnimator::new(Tempo::new(120));
        spool.on_selection_queued(Some(1), 0.0);
        spool.advance(200.0);
        assert_ne!(spool.position(), 0);

        spool.on_selection_queued(None, 200.0);
        assert_eq!(spool.position(), 0);
        assert!(!spool.has_pending_timers());

        spool.on_tick(1.0, true, 250.0);
        spool.on_selection_queued(Some(1), 250.0);
        spool.on_tick(1.0, true, 260.0);
        assert_eq!(spool.position(), 2);
        spool.on_selection_queued(None, 270.0);
        assert_eq!(spool.position(), 0);
        assert_eq!(spool.mode(), SpoolMode::Idle);
    }

    #[test]
    fn starting_playback_flushes_manual_timers() {
        let mut spool = SpoolAnimator::new(Tempo::new(120));
        spool.on_selection_queued(Some(4), 0.0);
        assert!(spool.has_pending_timers());

        spool.on_tick(0.0, true, 10.0);
        assert_eq!(spool.mode(), SpoolMode::Synced);
        assert!(!spool.has_pending_timers());
        spool.on_tick(2.0, true, 1_000.0);
        assert_eq!(spool.position(), 3);
    }

    #[test]
    fn requeue_while_paused_replays_the_cue() {
        let mut spool = SpoolAnimator::new(Tempo::new(120));
        spool.on_selection_queued(Some(4), 0.0);
        spool.advance(501.0);
        assert_eq!(spool.position(), 0);

        spool.on_selection_queued(Some(4), 501.0);
        spool.advance(600.0);
        assert_eq!(spool.position(), 1);
    }

    #[test]
    fn tempo_change_restarts_the_paused_sequence() {
        let mut spool = SpoolAnimator::new(Tempo::new(60));
        spool.on_selection_queued(Some(2), 0.0);
        spool.advance(200.0);
        assert_eq!(spool.position(), 1);

        // 120 BPM: the restarted steps are 500 / 6 ms apart.
        spool.set_tempo(Tempo::new(120), 200.0);
        let step = 500.0 / 6.0;
        let mut seen = Vec::new();
        for n in 1..=6 {
            spool.advance(200.0 + step * n as f64 + 0.001);
            seen.push(spool.position());
        }
        assert_eq!(seen, vec![1, 2, 3, 2, 1, 0]);
        assert!(!spool.has_pending_timers());
    }

    #[test]
    fn tempo_change_leaves_idle_spool_alone() {
        let mut spool = SpoolAnimator::new(Tempo::new(120));
        spool.set_tempo(Tempo::new(90), 0.0);
        assert_eq!(spool.mode(), SpoolMode::Idle);
        assert!(!spool.has_pending_timers());
    }
}
