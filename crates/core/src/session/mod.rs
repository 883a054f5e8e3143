//! Host-facing façade over the clock, queue and animators.
//!
//! A [`Session`] is fed timestamps and user commands by the host and hands
//! back a [`Frame`] describing what should be on screen.

use serde::Serialize;

use crate::{
    clock::NOT_PLAYING,
    store::{self, KeyValueStore, BPM_KEY},
    AnimationState, AppConfig, BeatClock, FrameDriver, InstrumentAnimationEngine, Millis,
    PatternBank, PatternQueueManager, QueueTransition, SpoolAnimator, Tempo, TempoPresets,
};

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub time: Millis,
    pub current_beat: f64,
    pub playing: bool,
    pub beat_index: i32,
    pub bpm: Tempo,
    pub selected_pattern: usize,
    pub queued_pattern: Option<usize>,
    pub prequeued_pattern: Option<usize>,
    pub flags: AnimationState,
    pub spool: u8,
    pub visible_nodes: Vec<&'static str>,
}

#[derive(Debug)]
pub struct Session<S: KeyValueStore> {
    store: S,
    presets: TempoPresets,
    bank: PatternBank,
    clock: BeatClock,
    queue: PatternQueueManager,
    animation: InstrumentAnimationEngine,
    spool: SpoolAnimator,
    last_beat_index: i32,
    now: Millis,
}

impl<S: KeyValueStore> Session<S> {
    /// Builds a session, restoring tempo and selected pattern from `store`.
    pub fn new(config: &AppConfig, store: S) -> Self {
        let presets = config.tempo.presets();
        let tempo = store::load_value::<Tempo>(&store, BPM_KEY)
            .unwrap_or_else(|| presets.default_tempo());
        let queue = PatternQueueManager::load(&store, config.bank.patterns);

        tracing::debug!(
            bpm = tempo.bpm(),
            selected = queue.selected_pattern(),
            "session restored"
        );

        Self {
            store,
            presets,
            bank: PatternBank::new(config.bank.patterns),
            clock: BeatClock::new(tempo),
            queue,
            animation: InstrumentAnimationEngine::new(tempo),
            spool: SpoolAnimator::new(tempo),
            last_beat_index: NOT_PLAYING,
            now: 0.0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bank(&self) -> &PatternBank {
        &self.bank
    }

    pub fn tempo(&self) -> Tempo {
        self.clock.tempo()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn selected_pattern(&self) -> usize {
        self.queue.selected_pattern()
    }

    pub fn play(&mut self, now: Millis) {
        self.now = now;
        self.clock.play();
        self.sync_transport(now);
    }

    pub fn pause(&mut self, now: Millis) {
        self.now = now;
        self.clock.pause();
        self.sync_transport(now);
    }

    pub fn toggle_playing(&mut self, now: Millis) {
        if self.clock.is_playing() {
            self.pause(now);
        } else {
            self.play(now);
        }
    }

    /// Sets the tempo (clamped to at least 1 BPM) and persists it.
    pub fn set_tempo(&mut self, bpm: i64, now: Millis) {
        self.apply_tempo(Tempo::new(bpm), now);
    }

    /// Steps to the next preset tempo.
    pub fn next_tempo(&mut self, now: Millis) -> Tempo {
        let next = self.presets.next_after(self.clock.tempo());
        self.apply_tempo(next, now);
        next
    }

    /// Requests a switch to pattern `index` (1-indexed). Out-of-range
    /// requests return `false` and change nothing.
    pub fn queue_pattern(&mut self, index: usize, now: Millis) -> bool {
        self.now = now;
        let playing = self.clock.is_playing();
        let accepted =
            self.queue
                .queue_pattern(index, playing, self.clock.tempo(), now, &mut self.store);
        if accepted && !playing {
            self.spool.on_selection_queued(self.queue.queued(), now);
        }
        accepted
    }

    /// Animates a pad press. `pad` is the zero-based pad position.
    pub fn trigger_sound(&mut self, pad: usize, now: Millis) {
        self.now = now;
        self.animation.advance(now);
        self.animation.trigger_animation(pad, now);
    }

    /// Flips a note on the selected pattern.
    pub fn toggle_note(&mut self, step: usize, sound: usize) -> bool {
        let selected = self.queue.selected_pattern();
        self.bank.toggle_note(selected, step, sound)
    }

    pub fn set_suspended(&mut self, suspended: bool, now: Millis) {
        self.now = now;
        self.animation.set_suspended(suspended);
    }

    /// Stops playback and returns patterns and tempo to their defaults.
    /// Every pending timer is dropped.
    pub fn reset(&mut self, now: Millis) {
        tracing::debug!("session reset");
        self.bank.reset();
        self.clock.pause();
        self.queue.clear();
        self.spool.reset();
        self.animation.teardown();
        self.last_beat_index = NOT_PLAYING;
        self.apply_tempo(self.presets.default_tempo(), now);
    }

    /// Processes one host frame and returns the resulting snapshot.
    ///
    /// Only the step the clock lands on is examined. A frame longer than a
    /// sixteenth note can jump over step 12 or 15, which delays a pending
    /// switch by a full measure, and the sounds of skipped steps are never
    /// animated.
    pub fn tick(&mut self, now: Millis) -> Frame {
        self.step(now);
        self.frame()
    }

    pub fn frame(&self) -> Frame {
        Frame {
            time: self.now,
            current_beat: self.clock.current_beat(),
            playing: self.clock.is_playing(),
            beat_index: self.clock.current_beat_index(),
            bpm: self.clock.tempo(),
            selected_pattern: self.queue.selected_pattern(),
            queued_pattern: self.queue.queued(),
            prequeued_pattern: self.queue.prequeued(),
            flags: self.animation.state(),
            spool: self.spool.position(),
            visible_nodes: self.animation.visible_nodes(),
        }
    }

    fn step(&mut self, now: Millis) {
        self.now = now;
        self.clock.tick(now);
        let beat_index = self.clock.current_beat_index();
        let queued_before = self.queue.queued();

        self.queue.advance(now);
        self.animation.advance(now);

        if beat_index != self.last_beat_index {
            self.last_beat_index = beat_index;
            if let Ok(step) = usize::try_from(beat_index) {
                let sounds = self
                    .bank
                    .get(self.queue.selected_pattern())
                    .map(|pattern| pattern.sounds_at(step))
                    .unwrap_or_default();
                self.animation.render_sounds_playing(&sounds, now);
            }
        }

        match self.queue.on_beat_index(beat_index, &mut self.store) {
            Some(QueueTransition::Promoted(index)) => {
                tracing::info!(index, "pattern switch armed");
            }
            Some(QueueTransition::Committed(index)) => {
                tracing::info!(index, "pattern switched");
            }
            None => {}
        }

        if self.queue.queued() != queued_before {
            self.spool.on_selection_queued(self.queue.queued(), now);
        }

        self.spool
            .on_tick(self.clock.current_beat(), self.clock.is_playing(), now);
    }

    fn sync_transport(&mut self, now: Millis) {
        if !self.clock.is_playing() {
            self.last_beat_index = NOT_PLAYING;
        }
        self.spool
            .on_tick(self.clock.current_beat(), self.clock.is_playing(), now);
    }

    fn apply_tempo(&mut self, tempo: Tempo, now: Millis) {
        self.now = now;
        self.clock.set_tempo(tempo);
        self.animation.set_tempo(tempo);
        self.spool.set_tempo(tempo, now);
        store::persist(&mut self.store, BPM_KEY, &tempo);
    }
}

impl<S: KeyValueStore> FrameDriver for Session<S> {
    fn tick(&mut self, now: Millis) {
        self.step(now);
    }

    fn wants_frame(&self) -> bool {
        self.clock.is_playing()
            || self.queue.has_pending_timers()
            || self.animation.has_pending_timers()
            || self.spool.has_pending_timers()
    }
}
