use crate::{Millis, Tempo};

/// Number of sixteenth-note steps in one measure of the beat-grid.
pub const STEPS_PER_MEASURE: u32 = 16;

/// Beat index reported while the clock is stopped.
pub const NOT_PLAYING: i32 = -1;

/// Converts host frame timestamps into a fractional sixteenth-note counter.
///
/// The clock only advances inside [`BeatClock::tick`]. Pausing rewinds to the
/// top of the measure, so resuming always starts from step 0.
#[derive(Debug, Default, Clone)]
pub struct BeatClock {
    beat_counter: f64,
    playing: bool,
    last_frame: Option<Millis>,
    tempo: Tempo,
}

impl BeatClock {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            tempo,
            ..Self::default()
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Changes the tempo. The next tick measures no elapsed time so frames
    /// straddling the change are never converted at the new rate.
    pub fn set_tempo(&mut self, tempo: Tempo) {
        if tempo != self.tempo {
            tracing::debug!(bpm = tempo.bpm(), "clock tempo changed");
            self.tempo = tempo;
            self.last_frame = None;
        }
    }

    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.last_frame = None;
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.beat_counter = 0.0;
        self.last_frame = None;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Fractional count of sixteenth notes since playback started.
    pub fn current_beat(&self) -> f64 {
        self.beat_counter
    }

    /// Step within the current measure, or [`NOT_PLAYING`] while stopped.
    pub fn current_beat_index(&self) -> i32 {
        if self.playing {
            (self.beat_counter.floor() as u64 % STEPS_PER_MEASURE as u64) as i32
        } else {
            NOT_PLAYING
        }
    }

    /// Advances the counter by the time elapsed since the previous frame.
    ///
    /// Returns `false` once the clock is stopped; the host must not schedule
    /// another frame for it after that.
    pub fn tick(&mut self, now: Millis) -> bool {
        if !self.playing {
            return false;
        }

        let previous = *self.last_frame.get_or_insert(now);
        self.last_frame = Some(now);

        let elapsed = now - previous;
        if elapsed > 0.0 {
            self.beat_counter += elapsed / self.tempo.sixteenth_ms();
        }
        true
    }
}
