use serde::{Deserialize, Serialize};

use crate::Millis;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Tempo in beats per minute. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u32")]
pub struct Tempo(u32);

impl Tempo {
    pub const DEFAULT: Tempo = Tempo(120);

    /// Builds a tempo, treating anything below 1 BPM as 1.
    pub fn new(bpm: i64) -> Self {
        Self(bpm.clamp(1, u32::MAX as i64) as u32)
    }

    pub fn bpm(self) -> u32 {
        self.0
    }

    /// Length of one quarter-note beat.
    pub fn beat_ms(self) -> Millis {
        MS_PER_MINUTE / self.0 as f64
    }

    /// Length of one sixteenth note, i.e. one step of the beat-grid.
    pub fn sixteenth_ms(self) -> Millis {
        self.beat_ms() / 4.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i64> for Tempo {
    fn from(bpm: i64) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(tempo: Tempo) -> Self {
        tempo.0
    }
}

/// Ordered list of tempos the BPM button cycles through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoPresets {
    presets: Vec<Tempo>,
    default: Tempo,
}

impl TempoPresets {
    /// Builds the preset cycle. An empty list falls back to the default tempo
    /// alone.
    pub fn new(presets: impl IntoIterator<Item = Tempo>, default: Tempo) -> Self {
        let mut presets: Vec<Tempo> = presets.into_iter().collect();
        if presets.is_empty() {
            presets.push(default);
        }
        Self { presets, default }
    }

    pub fn presets(&self) -> &[Tempo] {
        &self.presets
    }

    pub fn default_tempo(&self) -> Tempo {
        self.default
    }

    /// Preset following `current`, wrapping around. Tempos outside the cycle
    /// jump to the first preset.
    pub fn next_after(&self, current: Tempo) -> Tempo {
        match self.presets.iter().position(|&preset| preset == current) {
            Some(index) => self.presets[(index + 1) % self.presets.len()],
            None => self.presets[0],
        }
    }
}

impl Default for TempoPresets {
    fn default() -> Self {
        Self::new(
            [Tempo::new(80), Tempo::new(120), Tempo::new(140)],
            Tempo::DEFAULT,
        )
    }
}
