use serde::{Deserialize, Serialize};

/// Steps in one pattern.
pub const STEPS: usize = 16;

/// Sound lanes per step. Sounds are numbered `1..=SOUNDS`.
pub const SOUNDS: usize = 16;

/// One measure of the sequencer: 16 steps, each a bitset over the sound lanes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    steps: [u16; STEPS],
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane_bit(sound: usize) -> Option<u16> {
        (1..=SOUNDS).contains(&sound).then(|| 1 << (sound - 1))
    }

    /// Flips `sound` on `step`. Out-of-range input is ignored and reported as
    /// `false`.
    pub fn toggle(&mut self, step: usize, sound: usize) -> bool {
        match (self.steps.get_mut(step), Self::lane_bit(sound)) {
            (Some(bits), Some(bit)) => {
                *bits ^= bit;
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, step: usize, sound: usize) -> bool {
        match (self.steps.get(step), Self::lane_bit(sound)) {
            (Some(bits), Some(bit)) => bits & bit != 0,
            _ => false,
        }
    }

    /// Sound numbers active on `step`, ascending.
    pub fn sounds_at(&self, step: usize) -> Vec<usize> {
        let Some(&bits) = self.steps.get(step) else {
            return Vec::new();
        };
        (1..=SOUNDS)
            .filter(|&sound| bits & (1 << (sound - 1)) != 0)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|&bits| bits == 0)
    }
}

/// Fixed-size bank of patterns addressed 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBank {
    patterns: Vec<Pattern>,
}

impl PatternBank {
    pub fn new(len: usize) -> Self {
        Self {
            patterns: vec![Pattern::new(); len.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        index.checked_sub(1).and_then(|i| self.patterns.get(i))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pattern> {
        index.checked_sub(1).and_then(|i| self.patterns.get_mut(i))
    }

    /// Flips one note. Unknown patterns, steps or sounds are a no-op.
    pub fn toggle_note(&mut self, index: usize, step: usize, sound: usize) -> bool {
        self.get_mut(index)
            .map(|pattern| pattern.toggle(step, sound))
            .unwrap_or(false)
    }

    /// Clears every pattern.
    pub fn reset(&mut self) {
        self.patterns.iter_mut().for_each(|pattern| *pattern = Pattern::new());
    }
}

impl Default for PatternBank {
    fn default() -> Self {
        Self::new(16)
    }
}
