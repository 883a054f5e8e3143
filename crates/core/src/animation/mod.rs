//! Per-instrument animation flags for the drummer figure.
//!
//! Sound triggers fan out to independent tracks. Each track sets its onset
//! flags right away and schedules its own decay; re-triggering a track first
//! cancels whatever that track still had pending, so a stale decay can never
//! flip a flag belonging to a newer hit.

use serde::{Deserialize, Serialize};

use crate::{pattern::SOUNDS, Millis, Tempo, TimerId, TimerQueue};

/// Independent animation lane with its own timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Track {
    Bell,
    Drum,
    Clap,
    HighHat,
    Kick,
}

const TRACK_COUNT: usize = 5;

impl Track {
    /// Order in which tracks are started when several fire together.
    pub const ALL: [Track; TRACK_COUNT] = [
        Track::Bell,
        Track::Drum,
        Track::Clap,
        Track::HighHat,
        Track::Kick,
    ];

    fn slot(self) -> usize {
        match self {
            Track::Bell => 0,
            Track::Drum => 1,
            Track::Clap => 2,
            Track::HighHat => 3,
            Track::Kick => 4,
        }
    }
}

/// Named boolean exposed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flag {
    Kick,
    HighHat,
    Drum,
    FinishedDrum,
    Clap,
    FinishedClap,
    Bell1,
    Bell2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationState {
    pub kick: bool,
    pub high_hat: bool,
    pub drum: bool,
    pub finished_drum: bool,
    pub clap: bool,
    pub finished_clap: bool,
    pub bell1: bool,
    pub bell2: bool,
}

impl AnimationState {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Kick => self.kick,
            Flag::HighHat => self.high_hat,
            Flag::Drum => self.drum,
            Flag::FinishedDrum => self.finished_drum,
            Flag::Clap => self.clap,
            Flag::FinishedClap => self.finished_clap,
            Flag::Bell1 => self.bell1,
            Flag::Bell2 => self.bell2,
        }
    }

    pub fn any(&self, flags: &[Flag]) -> bool {
        flags.iter().any(|&flag| self.get(flag))
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Tracks driven by each sound number, indexed by `sound - 1`.
const SOUND_TRACKS: [&[Track]; SOUNDS] = [
    &[Track::Kick],
    &[Track::Drum],
    &[Track::HighHat],
    &[Track::Bell],
    &[Track::Drum],
    &[Track::Clap],
    &[Track::Bell],
    &[Track::Bell],
    &[Track::Clap],
    &[Track::Clap],
    &[Track::Drum],
    &[Track::Drum],
    &[Track::Bell],
    &[Track::Bell],
    &[],
    &[],
];

/// Tracks animated by sound number `sound` (1-indexed). Unknown sounds map
/// to no tracks.
pub fn tracks_for_sound(sound: usize) -> &'static [Track] {
    sound
        .checked_sub(1)
        .and_then(|index| SOUND_TRACKS.get(index))
        .copied()
        .unwrap_or(&[])
}

/// A renderable element of the figure and the flags that control it.
///
/// With no `show` flags the node is visible by default; any raised `hide`
/// flag wins over `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureNode {
    pub id: &'static str,
    pub show: &'static [Flag],
    pub hide: &'static [Flag],
}

impl FigureNode {
    pub fn is_visible(&self, state: &AnimationState) -> bool {
        let shown = self.show.is_empty() || state.any(self.show);
        shown && !state.any(self.hide)
    }
}

const ARM_POSES: &[Flag] = &[Flag::Drum, Flag::Clap, Flag::HighHat];

/// The drummer figure shipped with the device face.
pub const FIGURE_NODES: &[FigureNode] = &[
    FigureNode {
        id: "arms-idle",
        show: &[],
        hide: &[
            Flag::Drum,
            Flag::Clap,
            Flag::HighHat,
            Flag::FinishedDrum,
            Flag::FinishedClap,
        ],
    },
    FigureNode {
        id: "arms-drum-hit",
        show: &[Flag::Drum],
        hide: &[],
    },
    FigureNode {
        id: "arms-drum-finished",
        show: &[Flag::FinishedDrum],
        hide: &[Flag::Drum, Flag::Clap, Flag::HighHat, Flag::FinishedClap],
    },
    FigureNode {
        id: "arms-clap-hit",
        show: &[Flag::Clap],
        hide: &[Flag::Drum],
    },
    FigureNode {
        id: "arms-clap-finished",
        show: &[Flag::FinishedClap],
        hide: ARM_POSES,
    },
    FigureNode {
        id: "arms-high-hat",
        show: &[Flag::HighHat],
        hide: &[Flag::Drum, Flag::Clap],
    },
    FigureNode {
        id: "foot-kick",
        show: &[Flag::Kick],
        hide: &[],
    },
    FigureNode {
        id: "foot-idle",
        show: &[],
        hide: &[Flag::Kick],
    },
    FigureNode {
        id: "bell-left",
        show: &[Flag::Bell1],
        hide: &[],
    },
    FigureNode {
        id: "bell-right",
        show: &[Flag::Bell2],
        hide: &[],
    },
    FigureNode {
        id: "bell-idle",
        show: &[],
        hide: &[Flag::Bell1, Flag::Bell2],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnimationEvent {
    BellToggle,
    BellRelease,
    Decay(Track),
}

impl AnimationEvent {
    fn track(self) -> Track {
        match self {
            AnimationEvent::BellToggle | AnimationEvent::BellRelease => Track::Bell,
            AnimationEvent::Decay(track) => track,
        }
    }
}

/// Owns one figure's animation state and every timer that mutates it.
#[derive(Debug)]
pub struct InstrumentAnimationEngine {
    state: AnimationState,
    tempo: Tempo,
    suspended: bool,
    nodes: &'static [FigureNode],
    timers: TimerQueue<AnimationEvent>,
    track_timers: [Vec<TimerId>; TRACK_COUNT],
}

impl InstrumentAnimationEngine {
    pub fn new(tempo: Tempo) -> Self {
        Self::with_nodes(tempo, FIGURE_NODES)
    }

    pub fn with_nodes(tempo: Tempo, nodes: &'static [FigureNode]) -> Self {
        Self {
            state: AnimationState::default(),
            tempo,
            suspended: false,
            nodes,
            timers: TimerQueue::new(),
            track_timers: Default::default(),
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.state.get(flag)
    }

    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    /// Decay length for a single hit.
    pub fn interval(&self) -> Millis {
        self.tempo.sixteenth_ms()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn pending_on(&self, track: Track) -> usize {
        self.track_timers[track.slot()].len()
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Animates a single pad press. `pad` is the zero-based pad position.
    pub fn trigger_animation(&mut self, pad: usize, now: Millis) {
        if self.suspended {
            return;
        }
        if let Some(sound) = pad.checked_add(1) {
            self.interpret(&[sound], now);
        }
    }

    /// Animates the sounds (1-indexed sound numbers) reported for this frame.
    pub fn render_sounds_playing(&mut self, sounds: &[usize], now: Millis) {
        if sounds.is_empty() || self.suspended {
            return;
        }
        self.interpret(sounds, now);
    }

    /// Suspending hides every node and cancels every timer. Resuming shows
    /// the current, idle state; missed hits are not replayed.
    pub fn set_suspended(&mut self, suspended: bool) {
        if suspended == self.suspended {
            return;
        }
        tracing::debug!(suspended, "figure animation suspension changed");
        self.suspended = suspended;
        if suspended {
            self.teardown();
        }
    }

    /// Cancels all pending timers and returns to the idle state.
    pub fn teardown(&mut self) {
        self.clear_timers(None);
        self.state = AnimationState::default();
    }

    /// Runs every decay whose deadline has passed.
    pub fn advance(&mut self, now: Millis) {
        while let Some((id, event)) = self.timers.pop_due(now) {
            self.track_timers[event.track().slot()].retain(|&pending| pending != id);
            tracing::trace!(?event, now, "animation timer fired");
            self.apply(event);
        }
    }

    pub fn is_node_visible(&self, id: &str) -> bool {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .map(|node| !self.suspended && node.is_visible(&self.state))
            .unwrap_or(false)
    }

    /// Identifiers of the nodes currently shown, in table order.
    pub fn visible_nodes(&self) -> Vec<&'static str> {
        if self.suspended {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|node| node.is_visible(&self.state))
            .map(|node| node.id)
            .collect()
    }

    fn interpret(&mut self, sounds: &[usize], now: Millis) {
        let interval = self.interval();
        for track in Track::ALL {
            let hit = sounds
                .iter()
                .any(|&sound| tracks_for_sound(sound).contains(&track));
            if hit {
                self.start(track, interval, now);
            }
        }
    }

    fn start(&mut self, track: Track, interval: Millis, now: Millis) {
        self.clear_timers(Some(track));

        let state = &mut self.state;
        match track {
            Track::Bell => {
                state.bell1 = true;
                state.bell2 = false;

                let step = interval / 2.0;
                for n in 1..=3 {
                    self.schedule(track, now, step * n as f64, AnimationEvent::BellToggle);
                }
                self.schedule(track, now, step * 4.0, AnimationEvent::BellRelease);
                return;
            }
            Track::Drum => {
                state.drum = true;
                state.finished_drum = false;
                state.finished_clap = false;
            }
            Track::Clap => {
                state.clap = true;
                state.finished_clap = false;
                state.finished_drum = false;
            }
            Track::HighHat => {
                state.high_hat = true;
                state.finished_drum = false;
                state.finished_clap = false;
            }
            Track::Kick => state.kick = true,
        }
        self.schedule(track, now, interval, AnimationEvent::Decay(track));
    }

    fn apply(&mut self, event: AnimationEvent) {
        let state = &mut self.state;
        match event {
            AnimationEvent::BellToggle => {
                state.bell1 = !state.bell1;
                state.bell2 = !state.bell2;
            }
            AnimationEvent::BellRelease => {
                state.bell1 = false;
                state.bell2 = false;
            }
            AnimationEvent::Decay(Track::Drum) => {
                state.drum = false;
                state.finished_drum = true;
            }
            AnimationEvent::Decay(Track::Clap) => {
                state.clap = false;
                state.finished_clap = true;
            }
            AnimationEvent::Decay(Track::HighHat) => {
                state.high_hat = false;
                state.finished_drum = true;
            }
            AnimationEvent::Decay(Track::Kick) => state.kick = false,
            AnimationEvent::Decay(Track::Bell) => {}
        }
    }

    fn schedule(&mut self, track: Track, now: Millis, delay: Millis, event: AnimationEvent) {
        let id = self.timers.schedule(now, delay, event);
        self.track_timers[track.slot()].push(id);
    }

    fn clear_timers(&mut self, track: Option<Track>) {
        match track {
            Some(track) => {
                for id in self.track_timers[track.slot()].drain(..) {
                    self.timers.cancel(id);
                }
            }
            None => {
                self.timers.cancel_all();
                self.track_timers.iter_mut().for_each(Vec::clear);
            }
        }
    }
}
