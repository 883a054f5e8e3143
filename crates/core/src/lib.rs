//! Core engine for the Pocket Operator tribute.
//!
//! The crate turns host frame timestamps and user commands into playback
//! state: a beat clock, a beat-quantized pattern queue, and the timer-driven
//! animation flags for the drummer figure and the sewing-machine spool.
//! Rendering, sound generation and persistence backends live outside; they
//! plug in through [`FrameDriver`] and [`KeyValueStore`].

pub mod animation;
pub mod clock;
pub mod config;
pub mod error;
pub mod pattern;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod spool;
pub mod store;
pub mod tempo;

pub use animation::{AnimationState, FigureNode, Flag, InstrumentAnimationEngine, Track};
pub use clock::BeatClock;
pub use config::{AppConfig, BankConfig, HostConfig, TempoConfig};
pub use error::{PocketError, Result};
pub use pattern::{Pattern, PatternBank};
pub use queue::{PatternQueueManager, QueueState, QueueTransition};
pub use scheduler::{run_frames, FrameDriver, Millis, TimerId, TimerQueue};
pub use session::{Frame, Session};
pub use spool::{SpoolAnimator, SpoolMode};
pub use store::{KeyValueStore, MemoryStore};
pub use tempo::{Tempo, TempoPresets};
