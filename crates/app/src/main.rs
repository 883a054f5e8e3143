use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use pocket_operator_core::{
    run_frames, AppConfig, Frame, FrameDriver, MemoryStore, Millis, Session,
};
use tracing_subscriber::EnvFilter;

fn main() -> pocket_operator_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulation(args),
    }
}

fn run_simulation(args: SimulateArgs) -> pocket_operator_core::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    tracing::info!(config = ?args.config, duration_ms = args.duration_ms, "starting simulation");

    let mut session = Session::new(&config, MemoryStore::new());
    if let Some(bpm) = args.bpm {
        session.set_tempo(bpm, 0.0);
    }
    for note in &args.notes {
        if !session.toggle_note(note.step, note.sound) {
            tracing::warn!(step = note.step, sound = note.sound, "ignoring note outside the grid");
        }
    }
    if !args.paused {
        session.play(0.0);
    }

    let mut commands: Vec<Command> = args
        .queue_at
        .iter()
        .map(|timed| Command::Queue(*timed))
        .chain(args.hit_at.iter().map(|timed| Command::Hit(*timed)))
        .collect();
    commands.sort_by(|a, b| a.at().total_cmp(&b.at()));

    let mut simulation = Simulation {
        session,
        commands: commands.into_iter().peekable(),
        last: None,
        json: args.json,
    };

    let frames = run_frames(
        &mut simulation,
        0.0,
        args.duration_ms,
        config.host.frame_interval_ms,
    );
    tracing::info!(frames, "simulation finished");
    simulation.flush()
}

/// Fake host: replays scheduled commands and prints every visible change.
struct Simulation {
    session: Session<MemoryStore>,
    commands: std::iter::Peekable<std::vec::IntoIter<Command>>,
    last: Option<Frame>,
    json: bool,
}

impl Simulation {
    fn report(&mut self, frame: Frame) -> pocket_operator_core::Result<()> {
        let changed = self.last.as_ref().map_or(true, |last| {
            last.beat_index != frame.beat_index
                || last.selected_pattern != frame.selected_pattern
                || last.queued_pattern != frame.queued_pattern
                || last.prequeued_pattern != frame.prequeued_pattern
                || last.spool != frame.spool
                || last.flags != frame.flags
        });
        if changed {
            if self.json {
                println!("{}", serde_json::to_string(&frame)?);
            } else {
                println!(
                    "{:>9.1}ms step {:>2} pattern {:>2} queued {:<4} spool {} nodes {}",
                    frame.time,
                    frame.beat_index,
                    frame.selected_pattern,
                    frame
                        .queued_pattern
                        .or(frame.prequeued_pattern)
                        .map(|index| index.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    frame.spool,
                    frame.visible_nodes.join(","),
                );
            }
        }
        self.last = Some(frame);
        Ok(())
    }

    fn flush(&mut self) -> pocket_operator_core::Result<()> {
        let frame = self.session.frame();
        self.last = None;
        self.report(frame)
    }
}

impl FrameDriver for Simulation {
    fn tick(&mut self, now: Millis) {
        while let Some(command) = self.commands.next_if(|command| command.at() <= now) {
            match command {
                Command::Queue(timed) => {
                    if !self.session.queue_pattern(timed.value, now) {
                        tracing::warn!(pattern = timed.value, "pattern not in bank");
                    }
                }
                Command::Hit(timed) => self.session.trigger_sound(timed.value, now),
            }
        }

        let frame = self.session.tick(now);
        if let Err(err) = self.report(frame) {
            tracing::error!(%err, "failed to print frame");
        }
    }

    fn wants_frame(&self) -> bool {
        self.session.wants_frame() || self.commands.len() > 0
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Queue(Timed),
    Hit(Timed),
}

impl Command {
    fn at(&self) -> Millis {
        match self {
            Command::Queue(timed) | Command::Hit(timed) => timed.at,
        }
    }
}

/// `<at>:<value>` pair given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Timed {
    at: Millis,
    value: usize,
}

impl FromStr for Timed {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (at, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected <at>:<value>, got `{raw}`"))?;
        let at: Millis = at
            .trim()
            .parse()
            .map_err(|_| format!("invalid time `{at}`"))?;
        let value = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid value `{value}`"))?;
        if !at.is_finite() || at < 0.0 {
            return Err(format!("time must be a non-negative number, got `{at}`"));
        }
        Ok(Self { at, value })
    }
}

/// `<step>:<sound>` note given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NoteArg {
    step: usize,
    sound: usize,
}

impl FromStr for NoteArg {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (step, sound) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected <step>:<sound>, got `{raw}`"))?;
        Ok(Self {
            step: step.trim().parse().map_err(|_| format!("invalid step `{step}`"))?,
            sound: sound.trim().parse().map_err(|_| format!("invalid sound `{sound}`"))?,
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pocket Operator tribute engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a session with a fake frame loop and print what changes.
    Simulate(SimulateArgs),
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Tempo override in BPM.
    #[arg(long, allow_negative_numbers = true)]
    bpm: Option<i64>,
    /// Length of the simulated run.
    #[arg(long, default_value_t = 4_000.0)]
    duration_ms: Millis,
    /// Request a pattern switch, as `<ms>:<pattern>`.
    #[arg(long = "queue-at")]
    queue_at: Vec<Timed>,
    /// Press a pad, as `<ms>:<pad>` with zero-based pads.
    #[arg(long = "hit-at")]
    hit_at: Vec<Timed>,
    /// Enable a note on the selected pattern, as `<step>:<sound>`.
    #[arg(long = "note")]
    notes: Vec<NoteArg>,
    /// Start stopped instead of playing.
    #[arg(long)]
    paused: bool,
    /// Print frames as JSON lines.
    #[arg(long)]
    json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timed_arguments() {
        assert_eq!("250:3".parse::<Timed>(), Ok(Timed { at: 250.0, value: 3 }));
        assert_eq!(" 12.5 : 7".parse::<Timed>(), Ok(Timed { at: 12.5, value: 7 }));
        assert!("250".parse::<Timed>().is_err());
        assert!("-1:3".parse::<Timed>().is_err());
        assert!("x:3".parse::<Timed>().is_err());
    }

    #[test]
    fn cli_accepts_repeated_commands() {
        let cli = Cli::try_parse_from([
            "pocket-operator",
            "simulate",
            "--bpm",
            "90",
            "--queue-at",
            "100:2",
            "--queue-at",
            "900:3",
            "--hit-at",
            "50:0",
            "--note",
            "0:1",
            "--json",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command;
        assert_eq!(args.bpm, Some(90));
        assert_eq!(args.queue_at.len(), 2);
        assert_eq!(args.hit_at[0], Timed { at: 50.0, value: 0 });
        assert_eq!(args.notes, vec![NoteArg { step: 0, sound: 1 }]);
        assert!(args.json);
        assert!(!args.paused);
    }

    #[test]
    fn simulation_replays_commands_in_time_order() {
        let mut session = Session::new(&AppConfig::default(), MemoryStore::new());
        session.play(0.0);
        let mut simulation = Simulation {
            session,
            commands: vec![Command::Queue(Timed { at: 10.0, value: 2 })]
                .into_iter()
                .peekable(),
            last: None,
            json: true,
        };
        run_frames(&mut simulation, 0.0, 2_000.0, 15.625);
        assert_eq!(simulation.session.selected_pattern(), 2);
        assert!(simulation.commands.peek().is_none());
    }
}
