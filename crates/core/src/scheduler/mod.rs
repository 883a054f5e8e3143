//! Deterministic timer and frame plumbing.
//!
//! Nothing in the core talks to a real clock. Hosts hand timestamps in
//! through [`FrameDriver::tick`], and every component keeps its delayed work
//! in its own [`TimerQueue`] so it can cancel all of it at any moment.

/// Host timestamp in milliseconds.
pub type Millis = f64;

/// Handle to a timer scheduled on a [`TimerQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct PendingTimer<E> {
    id: TimerId,
    deadline: Millis,
    event: E,
}

/// Delay-based timers carrying an event payload of type `E`.
///
/// Due timers are released one at a time through [`TimerQueue::pop_due`], so
/// an event handler that cancels its siblings stops them from firing even if
/// they were due in the same frame.
#[derive(Debug, Clone)]
pub struct TimerQueue<E> {
    pending: Vec<PendingTimer<E>>,
    next_id: u64,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `event` to fire `delay` milliseconds after `now`.
    pub fn schedule(&mut self, now: Millis, delay: Millis, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            id,
            deadline: now + delay.max(0.0),
            event,
        });
        id
    }

    /// Cancels a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|timer| timer.id != id);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the earliest timer whose deadline is `<= now`.
    /// Timers sharing a deadline come out in the order they were scheduled.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerId, E)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.deadline <= now)
            .min_by(|(_, a), (_, b)| a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id)))
            .map(|(index, _)| index)?;

        let timer = self.pending.remove(index);
        Some((timer.id, timer.event))
    }
}

/// Anything the host loop drives once per frame.
pub trait FrameDriver {
    /// Processes one host frame at timestamp `now`.
    fn tick(&mut self, now: Millis);

    /// Whether the driver needs further frames. Hosts stop scheduling
    /// callbacks once this returns `false`.
    fn wants_frame(&self) -> bool;
}

/// Fake host loop: calls `tick` every `interval` milliseconds from `start`
/// up to and including `end`, and stops rescheduling as soon as the driver
/// no longer wants frames. Returns the number of frames delivered.
pub fn run_frames<D: FrameDriver + ?Sized>(
    driver: &mut D,
    start: Millis,
    end: Millis,
    interval: Millis,
) -> usize {
    let interval = if interval > 0.0 { interval } else { 1.0 };
    let mut frames = 0;
    let mut now = start;
    while now <= end {
        driver.tick(now);
        frames += 1;
        if !driver.wants_frame() {
            break;
        }
        now = start + interval * frames as f64;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_due_timers_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(0.0, 30.0, "late");
        timers.schedule(0.0, 10.0, "early");
        timers.schedule(0.0, 10.0, "early-second");

        assert!(timers.pop_due(5.0).is_none());
        assert_eq!(timers.pop_due(40.0).map(|(_, e)| e), Some("early"));
        assert_eq!(timers.pop_due(40.0).map(|(_, e)| e), Some("early-second"));
        assert_eq!(timers.pop_due(40.0).map(|(_, e)| e), Some("late"));
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(0.0, 10.0, ());
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.pop_due(100.0).is_none());
    }

    #[test]
    fn negative_delay_fires_immediately() {
        let mut timers = TimerQueue::new();
        timers.schedule(50.0, -20.0, 1);
        assert!(timers.pop_due(49.9).is_none());
        assert!(timers.pop_due(50.0).is_some());
    }

    struct Counter {
        ticks: Vec<Millis>,
        budget: usize,
    }

    impl FrameDriver for Counter {
        fn tick(&mut self, now: Millis) {
            self.ticks.push(now);
        }

        fn wants_frame(&self) -> bool {
            self.ticks.len() < self.budget
        }
    }

    #[test]
    fn fake_host_delivers_evenly_spaced_frames() {
        let mut counter = Counter {
            ticks: Vec::new(),
            budget: usize::MAX,
        };
        let frames = run_frames(&mut counter, 100.0, 140.0, 10.0);
        assert_eq!(frames, 5);
        assert_eq!(counter.ticks, vec![100.0, 110.0, 120.0, 130.0, 140.0]);
    }

    #[test]
    fn fake_host_stops_once_driver_is_idle() {
        let mut idle = Counter {
            ticks: Vec::new(),
            budget: 0,
        };
        assert_eq!(run_frames(&mut idle, 0.0, 1_000.0, 10.0), 1);

        let mut short = Counter {
            ticks: Vec::new(),
            budget: 3,
        };
        assert_eq!(run_frames(&mut short, 0.0, 1_000.0, 10.0), 3);
        assert_eq!(short.ticks, vec![0.0, 10.0, 20.0]);
    }
}
