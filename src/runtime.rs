use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::debug;

pub const TICK_RATE_MS: u64 = 100;

/// Input to the app loop: a key press, a terminal resize, or elapsed time
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Where the app loop gets its events from
pub trait EventSource: Send + 'static {
    /// Wait up to `timeout` for the next event
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Reads terminal events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let event = match event::read() {
                // Only presses; some terminals also report releases
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for driving the app without a terminal
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (Sender<AppEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Turns an event source and a ticker into a stream of discrete steps.
///
/// Ticks run on a fixed schedule: input arriving between ticks does not push
/// the next one back, so quiz dwell and flashcard timers keep their pace
/// while keys are coming in.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Cell<Instant>,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Cell::new(Instant::now() + ticker.interval());
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    /// Time each `Tick` stands for
    pub fn tick_interval(&self) -> Duration {
        self.ticker.interval()
    }

    /// Next event, blocking no later than the next scheduled tick
    pub fn step(&self) -> AppEvent {
        let now = Instant::now();
        let due = self.next_tick.get();
        if now >= due {
            return self.tick(now);
        }

        match self.event_source.recv_timeout(due - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.tick(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => {
                // No more input; keep ticking at the normal pace
                std::thread::sleep(due.saturating_duration_since(Instant::now()));
                self.tick(Instant::now())
            }
        }
    }

    fn tick(&self, now: Instant) -> AppEvent {
        let interval = self.ticker.interval();
        let mut next = self.next_tick.get() + interval;
        if next <= now {
            // Fell more than a tick behind; skip the missed ticks
            debug!(behind = ?(now - next), "tick schedule slipped");
            next = now + interval;
        }
        self.next_tick.set(next);
        AppEvent::Tick
    }
}
