//! Seam between the terminal and the app loop. Raw crossterm input is
//! decoded into the practice vocabulary (ordinary keys, hint
//! hold/release) before the loop sees it, so the session state machine
//! never deals with terminal details like key-release reporting.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind};

/// Events consumed by the app loop, in strict arrival order.
#[derive(Clone, Debug)]
pub enum AppEvent {
    /// A pressed (or repeated) key. The hint key never appears here.
    Key(KeyEvent),
    /// The hint key went down.
    HintHold,
    /// The hint key came back up.
    HintRelease,
    Resize,
    Tick,
}

/// Maps raw terminal events onto `AppEvent`s.
///
/// The hint key is tab. With key-release reporting (the kitty keyboard
/// protocol) hold and release map directly onto press/release pairs.
/// Terminals without it never send a release, so there a press toggles
/// the hold instead and the hint cannot get stuck on.
pub struct InputDecoder {
    release_reporting: bool,
    hint_held: bool,
}

impl InputDecoder {
    pub fn new(release_reporting: bool) -> Self {
        Self {
            release_reporting,
            hint_held: false,
        }
    }

    /// Decode one raw event, or None for events the app ignores
    /// (releases of ordinary keys, focus/paste noise).
    pub fn decode(&mut self, raw: CtEvent) -> Option<AppEvent> {
        match raw {
            CtEvent::Key(key) if key.code == KeyCode::Tab => match key.kind {
                KeyEventKind::Press if !self.release_reporting && self.hint_held => {
                    self.hint_held = false;
                    Some(AppEvent::HintRelease)
                }
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    self.hint_held = true;
                    Some(AppEvent::HintHold)
                }
                KeyEventKind::Release => {
                    self.hint_held = false;
                    Some(AppEvent::HintRelease)
                }
            },
            CtEvent::Key(key) if key.kind == KeyEventKind::Release => None,
            CtEvent::Key(key) => Some(AppEvent::Key(key)),
            CtEvent::Resize(_, _) => Some(AppEvent::Resize),
            _ => None,
        }
    }
}

/// Source of decoded events. Implemented over crossterm in production
/// and over a plain channel in tests.
pub trait EventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production source: a reader thread decodes crossterm events into a
/// channel.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new(release_reporting: bool) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let mut decoder = InputDecoder::new(release_reporting);
            loop {
                match event::read() {
                    Ok(raw) => {
                        if let Some(ev) = decoder.decode(raw) {
                            if tx.send(ev).is_err() {
                                break;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Self { rx }
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test source fed from the sending half of a channel.
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls the next event for the app loop. A quiet tick interval turns
/// into `Tick` so cosmetic timers (the miss flash) still expire.
pub struct Runner<E: EventSource> {
    events: E,
    tick: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(events: E, tick: Duration) -> Self {
        Self { events, tick }
    }

    pub fn step(&self) -> AppEvent {
        match self.events.recv_timeout(self.tick) {
            Ok(ev) => ev,
            Err(_) => AppEvent::Tick,
        }
    }
}
