//! Debounced rebuild state machine for watch mode.
//!
//! ```text
//!            record()                 poll() past deadline
//!   Idle ─────────────► Collecting ─────────────────────► Rebuilding
//!    ▲                    │    ▲                              │
//!    │                    └────┘ record() resets deadline     │
//!    │                                                        │
//!    └──────── finish(), queue empty ◄────────────────────────┤
//!                                                             │
//!              Collecting ◄──── finish(), events deferred ────┘
//! ```
//!
//! Events recorded while `Rebuilding` are deferred to the next cycle rather
//! than dropped. Time comes from a [`Clock`] so tests can step it by hand.

use std::mem;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long the watch loop blocks when nothing is pending.
pub const IDLE_WAIT: Duration = Duration::from_secs(60);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Kind of filesystem change, after rename events are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Add,
    Change,
    Unlink,
}

impl FileEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub kind: FileEvent,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildState {
    Idle,
    Collecting { deadline: Instant },
    Rebuilding,
}

pub struct RebuildController<C: Clock = SystemClock> {
    clock: C,
    window: Duration,
    state: RebuildState,
    queue: Vec<QueuedEvent>,
}

impl RebuildController<SystemClock> {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl<C: Clock> RebuildController<C> {
    pub fn with_clock(window: Duration, clock: C) -> Self {
        Self {
            clock,
            window,
            state: RebuildState::Idle,
            queue: Vec::new(),
        }
    }

    pub const fn state(&self) -> RebuildState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue an event and, unless a rebuild is running, restart the window.
    pub fn record(&mut self, kind: FileEvent, path: PathBuf) {
        self.queue.push(QueuedEvent { kind, path });
        if self.state != RebuildState::Rebuilding {
            self.state = RebuildState::Collecting {
                deadline: self.clock.now() + self.window,
            };
        }
    }

    /// Take the queue once the window has passed quietly.
    ///
    /// On `Some` the controller is `Rebuilding` until [`Self::finish`].
    pub fn poll(&mut self) -> Option<Vec<QueuedEvent>> {
        match self.state {
            RebuildState::Collecting { deadline } if self.clock.now() >= deadline => {
                self.state = RebuildState::Rebuilding;
                Some(mem::take(&mut self.queue))
            }
            _ => None,
        }
    }

    /// End the rebuild, successful or not.
    pub fn finish(&mut self) {
        if self.state != RebuildState::Rebuilding {
            return;
        }
        self.state = if self.queue.is_empty() {
            RebuildState::Idle
        } else {
            RebuildState::Collecting {
                deadline: self.clock.now() + self.window,
            }
        };
    }

    /// How long the caller may block before polling again.
    pub fn wait_time(&self) -> Duration {
        match self.state {
            RebuildState::Collecting { deadline } => {
                deadline.saturating_duration_since(self.clock.now())
            }
            RebuildState::Idle | RebuildState::Rebuilding => IDLE_WAIT,
        }
    }
}
