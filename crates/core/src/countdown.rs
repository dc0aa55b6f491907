//! Pure countdown state used by the exam timer.
//!
//! `Countdown` knows nothing about wall-clock time: whoever owns it calls
//! [`Countdown::tick`] once per elapsed second while it is running.

use std::fmt;

/// Urgency band of the remaining time.
///
/// Ordered so that a running countdown only ever moves to a greater phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerPhase {
    Normal,
    Warning,
    Critical,
    Expired,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running, nothing changed.
    Idle,
    /// Decremented; seconds left.
    Running(u32),
    /// Reached zero on this tick. Reported once per run.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    initial: u32,
    remaining: u32,
    warning: u32,
    critical: u32,
    running: bool,
}

impl Countdown {
    /// `warning_secs` and `critical_secs` are absolute remaining-second marks.
    #[must_use]
    pub fn new(initial_secs: u32, warning_secs: u32, critical_secs: u32) -> Self {
        Self {
            initial: initial_secs,
            remaining: initial_secs,
            warning: warning_secs,
            critical: critical_secs,
            running: false,
        }
    }

    /// Begin counting down. Returns `false` if already running or expired.
    pub fn start(&mut self) -> bool {
        if self.running || self.is_expired() {
            return false;
        }
        self.running = true;
        true
    }

    /// Same as [`Countdown::start`]; kept for call-site readability.
    pub fn resume(&mut self) -> bool {
        self.start()
    }

    /// Stop counting without touching the remaining time.
    pub fn pause(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Restore the full budget and stop.
    pub fn reset(&mut self) {
        self.remaining = self.initial;
        self.running = false;
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            return Tick::Expired;
        }
        Tick::Running(self.remaining)
    }

    #[must_use]
    pub fn phase(&self) -> TimerPhase {
        if self.remaining == 0 {
            TimerPhase::Expired
        } else if self.remaining <= self.critical {
            TimerPhase::Critical
        } else if self.remaining <= self.warning {
            TimerPhase::Warning
        } else {
            TimerPhase::Normal
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn initial(&self) -> u32 {
        self.initial
    }

    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.initial - self.remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    #[must_use]
    pub fn percent_remaining(&self) -> f64 {
        if self.initial == 0 {
            return 0.0;
        }
        f64::from(self.remaining) * 100.0 / f64::from(self.initial)
    }

    /// `HH:MM:SS` while at least an hour is left, `MM:SS` otherwise.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.remaining / 3600;
        let minutes = (self.remaining % 3600) / 60;
        let seconds = self.remaining % 60;
        if hours > 0 {
            write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{minutes:02}:{seconds:02}")
        }
    }
}
