//! Debounced autosave scheduling.

use std::time::{Duration, Instant};

/// One-shot debounce timer. The caller supplies the clock.
///
/// Each change pushes the deadline out by the debounce interval, so a
/// commit happens only after the user has been quiet that long.
#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl AutosaveTimer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
        }
    }

    /// A zero debounce disables autosave.
    pub fn is_enabled(&self) -> bool {
        !self.debounce.is_zero()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// (Re)arm after an edit.
    pub fn notify_change(&mut self, now: Instant) {
        if self.is_enabled() {
            self.deadline = Some(now + self.debounce);
        }
    }

    /// Returns `true` once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Change the interval. An armed timer keeps its current deadline
    /// unless autosave was disabled.
    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
        if !self.is_enabled() {
            self.deadline = None;
        }
    }
}
