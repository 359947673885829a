//! Bounded retention window for derived events.
//!
//! Newest first. Entries fall out when the window is over capacity or when
//! they are older than `max_age` at the last prune.

use super::BattleEvent;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DEFAULT_MAX_EVENTS: usize = 50;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15);

/// A derived event as retained for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    /// Monotonic across the whole process, including across battles.
    pub seq: u64,
    pub recorded_at: Instant,
    pub event: BattleEvent,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LoggedEvent>,
    max_events: usize,
    max_age: Duration,
    next_seq: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_MAX_AGE)
    }
}

impl EventLog {
    pub fn new(max_events: usize, max_age: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_events),
            max_events,
            max_age,
            next_seq: 0,
        }
    }

    /// Prepend `events` (given oldest first) and enforce the count cap.
    pub fn append(&mut self, events: impl IntoIterator<Item = BattleEvent>, now: Instant) {
        for event in events {
            self.entries.push_front(LoggedEvent {
                seq: self.next_seq,
                recorded_at: now,
                event,
            });
            self.next_seq += 1;
        }
        self.entries.truncate(self.max_events);
    }

    /// Drop everything older than `max_age` as of `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.back() {
            if now.saturating_duration_since(oldest.recorded_at) > self.max_age {
                self.entries.pop_back();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LoggedEvent> {
        self.entries.iter().cloned().collect()
    }
}
