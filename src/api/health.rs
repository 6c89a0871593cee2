//! Shared stream-session counters for the /health endpoint.
//! Updated by StreamSession and FileListener, read by the API.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::types::SessionState;

#[derive(Debug, Default)]
pub struct SessionStats {
    state: AtomicU8,
    /// Every non-blank line read from the stream.
    pub events_received: AtomicU64,
    /// Statuses appended to the output file.
    pub events_written: AtomicU64,
    /// Retweets and replies dropped by the originality filter.
    pub events_filtered: AtomicU64,
    /// Lines that were not valid stream JSON.
    pub parse_failures: AtomicU64,
    pub write_failures: AtomicU64,
    pub reconnects: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub state: SessionState,
    pub events_received: u64,
    pub events_written: u64,
    pub events_filtered: u64,
    pub parse_failures: u64,
    pub write_failures: u64,
    pub reconnects: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn inc(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state(),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
