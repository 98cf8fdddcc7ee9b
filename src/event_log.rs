// src/event_log.rs

//! Append-only, timestamped record of lifecycle and system events.
//!
//! The log keeps at most `capacity` entries. When an append would overflow
//! it, the oldest tenth (at least two entries) is discarded and a single
//! warning entry reporting the drop is appended before the new entry.
//! Entries are never modified after being appended.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, warn};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Position in the log; strictly increasing, never reused.
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S%.3f"), self.message)
    }
}

#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
    dropped_total: u64,
}

impl EventLog {
    /// `capacity` is clamped to at least 2 so there is always room for the
    /// drop notice plus the entry that caused it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
            dropped_total: 0,
        }
    }

    /// Append a message, returning the stored entry's sequence number.
    pub fn append(&mut self, level: LogLevel, message: impl Into<String>) -> u64 {
        if self.entries.len() >= self.capacity {
            self.drop_oldest();
        }
        self.push(level, message.into())
    }

    fn push(&mut self, level: LogLevel, message: String) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(seq, ?level, %message, "event log append");
        self.entries.push_back(LogEntry {
            seq,
            timestamp: Local::now(),
            level,
            message,
        });
        seq
    }

    fn drop_oldest(&mut self) {
        // At least two, so the notice and the incoming entry both fit.
        let dropped = (self.capacity / 10).max(2).min(self.entries.len());
        self.entries.drain(..dropped);
        self.dropped_total += dropped as u64;

        warn!(dropped, capacity = self.capacity, "event log full; dropping oldest entries");
        self.push(
            LogLevel::Warn,
            format!("Event log full; dropped {dropped} oldest entries"),
        );
    }

    /// Entries with `seq > after`, oldest first. `None` returns everything
    /// still retained.
    pub fn entries_since(&self, after: Option<u64>) -> Vec<LogEntry> {
        let start = match after {
            None => 0,
            // `seq` increases along the deque.
            Some(after) => self.entries.partition_point(|e| e.seq <= after),
        };
        self.entries.range(start..).cloned().collect()
    }

    /// Sequence number of the newest entry, if any entry was ever appended.
    pub fn last_seq(&self) -> Option<u64> {
        self.next_seq.checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many entries have been discarded by the overflow policy so far.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }
}
