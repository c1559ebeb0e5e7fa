use std::collections::VecDeque;

use chrono::{DateTime, Local};
use derive_more::Display;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 10;

/// Failure text longer than this is cut, the panel only shows abbreviated errors
pub const MAX_FAILURE_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Marker {
    #[display("✓")]
    Success,
    #[display("❌")]
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub marker: Marker,
    pub text: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.at.format("%H:%M:%S"), self.marker, self.text)
    }
}

/// Bounded FIFO of progress messages, newest last
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DebugLog {
    /// Capacity is at least one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push_at(Local::now(), Marker::Success, text);
    }

    pub fn failure(&mut self, text: impl Into<String>) {
        self.push_at(Local::now(), Marker::Failure, text);
    }

    pub fn push_at(&mut self, at: DateTime<Local>, marker: Marker, text: impl Into<String>) {
        let mut text = text.into();
        match marker {
            Marker::Success => debug!(entry = %text, "debug log"),
            Marker::Failure => {
                warn!(entry = %text, "debug log");
                text = abbreviate(&text, MAX_FAILURE_CHARS);
            }
        }

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry { at, marker, text });
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
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

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.marker == Marker::Failure)
            .count()
    }

    /// `HH:MM:SS ✓ text` lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::to_string).collect()
    }
}

fn abbreviate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let mut cut: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
