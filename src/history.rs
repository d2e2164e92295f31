//! Navigation history: append-only, cleared only in bulk.

use chrono::{DateTime, Local};
use tracing::info;

use crate::address::Destination;

/// One navigation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub destination: Destination,
    pub display_name: String,
    pub timestamp: DateTime<Local>,
}

/// In-memory history log. Entries are never edited once recorded.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, destination: Destination, display_name: String) {
        self.record_at(destination, display_name, Local::now());
    }

    pub fn record_at(
        &mut self,
        destination: Destination,
        display_name: String,
        timestamp: DateTime<Local>,
    ) {
        self.entries.push(HistoryEntry {
            destination,
            display_name,
            timestamp,
        });
    }

    /// Newest first.
    pub fn recent(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    /// Case-insensitive match on name or destination, newest first.
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a HistoryEntry> {
        let needle = query.trim().to_lowercase();
        self.recent().filter(move |entry| {
            needle.is_empty()
                || entry.display_name.to_lowercase().contains(&needle)
                || entry.destination.to_string().to_lowercase().contains(&needle)
        })
    }

    pub fn clear(&mut self) {
        let cleared = self.entries.len();
        self.entries.clear();
        info!(cleared, "History cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
