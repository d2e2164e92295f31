//! Bookmarks, unique by destination.

use tracing::info;

use crate::address::Destination;

/// Maximum number of tiles shown on the new-tab page.
pub const NEW_TAB_TILES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkEntry {
    pub name: String,
    pub destination: Destination,
}

/// In-memory bookmark list, in insertion order. No durability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkStore {
    entries: Vec<BookmarkEntry>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the stock bookmark.
    pub fn with_defaults() -> Self {
        Self {
            entries: vec![BookmarkEntry {
                name: "Google".to_string(),
                destination: Destination::Url("https://google.com?igu=1".to_string()),
            }],
        }
    }

    /// Adds `destination` if absent, removes it otherwise. Returns `true`
    /// when the destination is bookmarked after the call.
    pub fn toggle(&mut self, name: &str, destination: &Destination) -> bool {
        if self.remove(destination) {
            return false;
        }
        self.entries.push(BookmarkEntry {
            name: name.to_string(),
            destination: destination.clone(),
        });
        info!(%destination, name, "Bookmark added");
        true
    }

    /// Returns `true` if an entry was removed.
    pub fn remove(&mut self, destination: &Destination) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.destination != *destination);
        let removed = self.entries.len() != before;
        if removed {
            info!(%destination, "Bookmark removed");
        }
        removed
    }

    /// Removes every bookmark, seeded ones included.
    pub fn clear(&mut self) {
        let cleared = self.entries.len();
        self.entries.clear();
        info!(cleared, "Bookmarks cleared");
    }

    pub fn contains(&self, destination: &Destination) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.destination == *destination)
    }

    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    /// First `n` entries, for the new-tab tiles.
    pub fn top(&self, n: usize) -> &[BookmarkEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
