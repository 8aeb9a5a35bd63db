//! Bounded in-process record of applied migrations

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;

/// Default number of entries kept
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// One migration run that changed a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Value of the document's `id` field, if any
    pub entity_id: Option<String>,
    pub from_version: u32,
    pub to_version: u32,
    pub steps_applied: Vec<String>,
    pub errors: Vec<String>,
}

/// Ring buffer of [`MigrationLogEntry`]; the oldest entry is evicted first
#[derive(Debug)]
pub struct MigrationLog {
    capacity: usize,
    entries: Mutex<VecDeque<MigrationLogEntry>>,
}

impl MigrationLog {
    /// Create log keeping at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn record(&self, entry: MigrationLogEntry) {
        let mut guard = self.entries.lock();
        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    /// Snapshot of all entries, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<MigrationLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Human-readable report of the most recent `limit` entries
    #[must_use]
    pub fn report(&self, current_version: u32, limit: usize) -> String {
        let entries = self.entries();
        let mut out = String::new();
        let _ = writeln!(out, "=== Schema Migration Report ===");
        let _ = writeln!(out, "Current version: v{current_version}");
        let _ = writeln!(out, "Migrations logged: {}", entries.len());

        let skip = entries.len().saturating_sub(limit);
        for (idx, entry) in entries.iter().skip(skip).enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{}. entity {}",
                idx + 1,
                entry.entity_id.as_deref().unwrap_or("<unknown>")
            );
            let _ = writeln!(out, "   time: {}", entry.timestamp.to_rfc3339());
            let _ = writeln!(out, "   version: v{} → v{}", entry.from_version, entry.to_version);
            let steps = if entry.steps_applied.is_empty() {
                "none".to_string()
            } else {
                entry.steps_applied.join(", ")
            };
            let _ = writeln!(out, "   steps: {steps}");
            if !entry.errors.is_empty() {
                let _ = writeln!(out, "   errors: {}", entry.errors.join(", "));
            }
        }
        out
    }
}

impl Default for MigrationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
