//! Attendance input for the scoring engine.
//!
//! Attendance is computed outside this crate (typically from imported raid
//! logs); the engine only asks for a count per player.

use crate::registry::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supplies the number of raids (or boss kills) a player attended.
pub trait AttendanceSource: Send + Sync {
    fn attendance_count_for(&self, player: &str) -> u32;
}

/// Attendance counts keyed by normalised player name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, u32>", into = "HashMap<String, u32>")]
pub struct AttendanceTable {
    counts: HashMap<String, u32>,
}

impl AttendanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<S: AsRef<str>>(counts: impl IntoIterator<Item = (S, u32)>) -> Self {
        let mut table = Self::new();
        for (name, count) in counts {
            table.set(name.as_ref(), count);
        }
        table
    }

    pub fn set(&mut self, player: &str, count: u32) {
        self.counts.insert(normalize_name(player), count);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl From<HashMap<String, u32>> for AttendanceTable {
    fn from(counts: HashMap<String, u32>) -> Self {
        Self::from_counts(counts)
    }
}

impl From<AttendanceTable> for HashMap<String, u32> {
    fn from(table: AttendanceTable) -> Self {
        table.counts
    }
}

impl AttendanceSource for AttendanceTable {
    fn attendance_count_for(&self, player: &str) -> u32 {
        self.counts.get(&normalize_name(player)).copied().unwrap_or(0)
    }
}
