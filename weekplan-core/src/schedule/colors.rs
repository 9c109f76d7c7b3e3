//! Stable task colors keyed by the first word of a task's name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Colors handed out to new first-words, in order.
pub const PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899", "#EF4444", "#6B7280", "#14B8A6",
];

/// Persisted `first word -> color` assignments.
///
/// Every task whose name starts with the same word (case-insensitive) gets
/// the same color; unseen words take the next palette entry round-robin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorTable {
    #[serde(default)]
    assignments: BTreeMap<String, String>,
    #[serde(default)]
    next: usize,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The color for `name`, assigning one if its first word is new.
    pub fn color_for(&mut self, name: &str) -> String {
        let key = first_word(name);

        if let Some(color) = self.assignments.get(&key) {
            return color.clone();
        }

        let color = PALETTE[self.next % PALETTE.len()].to_string();
        self.next = (self.next + 1) % PALETTE.len();
        self.assignments.insert(key, color.clone());
        color
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

fn first_word(name: &str) -> String {
    name.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
