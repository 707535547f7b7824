//! Trending model and related types
//!
//! Models for ranked trending snapshots and the change events produced by
//! comparing two of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a ranked trending list. Position 1 is the top spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    pub name: String,
    pub position: u32,
}

/// The current ranked list for one language bucket.
///
/// `language` is empty for the cross-language "all" feed. The content hash
/// fingerprints the list so an unchanged republication can be detected
/// without diffing. Snapshots are replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingSnapshot {
    pub language: String,
    pub content_hash: String,
    pub entries: Vec<TrendingEntry>,
}

impl TrendingSnapshot {
    pub fn new(
        language: impl Into<String>,
        content_hash: impl Into<String>,
        entries: Vec<TrendingEntry>,
    ) -> Self {
        Self {
            language: language.into(),
            content_hash: content_hash.into(),
            entries,
        }
    }
}

/// Kind of change an entry underwent between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present in the old list, gone from the new one.
    Removed,
    /// Absent from the old list, present in the new one.
    New,
    /// Present in both lists at a different position.
    Changed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::New => "new",
            Self::Changed => "changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single classified change, consumed immediately by notification
/// dispatch and never persisted.
///
/// `position` is the entry's new position for `New` and `Changed`, and its
/// last known position for `Removed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendChange {
    pub kind: ChangeKind,
    pub name: String,
    pub position: u32,
    pub language: String,
}

/// Outcome summary of one trending update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrendingUpdate {
    /// The incoming hash matched the stored one; nothing was done.
    Unchanged,
    /// The snapshot was replaced and notifications dispatched.
    Applied {
        removed: usize,
        changed: usize,
        new: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kind_round_trips_as_string() {
        for kind in [ChangeKind::Removed, ChangeKind::New, ChangeKind::Changed] {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = TrendingSnapshot::new(
            "rust",
            "abc123",
            vec![TrendingEntry {
                name: "octo/repo".to_string(),
                position: 1,
            }],
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"contentHash\":\"abc123\""));
        assert!(json.contains("\"position\":1"));
    }
}
