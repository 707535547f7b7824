//! Trending Diff Engine
//!
//! Compares an incoming ranked trending list against the stored snapshot
//! for a language, classifies each entry as removed, new or repositioned,
//! and fans notifications out to every organization following an affected
//! tracked identity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{ChangeKind, TrendChange, TrendingEntry, TrendingSnapshot, TrendingUpdate};
use crate::services::locks::KeyedLocks;
use crate::services::store::{IdentityDirectory, NotificationSink, StoreError, TrendingStore};

/// Errors that can occur during trending operations
#[derive(Debug, Error)]
pub enum TrendingError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Service that applies trending snapshot updates.
///
/// Updates for the same language are serialized with a per-language mutex;
/// different languages proceed independently.
#[derive(Clone)]
pub struct TrendingDiffEngine {
    store: Arc<dyn TrendingStore>,
    directory: Arc<dyn IdentityDirectory>,
    notifier: Arc<dyn NotificationSink>,
    locks: KeyedLocks,
}

impl TrendingDiffEngine {
    pub fn new(
        store: Arc<dyn TrendingStore>,
        directory: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            locks: KeyedLocks::default(),
        }
    }

    /// Apply a new ranked list for a language.
    ///
    /// An incoming hash equal to the stored one is an unchanged
    /// republication and a complete no-op. Otherwise the current snapshot
    /// is archived (recording the point-in-time boundary the predictor
    /// reads), changes are classified and notified, and the new list
    /// replaces the current snapshot.
    pub async fn update_trending(
        &self,
        language: &str,
        content_hash: &str,
        entries: Vec<TrendingEntry>,
    ) -> Result<TrendingUpdate, TrendingError> {
        let _guard = self.locks.acquire(language).await;

        let current = self.store.current_snapshot(language).await?;
        if let Some(ref snapshot) = current {
            if snapshot.content_hash == content_hash {
                debug!(
                    "Trending list for {:?} republished unchanged (hash {}), skipping",
                    language, content_hash
                );
                return Ok(TrendingUpdate::Unchanged);
            }
        }

        // Boundary marker before the comparison; prediction keys off these.
        self.store.archive_current(language).await?;

        let (removed, changed, new) = classify(current.as_ref(), &entries, language);

        for set in [&removed, &changed, &new] {
            if !set.is_empty() {
                self.dispatch(set).await?;
            }
        }

        self.store
            .replace_current(language, content_hash, &entries)
            .await?;

        info!(
            "Applied trending update for {:?}: {} removed, {} changed, {} new",
            language,
            removed.len(),
            changed.len(),
            new.len()
        );

        Ok(TrendingUpdate::Applied {
            removed: removed.len(),
            changed: changed.len(),
            new: new.len(),
        })
    }

    /// Deliver one change set.
    ///
    /// Entry names with no tracked identity are skipped silently. Every
    /// resolved identity gets one notification per subscriber org; a failed
    /// delivery is logged and never short-circuits the remaining orgs or
    /// identities in the batch.
    async fn dispatch(&self, changes: &[TrendChange]) -> Result<(), TrendingError> {
        let names: Vec<String> = changes.iter().map(|c| c.name.clone()).collect();
        let identities = self.directory.resolve(&names).await?;
        let tracked: HashSet<&str> = identities.iter().map(|i| i.login.as_str()).collect();

        for change in changes {
            if !tracked.contains(change.name.as_str()) {
                continue;
            }

            let orgs = self.directory.subscribers_of(&change.name).await?;
            let (title, body) = notification_text(change);

            for org in &orgs {
                if let Err(e) = self.notifier.notify(org, &title, &body, true).await {
                    warn!(
                        "Failed to notify org {} about {} ({}): {}",
                        org, change.name, change.kind, e
                    );
                }
            }
        }

        Ok(())
    }
}

/// Split the new list against the old snapshot into removed, changed and
/// new change sets. With no old snapshot the entire new list is "new".
fn classify(
    old: Option<&TrendingSnapshot>,
    entries: &[TrendingEntry],
    language: &str,
) -> (Vec<TrendChange>, Vec<TrendChange>, Vec<TrendChange>) {
    let new_names: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let old_positions: HashMap<&str, u32> = old
        .map(|s| {
            s.entries
                .iter()
                .map(|e| (e.name.as_str(), e.position))
                .collect()
        })
        .unwrap_or_default();

    let mut removed = Vec::new();
    let mut changed = Vec::new();
    let mut new = Vec::new();

    if let Some(old) = old {
        for entry in &old.entries {
            if !new_names.contains(entry.name.as_str()) {
                removed.push(TrendChange {
                    kind: ChangeKind::Removed,
                    name: entry.name.clone(),
                    position: entry.position,
                    language: language.to_string(),
                });
            }
        }
    }

    for entry in entries {
        match old_positions.get(entry.name.as_str()) {
            Some(&old_position) if old_position != entry.position => changed.push(TrendChange {
                kind: ChangeKind::Changed,
                name: entry.name.clone(),
                position: entry.position,
                language: language.to_string(),
            }),
            Some(_) => {}
            None => new.push(TrendChange {
                kind: ChangeKind::New,
                name: entry.name.clone(),
                position: entry.position,
                language: language.to_string(),
            }),
        }
    }

    (removed, changed, new)
}

/// Title and body of the in-app notification for one change.
fn notification_text(change: &TrendChange) -> (String, String) {
    let feed = if change.language.is_empty() {
        "the main feed".to_string()
    } else {
        change.language.clone()
    };

    match change.kind {
        ChangeKind::Removed => (
            format!("{} is not trending on GitHub anymore", change.name),
            format!("No longer trending in {}", feed),
        ),
        ChangeKind::New => (
            format!("{} is trending on GitHub", change.name),
            format!("Now trending in {} at position {}", feed, change.position),
        ),
        ChangeKind::Changed => (
            format!("{} changed trending position on GitHub", change.name),
            format!("Now at position {} in {}", change.position, feed),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    use crate::services::store::TrackedIdentity;

    /// In-memory snapshot store recording the order of mutating calls.
    #[derive(Default)]
    struct MemoryTrendingStore {
        current: Mutex<HashMap<String, TrendingSnapshot>>,
        history: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
        ops: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TrendingStore for MemoryTrendingStore {
        async fn current_snapshot(
            &self,
            language: &str,
        ) -> Result<Option<TrendingSnapshot>, StoreError> {
            Ok(self.current.lock().unwrap().get(language).cloned())
        }

        async fn archive_current(&self, language: &str) -> Result<(), StoreError> {
            self.ops.lock().unwrap().push(format!("archive:{language}"));
            self.history
                .lock()
                .unwrap()
                .entry(language.to_string())
                .or_default()
                .push(Utc::now());
            Ok(())
        }

        async fn replace_current(
            &self,
            language: &str,
            content_hash: &str,
            entries: &[TrendingEntry],
        ) -> Result<(), StoreError> {
            self.ops.lock().unwrap().push(format!("replace:{language}"));
            self.current.lock().unwrap().insert(
                language.to_string(),
                TrendingSnapshot::new(language, content_hash, entries.to_vec()),
            );
            Ok(())
        }

        async fn trending_history(
            &self,
            language: &str,
        ) -> Result<Vec<DateTime<Utc>>, StoreError> {
            Ok(self
                .history
                .lock()
                .unwrap()
                .get(language)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Directory where every tracked login has a fixed subscriber list.
    struct MemoryDirectory {
        subscribers: HashMap<String, Vec<String>>,
    }

    impl MemoryDirectory {
        fn new(subscribers: &[(&str, &[&str])]) -> Self {
            Self {
                subscribers: subscribers
                    .iter()
                    .map(|(login, orgs)| {
                        (
                            login.to_string(),
                            orgs.iter().map(|o| o.to_string()).collect(),
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl IdentityDirectory for MemoryDirectory {
        async fn resolve(&self, names: &[String]) -> Result<Vec<TrackedIdentity>, StoreError> {
            Ok(names
                .iter()
                .filter(|n| self.subscribers.contains_key(*n))
                .map(|n| TrackedIdentity { login: n.clone() })
                .collect())
        }

        async fn subscribers_of(&self, login: &str) -> Result<Vec<String>, StoreError> {
            Ok(self.subscribers.get(login).cloned().unwrap_or_default())
        }

        async fn tracked_logins(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.subscribers.keys().cloned().collect())
        }
    }

    /// Notifier recording deliveries, optionally failing for one org.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail_for_org: Option<String>,
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn notify(
            &self,
            org_id: &str,
            title: &str,
            _body: &str,
            _important: bool,
        ) -> Result<(), StoreError> {
            if self.fail_for_org.as_deref() == Some(org_id) {
                return Err(StoreError::Backend("delivery failed".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((org_id.to_string(), title.to_string()));
            Ok(())
        }
    }

    fn entries(list: &[(&str, u32)]) -> Vec<TrendingEntry> {
        list.iter()
            .map(|(name, position)| TrendingEntry {
                name: name.to_string(),
                position: *position,
            })
            .collect()
    }

    fn engine(
        directory: MemoryDirectory,
        notifier: RecordingNotifier,
    ) -> (
        TrendingDiffEngine,
        Arc<MemoryTrendingStore>,
        Arc<RecordingNotifier>,
    ) {
        let store = Arc::new(MemoryTrendingStore::default());
        let notifier = Arc::new(notifier);
        (
            TrendingDiffEngine::new(store.clone(), Arc::new(directory), notifier.clone()),
            store,
            notifier,
        )
    }

    #[test]
    fn classifies_removed_changed_and_new() {
        let old = TrendingSnapshot::new("", "h1", entries(&[("A", 1), ("B", 2), ("C", 3)]));
        let new_list = entries(&[("B", 1), ("D", 2)]);

        let (removed, changed, new) = classify(Some(&old), &new_list, "");

        let removed_names: Vec<&str> = removed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(removed_names, vec!["A", "C"]);

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name, "B");
        assert_eq!(changed[0].position, 1);

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].name, "D");
        assert_eq!(new[0].position, 2);
    }

    #[test]
    fn unchanged_position_is_not_a_change() {
        let old = TrendingSnapshot::new("rust", "h1", entries(&[("A", 1), ("B", 2)]));
        let new_list = entries(&[("A", 1), ("B", 2)]);

        let (removed, changed, new) = classify(Some(&old), &new_list, "rust");
        assert!(removed.is_empty());
        assert!(changed.is_empty());
        assert!(new.is_empty());
    }

    #[test]
    fn first_snapshot_is_entirely_new() {
        let new_list = entries(&[("A", 1), ("B", 2)]);
        let (removed, changed, new) = classify(None, &new_list, "rust");
        assert!(removed.is_empty());
        assert!(changed.is_empty());
        assert_eq!(new.len(), 2);
    }

    #[test]
    fn main_feed_wording_for_empty_language() {
        let change = TrendChange {
            kind: ChangeKind::New,
            name: "octo/repo".to_string(),
            position: 3,
            language: String::new(),
        };
        let (title, body) = notification_text(&change);
        assert_eq!(title, "octo/repo is trending on GitHub");
        assert_eq!(body, "Now trending in the main feed at position 3");
    }

    #[tokio::test]
    async fn identical_hash_is_a_no_op() {
        let directory = MemoryDirectory::new(&[("A", &["org1"])]);
        let (engine, store, notifier) = engine(directory, RecordingNotifier::default());

        let first = engine
            .update_trending("", "hash-1", entries(&[("A", 1)]))
            .await
            .unwrap();
        assert!(matches!(first, TrendingUpdate::Applied { new: 1, .. }));

        let second = engine
            .update_trending("", "hash-1", entries(&[("A", 1)]))
            .await
            .unwrap();
        assert_eq!(second, TrendingUpdate::Unchanged);

        // One archive, one replace, one notification in total.
        let ops = store.ops.lock().unwrap().clone();
        assert_eq!(ops, vec!["archive:", "replace:"]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn archives_before_replacing() {
        let directory = MemoryDirectory::new(&[]);
        let (engine, store, _) = engine(directory, RecordingNotifier::default());

        engine
            .update_trending("rust", "h1", entries(&[("A", 1)]))
            .await
            .unwrap();
        engine
            .update_trending("rust", "h2", entries(&[("A", 2)]))
            .await
            .unwrap();

        let ops = store.ops.lock().unwrap().clone();
        assert_eq!(
            ops,
            vec!["archive:rust", "replace:rust", "archive:rust", "replace:rust"]
        );
        assert_eq!(
            store.trending_history("rust").await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn delivers_to_every_org_despite_one_failure() {
        let directory = MemoryDirectory::new(&[
            ("A", &["org1", "org2", "org3"]),
            ("B", &["org4"]),
        ]);
        let notifier = RecordingNotifier {
            fail_for_org: Some("org2".to_string()),
            ..RecordingNotifier::default()
        };
        let (engine, _, notifier) = engine(directory, notifier);

        engine
            .update_trending("", "h1", entries(&[("A", 1), ("B", 2)]))
            .await
            .unwrap();

        let sent = notifier.sent.lock().unwrap().clone();
        let orgs: Vec<&str> = sent.iter().map(|(org, _)| org.as_str()).collect();
        // org2 failed but org3 and B's org4 were still delivered.
        assert_eq!(orgs, vec!["org1", "org3", "org4"]);
    }

    #[tokio::test]
    async fn untracked_names_are_skipped_silently() {
        let directory = MemoryDirectory::new(&[("known", &["org1"])]);
        let (engine, _, notifier) = engine(directory, RecordingNotifier::default());

        let update = engine
            .update_trending("go", "h1", entries(&[("known", 1), ("unknown", 2)]))
            .await
            .unwrap();
        assert!(matches!(update, TrendingUpdate::Applied { new: 2, .. }));

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "org1");
    }

    #[tokio::test]
    async fn removed_then_changed_then_new_order() {
        let directory = MemoryDirectory::new(&[
            ("A", &["org"]),
            ("B", &["org"]),
            ("C", &["org"]),
            ("D", &["org"]),
        ]);
        let (engine, _, notifier) = engine(directory, RecordingNotifier::default());

        engine
            .update_trending("", "h1", entries(&[("A", 1), ("B", 2), ("C", 3)]))
            .await
            .unwrap();
        notifier.sent.lock().unwrap().clear();

        engine
            .update_trending("", "h2", entries(&[("B", 1), ("D", 2)]))
            .await
            .unwrap();

        let titles: Vec<String> = notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title)| title.clone())
            .collect();
        assert_eq!(
            titles,
            vec![
                "A is not trending on GitHub anymore",
                "C is not trending on GitHub anymore",
                "B changed trending position on GitHub",
                "D is trending on GitHub",
            ]
        );
    }
}
