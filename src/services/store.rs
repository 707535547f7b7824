//! Collaborator interfaces
//!
//! The persistence layer, the tracked-identity directory and the
//! notification transport live outside this crate. These traits are the
//! contracts the core services need from them; production backends and
//! in-memory test doubles both plug in here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{StarSample, TrendingEntry, TrendingSnapshot};

/// Errors surfaced by external collaborators.
///
/// The core does not interpret or retry these; they pass through to the
/// caller opaque.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A known identity tracked by the platform, referenced by trending entries
/// and owning a star time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIdentity {
    pub login: String,
}

/// Append-only sink for per-login star history samples.
#[async_trait]
pub trait StarStore: Send + Sync {
    /// Append one day's sample to the login's series. Samples for a login
    /// are appended in chronological order by the caller; the store must
    /// not reorder them.
    async fn append_star_sample(&self, sample: &StarSample) -> Result<(), StoreError>;
}

/// Current-plus-historical trending snapshot storage, keyed by language.
#[async_trait]
pub trait TrendingStore: Send + Sync {
    /// The current snapshot for a language, if one has ever been stored.
    async fn current_snapshot(&self, language: &str)
        -> Result<Option<TrendingSnapshot>, StoreError>;

    /// Move the current snapshot (if any) into history and record a
    /// point-in-time boundary marker for the language.
    async fn archive_current(&self, language: &str) -> Result<(), StoreError>;

    /// Store `entries` as the new current snapshot, keyed by `content_hash`.
    async fn replace_current(
        &self,
        language: &str,
        content_hash: &str,
        entries: &[TrendingEntry],
    ) -> Result<(), StoreError>;

    /// Boundary markers recorded by [`archive_current`], oldest first.
    ///
    /// [`archive_current`]: TrendingStore::archive_current
    async fn trending_history(&self, language: &str) -> Result<Vec<DateTime<Utc>>, StoreError>;
}

/// Lookup of tracked identities and their subscribers.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolve trending entry names to tracked identities. Names with no
    /// match are omitted from the result, not errors.
    async fn resolve(&self, names: &[String]) -> Result<Vec<TrackedIdentity>, StoreError>;

    /// Organization ids following the given identity.
    async fn subscribers_of(&self, login: &str) -> Result<Vec<String>, StoreError>;

    /// All logins with an active star history subscription.
    async fn tracked_logins(&self) -> Result<Vec<String>, StoreError>;
}

/// In-app notification transport. Fire-and-forget from the core's
/// perspective; the result only reports transport failure.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        org_id: &str,
        title: &str,
        body: &str,
        important: bool,
    ) -> Result<(), StoreError>;
}
