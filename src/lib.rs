//! Trendwatch
//!
//! Tracks the star history of external repositories, detects changes in
//! trending rankings and forecasts when the trending feed will next turn
//! over. Persistence, identity lookup and the notification transport are
//! external collaborators behind the traits in [`services::store`].

pub mod config;
pub mod models;
pub mod services;

pub use config::FetcherConfig;

// Re-export specific items to avoid ambiguous glob re-exports
pub use models::{
    ChangeKind, StarSample, StargazerEvent, TrendChange, TrendingEntry, TrendingSnapshot,
    TrendingUpdate,
};

pub use services::{
    FetchError, GithubEventSource, IdentityDirectory, NotificationSink, RateLimitGuard,
    RateLimitState, RateLimitedFetcher, StarHistorySync, StarStore, StargazerEventSource,
    StoreError, SyncError, SyncJob, SyncJobConfig, TrackedIdentity, TrendPredictor,
    TrendingDiffEngine, TrendingError, TrendingStore,
};
