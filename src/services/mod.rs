pub mod fetcher;
pub mod jobs;
pub mod predictor;
pub mod star_sync;
pub mod store;
pub mod trending_diff;

mod locks;

pub use fetcher::{
    Clock, FetchError, GithubEventSource, RateLimitGuard, RateLimitState, RateLimitedFetcher,
    StargazerEventSource, SystemClock,
};
pub use jobs::{SyncJob, SyncJobConfig, run_star_sync};
pub use predictor::{TrendPredictor, forecast};
pub use star_sync::{PAGE_SIZE, StarHistorySync, SyncError};
pub use store::{
    IdentityDirectory, NotificationSink, StarStore, StoreError, TrackedIdentity, TrendingStore,
};
pub use trending_diff::{TrendingDiffEngine, TrendingError};
