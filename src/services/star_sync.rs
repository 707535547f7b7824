//! Star History Sync
//!
//! Builds the day-bucketed star time series for a login from its raw
//! stargazer event feed and appends it to the star store as a cumulative
//! series.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::StarSample;
use crate::services::fetcher::{FetchError, StargazerEventSource};
use crate::services::locks::KeyedLocks;
use crate::services::store::{StarStore, StoreError};

/// Events requested per feed page. A short page ends pagination.
pub const PAGE_SIZE: u32 = 100;

/// Errors that can occur during a star history sync
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Service that synchronizes a login's star history.
///
/// Pagination is strictly sequential and collection is separated from
/// persistence: nothing is written until the whole feed has been paged, so
/// a failed fetch never leaves partial state behind. A per-login mutex
/// serializes concurrent syncs for the same login, which keeps the running
/// cumulative total consistent.
#[derive(Clone)]
pub struct StarHistorySync {
    source: Arc<dyn StargazerEventSource>,
    store: Arc<dyn StarStore>,
    locks: KeyedLocks,
}

impl StarHistorySync {
    pub fn new(source: Arc<dyn StargazerEventSource>, store: Arc<dyn StarStore>) -> Self {
        Self {
            source,
            store,
            locks: KeyedLocks::default(),
        }
    }

    /// Page through the login's stargazer feed and bucket events by UTC
    /// calendar day.
    ///
    /// Counts are merged additively, so a day whose events straddle a page
    /// boundary still sums correctly. A page shorter than [`PAGE_SIZE`]
    /// terminates the loop.
    pub async fn collect(&self, login: &str) -> Result<BTreeMap<NaiveDate, u64>, SyncError> {
        let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        let mut page = 1u32;

        loop {
            let events = self.source.stargazer_page(login, page, PAGE_SIZE).await?;
            let full_page = events.len() as u32 == PAGE_SIZE;

            for event in &events {
                *counts.entry(event.day()).or_insert(0) += 1;
            }

            debug!(
                "Collected page {} for {}: {} events, {} distinct days so far",
                page,
                login,
                events.len(),
                counts.len()
            );

            if !full_page {
                break;
            }
            page += 1;
        }

        Ok(counts)
    }

    /// Sync the login's full star history into the store.
    ///
    /// Samples are appended in chronological order, each awaited before the
    /// next, so a partial failure leaves a still-monotonic prefix. Returns
    /// the appended samples.
    pub async fn sync(&self, login: &str) -> Result<Vec<StarSample>, SyncError> {
        let _guard = self.locks.acquire(login).await;

        let counts = self.collect(login).await?;

        let mut cumulative = 0u64;
        let mut samples = Vec::with_capacity(counts.len());
        for (date, new_stars) in counts {
            cumulative += new_stars;
            let sample = StarSample {
                login: login.to_string(),
                new_stars,
                cumulative_stars: cumulative,
                date,
            };
            self.store.append_star_sample(&sample).await?;
            samples.push(sample);
        }

        info!(
            "Synced star history for {}: {} days, {} stars total",
            login,
            samples.len(),
            cumulative
        );

        Ok(samples)
    }
}
