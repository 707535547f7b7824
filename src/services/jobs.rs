//! Background Jobs
//!
//! Periodic runner that refreshes the star history of every tracked login.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::services::star_sync::StarHistorySync;
use crate::services::store::IdentityDirectory;

/// Configuration for the star sync job
#[derive(Debug, Clone)]
pub struct SyncJobConfig {
    /// Interval between sync cycles (default: 1 hour)
    pub interval: Duration,
    /// Whether the job is enabled
    pub enabled: bool,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            enabled: true,
        }
    }
}

/// Background job runner for star history sync.
///
/// Logins are synced one at a time; a failure for one login is logged and
/// the cycle moves on to the next.
pub struct SyncJob {
    sync: StarHistorySync,
    directory: Arc<dyn IdentityDirectory>,
    config: SyncJobConfig,
}

impl SyncJob {
    pub fn new(
        sync: StarHistorySync,
        directory: Arc<dyn IdentityDirectory>,
        config: SyncJobConfig,
    ) -> Self {
        Self {
            sync,
            directory,
            config,
        }
    }

    /// Start the sync job.
    ///
    /// Returns a shutdown sender that can be used to stop the job.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        if !self.config.enabled {
            info!("Star sync job is disabled");
            return shutdown_tx;
        }

        let interval = self.config.interval;
        let sync = self.sync;
        let directory = self.directory;

        tokio::spawn(async move {
            info!("Starting star sync job with interval {:?}", interval);

            // Run immediately on startup
            run_star_sync(&sync, directory.as_ref()).await;

            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        run_star_sync(&sync, directory.as_ref()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped sender closes the channel; stop rather
                        // than spin on the error.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Star sync job shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

/// Run a single sync cycle over all tracked logins (for manual triggering
/// or testing). Returns the number of logins synced successfully.
pub async fn run_star_sync(sync: &StarHistorySync, directory: &dyn IdentityDirectory) -> usize {
    let logins = match directory.tracked_logins().await {
        Ok(logins) => logins,
        Err(e) => {
            error!("Failed to list tracked logins: {}", e);
            return 0;
        }
    };

    let mut synced = 0;
    for login in &logins {
        match sync.sync(login).await {
            Ok(_) => synced += 1,
            Err(e) => error!("Star sync failed for {}: {}", login, e),
        }
    }

    info!("Sync cycle finished: {}/{} logins", synced, logins.len());
    synced
}
