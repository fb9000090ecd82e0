//! Background housekeeping.
//!
//! A periodic task that drops expired sessions and sweeps working directories
//! whose client never came back for the artifact.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use crate::core::session::SessionStore;
use crate::core::storage::DownloadsRoot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub purged_sessions: usize,
    /// Working directories of artifacts left behind by expired sessions
    pub reclaimed_artifacts: usize,
    pub removed_dirs: usize,
}

/// One housekeeping pass
#[instrument(skip(sessions, root))]
pub async fn run_housekeeping_pass(
    sessions: &dyn SessionStore,
    root: &DownloadsRoot,
    stale_after: Duration,
) -> HousekeepingReport {
    let purge = sessions.purge_expired();
    let mut reclaimed_artifacts = 0;
    for artifact in &purge.orphaned {
        if root.reclaim_artifact(&artifact.path).await {
            reclaimed_artifacts += 1;
        }
    }

    let report = HousekeepingReport {
        purged_sessions: purge.sessions,
        reclaimed_artifacts,
        removed_dirs: root.sweep_stale(stale_after).await,
    };
    debug!(?report, "housekeeping pass done");
    report
}

/// Handle to the housekeeping task; aborts it when shut down or dropped
pub struct HousekeepingHandle {
    task: JoinHandle<()>,
}

impl HousekeepingHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for HousekeepingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn_housekeeping(
    sessions: Arc<dyn SessionStore>,
    root: DownloadsRoot,
    interval: Duration,
    stale_after: Duration,
) -> HousekeepingHandle {
    info!(
        "🧹 Housekeeping every {:?}, sweeping working directories older than {:?}",
        interval, stale_after
    );

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_housekeeping_pass(sessions.as_ref(), &root, stale_after).await;
        }
    });

    HousekeepingHandle { task }
}
