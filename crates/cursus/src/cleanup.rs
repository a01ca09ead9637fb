/*
 *  Copyright 2025-2026 Cursus Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Page-level garbage collection.
//!
//! Drawers that are full and older than the retention window are
//! reclaimed wholesale: remaining notifications under the drawer are
//! deleted, then the drawer record itself. Per-bundle archival usually
//! empties drawers long before the sweeper reaches them; the sweep picks
//! up whatever is left. All deletes tolerate "already gone", so
//! concurrent sweepers are harmless and re-running a sweep is a no-op.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::PostOfficeConfig;
use crate::dal::DAL;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::StorageError;

/// Tally of one cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub drawers_removed: usize,
    pub notifications_removed: usize,
}

/// Periodic sweeper over sealed, aged drawers.
#[derive(Clone)]
pub struct CleanupService {
    dal: DAL,
    config: PostOfficeConfig,
}

impl CleanupService {
    pub fn new(dal: DAL, config: PostOfficeConfig) -> Self {
        Self { dal, config }
    }

    /// Runs one sweep: reclaim every full drawer older than the
    /// retention window.
    pub async fn sweep(&self) -> Result<CleanupReport, StorageError> {
        let retention = chrono::Duration::from_std(self.config.drawer_retention())
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let cutoff = UniversalTimestamp(chrono::Utc::now() - retention);

        let expired = self
            .dal
            .drawer()
            .find_expired(self.config.max_drawer_size(), cutoff)
            .await?;

        let mut report = CleanupReport::default();
        for drawer in expired {
            let removed = self.dal.drawer().delete_with_notifications(drawer.id).await?;
            report.drawers_removed += 1;
            report.notifications_removed += removed;
            debug!(
                drawer_id = %drawer.id,
                cabinet = %drawer.cabinet,
                notifications_removed = removed,
                "Reclaimed expired drawer"
            );
        }

        if report.drawers_removed > 0 {
            info!(
                drawers_removed = report.drawers_removed,
                notifications_removed = report.notifications_removed,
                "Cleanup sweep finished"
            );
        }
        Ok(report)
    }

    /// Spawns the sweeper loop. It runs until the shutdown signal flips
    /// to `true` or the sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.cleanup_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(
                interval_secs = self.config.cleanup_interval().as_secs(),
                "Cleanup sweeper started"
            );
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "Cleanup sweep failed");
                        }
                    }
                    result = shutdown.changed() => {
                        match result {
                            Ok(()) if !*shutdown.borrow() => continue,
                            _ => break,
                        }
                    }
                }
            }
            info!("Cleanup sweeper stopped");
        })
    }
}
