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

//! Cleanup sweeper integration tests.

mod common;

use std::time::Duration;

use common::{gln_recipient, harness_with, notification};
use cursus::config::PostOfficeConfig;
use cursus::models::notification::SubDomain;

fn config(max_drawer_size: i32, retention: Duration) -> PostOfficeConfig {
    PostOfficeConfig::builder()
        .max_drawer_size(max_drawer_size)
        .drawer_retention(retention)
        .content_timeout(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_sweep_reclaims_full_aged_drawers() {
    // Zero retention: a full drawer is immediately eligible.
    let h = harness_with(config(2, Duration::ZERO)).await;
    let recipient = gln_recipient("5790000000001");

    for seq in 1..=2 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    let cabinet = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 0).cabinet_key();
    assert_eq!(h.dal.drawer().list_for_cabinet(&cabinet).await.unwrap().len(), 1);

    let report = h.cleanup.sweep().await.unwrap();
    assert_eq!(report.drawers_removed, 1);
    assert_eq!(report.notifications_removed, 2);

    assert!(h.dal.drawer().list_for_cabinet(&cabinet).await.unwrap().is_empty());
    assert!(!h.dal.notification().has_pending(&cabinet).await.unwrap());
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let h = harness_with(config(2, Duration::ZERO)).await;
    let recipient = gln_recipient("5790000000001");

    for seq in 1..=2 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    let first = h.cleanup.sweep().await.unwrap();
    assert_eq!(first.drawers_removed, 1);

    // Running the sweep again finds nothing to do.
    let second = h.cleanup.sweep().await.unwrap();
    assert_eq!(second.drawers_removed, 0);
    assert_eq!(second.notifications_removed, 0);
}

#[tokio::test]
async fn test_sweep_leaves_open_drawers_alone() {
    let h = harness_with(config(10, Duration::ZERO)).await;
    let recipient = gln_recipient("5790000000001");

    // Only 3 of 10 slots used: the drawer is still open.
    for seq in 1..=3 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    let report = h.cleanup.sweep().await.unwrap();
    assert_eq!(report.drawers_removed, 0);

    let cabinet = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 0).cabinet_key();
    assert!(h.dal.notification().has_pending(&cabinet).await.unwrap());
}

#[tokio::test]
async fn test_sweep_respects_retention_window() {
    // Seven-day retention: a drawer sealed moments ago stays.
    let h = harness_with(config(2, Duration::from_secs(7 * 24 * 3600))).await;
    let recipient = gln_recipient("5790000000001");

    for seq in 1..=2 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    let report = h.cleanup.sweep().await.unwrap();
    assert_eq!(report.drawers_removed, 0);
}

#[tokio::test]
async fn test_sweep_tolerates_bundle_archival_having_emptied_the_drawer() {
    let h = harness_with(config(2, Duration::ZERO)).await;
    let recipient = gln_recipient("5790000000001");

    let mut ids = Vec::new();
    for seq in 1..=2 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
        ids.push(n.id);
    }

    // Per-bundle archival already copied and deleted the rows.
    h.dal.notification().archive(&ids, None).await.unwrap();
    h.dal.notification().delete(&ids).await.unwrap();

    // The sweep still reclaims the (now empty) sealed drawer.
    let report = h.cleanup.sweep().await.unwrap();
    assert_eq!(report.drawers_removed, 1);
    assert_eq!(report.notifications_removed, 0);
}
