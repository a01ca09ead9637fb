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

//! Concurrency tests for the single-active-bundle invariant and the
//! append path.
//!
//! These verify that racing callers cannot end up with two
//! unacknowledged bundles for the same recipient and domain group, and
//! that concurrent appends never lose notifications to drawer races.

mod common;

use serial_test::serial;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

use common::{gln_recipient, harness, notification, peek_request};
use cursus::dal::TryCreateOutcome;
use cursus::database::universal_types::UniversalUuid;
use cursus::models::bundle::{DomainGroup, DomainGroupSelector, NewBundle, ResponseFormat};
use cursus::models::notification::SubDomain;
use cursus::service::PeekOutcome;

fn new_bundle(recipient: &str, id: UniversalUuid) -> NewBundle {
    NewBundle {
        id,
        recipient: recipient.into(),
        origin: SubDomain::TimeSeries,
        content_type: "RSM-012".into(),
        notification_ids: vec![UniversalUuid::new_v4()],
        document_types: vec!["MeteredDataTimeSeries".into()],
        response_format: ResponseFormat::Xml,
        response_version: 1,
    }
}

#[tokio::test]
async fn test_try_create_rejects_second_active_bundle() {
    let h = harness().await;

    let first = new_bundle("5790000000001", UniversalUuid::new_v4());
    assert!(matches!(
        h.dal.bundle().try_create(&first).await.unwrap(),
        TryCreateOutcome::Created
    ));

    // A different bundle id, same recipient and group: the partial
    // unique index rejects it.
    let second = new_bundle("5790000000001", UniversalUuid::new_v4());
    assert!(matches!(
        h.dal.bundle().try_create(&second).await.unwrap(),
        TryCreateOutcome::AnotherBundleExists
    ));

    // A colliding id is reported as such.
    let collision = new_bundle("5790000000002", first.id);
    assert!(matches!(
        h.dal.bundle().try_create(&collision).await.unwrap(),
        TryCreateOutcome::BundleIdAlreadyInUse
    ));

    // Another recipient is unaffected.
    let other = new_bundle("5790000000003", UniversalUuid::new_v4());
    assert!(matches!(
        h.dal.bundle().try_create(&other).await.unwrap(),
        TryCreateOutcome::Created
    ));
}

#[tokio::test]
async fn test_acknowledged_bundle_frees_the_slot() {
    let h = harness().await;

    let first = new_bundle("5790000000001", UniversalUuid::new_v4());
    h.dal.bundle().try_create(&first).await.unwrap();
    h.dal
        .bundle()
        .acknowledge(&["5790000000001".to_string()], first.id)
        .await
        .unwrap()
        .expect("bundle was active");

    // With the previous bundle dequeued, a new one may be created.
    let next = new_bundle("5790000000001", UniversalUuid::new_v4());
    assert!(matches!(
        h.dal.bundle().try_create(&next).await.unwrap(),
        TryCreateOutcome::Created
    ));
}

#[tokio::test]
#[serial]
async fn test_concurrent_peeks_yield_exactly_one_bundle() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");

    for seq in 1..=10 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    const NUM_PEEKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_PEEKERS));
    let mut handles = Vec::new();

    for _ in 0..NUM_PEEKERS {
        let post_office = h.post_office.clone();
        let recipient = recipient.clone();
        let barrier = barrier.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            post_office
                .peek(peek_request(&recipient, DomainGroupSelector::TimeSeries))
                .await
                .unwrap()
        }));
    }

    let mut bundle_ids = HashSet::new();
    let mut no_content = 0usize;
    for handle in handles {
        match handle.await.expect("peek task panicked") {
            PeekOutcome::NoContent => no_content += 1,
            PeekOutcome::Pending { bundle } | PeekOutcome::Ready { bundle, .. } => {
                bundle_ids.insert(bundle.id);
            }
        }
    }

    // However the race interleaved, every peek that saw a bundle saw
    // the same one.
    assert_eq!(
        bundle_ids.len(),
        1,
        "RACE DETECTED: multiple distinct bundles served: {:?}",
        bundle_ids
    );
    assert!(no_content < NUM_PEEKERS, "someone must have seen the bundle");

    // And the store holds exactly one active bundle.
    let active = h
        .dal
        .bundle()
        .get_active(&recipient.lookup_keys(), &[DomainGroup::TimeSeries])
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_ingestion_loses_nothing() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");

    const NUM_WRITERS: usize = 6;
    const PER_WRITER: i64 = 5;
    let barrier = Arc::new(Barrier::new(NUM_WRITERS));
    let mut handles = Vec::new();

    for writer in 0..NUM_WRITERS {
        let ingestion = h.ingestion.clone();
        let recipient = recipient.clone();
        let barrier = barrier.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut stored = Vec::new();
            for i in 0..PER_WRITER {
                let seq = writer as i64 * PER_WRITER + i;
                let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
                ingestion.ingest(&n).await.unwrap();
                stored.push(n.id);
            }
            stored
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.await.expect("writer task panicked"));
    }
    assert_eq!(all_ids.len(), NUM_WRITERS * PER_WRITER as usize);

    // Every appended notification is pending exactly once.
    let cabinet = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 0).cabinet_key();
    let drawers = h.dal.drawer().list_for_cabinet(&cabinet).await.unwrap();
    let mut pending = Vec::new();
    for drawer in &drawers {
        pending.extend(h.dal.notification().pending_page(drawer.id).await.unwrap());
    }
    assert_eq!(pending.len(), all_ids.len());

    let pending_ids: HashSet<_> = pending.iter().map(|n| n.id).collect();
    assert_eq!(pending_ids.len(), all_ids.len());
    for id in &all_ids {
        assert!(pending_ids.contains(id));
    }

    // Drawer positions account for every stored row.
    let total_positions: i32 = drawers.iter().map(|d| d.position).sum();
    assert_eq!(total_positions as usize, all_ids.len());
}

#[tokio::test]
#[serial]
async fn test_concurrent_dequeues_acknowledge_once() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");

    let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 1);
    h.ingestion.ingest(&n).await.unwrap();

    let outcome = h
        .post_office
        .peek(peek_request(&recipient, DomainGroupSelector::TimeSeries))
        .await
        .unwrap();
    let bundle_id = outcome.bundle_id().unwrap();

    const NUM_CALLERS: usize = 6;
    let barrier = Arc::new(Barrier::new(NUM_CALLERS));
    let mut handles = Vec::new();
    for _ in 0..NUM_CALLERS {
        let post_office = h.post_office.clone();
        let recipient = recipient.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            post_office.dequeue(&recipient, bundle_id).await.unwrap()
        }));
    }

    let mut successes = 0usize;
    for handle in handles {
        if handle.await.expect("dequeue task panicked") {
            successes += 1;
        }
    }
    assert_eq!(successes, 1, "exactly one dequeue may succeed");
}
