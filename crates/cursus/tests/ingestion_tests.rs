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

//! Ingestion and idempotency-guard integration tests.

mod common;

use common::{gln_recipient, harness, harness_with, notification};
use cursus::config::PostOfficeConfig;
use cursus::error::IngestError;
use cursus::intake::{IngestOutcome, IntakeEnvelope, IntakeRecord};
use cursus::models::notification::SubDomain;
use uuid::Uuid;

#[tokio::test]
async fn test_first_delivery_is_stored() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");
    let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 1);

    let outcome = h.ingestion.ingest(&n).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Stored { .. }));

    let cabinet = n.cabinet_key();
    assert!(h.dal.notification().has_pending(&cabinet).await.unwrap());
}

#[tokio::test]
async fn test_identical_redelivery_is_dropped() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");
    let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 1);

    assert!(matches!(
        h.ingestion.ingest(&n).await.unwrap(),
        IngestOutcome::Stored { .. }
    ));
    assert_eq!(
        h.ingestion.ingest(&n).await.unwrap(),
        IngestOutcome::Duplicate
    );

    // Exactly one stored notification.
    let page_drawers = h.dal.drawer().list_for_cabinet(&n.cabinet_key()).await.unwrap();
    assert_eq!(page_drawers.len(), 1);
    assert_eq!(page_drawers[0].position, 1);
}

#[tokio::test]
async fn test_conflicting_redelivery_fails_validation() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");
    let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 1);

    h.ingestion.ingest(&n).await.unwrap();

    let mut conflicting = n.clone();
    conflicting.weight = 99;
    let err = h.ingestion.ingest(&conflicting).await.unwrap_err();
    assert!(matches!(err, IngestError::ConflictingContent { .. }));
}

#[tokio::test]
async fn test_redelivery_after_consumption_is_first_time_again() {
    let h = harness().await;
    let recipient = gln_recipient("5790000000001");
    let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 1);

    h.ingestion.ingest(&n).await.unwrap();

    // Simulate an earlier consumption: archive and delete the row while
    // the idempotency record stays behind.
    h.dal.notification().archive(&[n.id], None).await.unwrap();
    h.dal.notification().delete(&[n.id]).await.unwrap();

    let outcome = h.ingestion.ingest(&n).await.unwrap();
    assert!(matches!(outcome, IngestOutcome::Stored { .. }));
}

#[tokio::test]
async fn test_drawers_seal_at_capacity() {
    let config = PostOfficeConfig::builder()
        .max_drawer_size(2)
        .content_timeout(std::time::Duration::from_millis(50))
        .build()
        .unwrap();
    let h = harness_with(config).await;
    let recipient = gln_recipient("5790000000001");

    for seq in 1..=5 {
        let n = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, seq);
        h.ingestion.ingest(&n).await.unwrap();
    }

    let cabinet = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 0).cabinet_key();
    let drawers = h.dal.drawer().list_for_cabinet(&cabinet).await.unwrap();
    assert_eq!(drawers.len(), 3);
    let positions: Vec<i32> = drawers.iter().map(|d| d.position).collect();
    assert_eq!(positions.iter().sum::<i32>(), 5);
    assert!(positions.iter().all(|p| *p <= 2));
}

#[tokio::test]
async fn test_batch_reports_and_dead_letters() {
    let h = harness().await;

    let valid = IntakeRecord {
        id: Uuid::new_v4(),
        recipient: "5790000000001".into(),
        content_type: "RSM-012".into(),
        origin: "TimeSeries".into(),
        supports_bundling: true,
        weight: 1,
        sequence_number: 1,
        document_type: "MeteredDataTimeSeries".into(),
    };
    let mut bad_origin = valid.clone();
    bad_origin.id = Uuid::new_v4();
    bad_origin.origin = "Billing".into();
    let mut bad_weight = valid.clone();
    bad_weight.id = Uuid::new_v4();
    bad_weight.weight = -3;

    let envelope = IntakeEnvelope {
        version: 1,
        notifications: vec![valid.clone(), bad_origin, bad_weight, valid.clone()],
    };
    let payload = serde_json::to_vec(&envelope).unwrap();

    let report = h.ingestion.ingest_batch(&payload).await.unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.dead_lettered, 2);

    let letters = h.dead_letters.take_all();
    assert_eq!(letters.len(), 2);
}

#[tokio::test]
async fn test_unparseable_envelope_is_dead_lettered() {
    let h = harness().await;

    let report = h.ingestion.ingest_batch(b"not json at all").await.unwrap();
    assert_eq!(report.stored, 0);
    assert_eq!(report.dead_lettered, 1);

    let letters = h.dead_letters.take_all();
    assert_eq!(letters.len(), 1);
    assert!(letters[0].reason.contains("unparseable"));
}

#[tokio::test]
async fn test_batch_keeps_recipient_streams_ordered() {
    let h = harness().await;

    let make = |recipient: &str, seq: i64| IntakeRecord {
        id: Uuid::new_v4(),
        recipient: recipient.into(),
        content_type: "RSM-012".into(),
        origin: "TimeSeries".into(),
        supports_bundling: true,
        weight: 1,
        sequence_number: seq,
        document_type: "MeteredDataTimeSeries".into(),
    };

    let envelope = IntakeEnvelope {
        version: 1,
        notifications: vec![
            make("5790000000001", 1),
            make("5790000000002", 10),
            make("5790000000001", 2),
            make("5790000000002", 11),
            make("5790000000001", 3),
        ],
    };
    let report = h
        .ingestion
        .ingest_batch(&serde_json::to_vec(&envelope).unwrap())
        .await
        .unwrap();
    assert_eq!(report.stored, 5);

    // Each recipient's page preserves its stream order.
    let recipient = gln_recipient("5790000000001");
    let cabinet = notification(&recipient, SubDomain::TimeSeries, "RSM-012", 1, true, 0).cabinet_key();
    let drawers = h.dal.drawer().list_for_cabinet(&cabinet).await.unwrap();
    assert_eq!(drawers.len(), 1);
    let page = h.dal.notification().pending_page(drawers[0].id).await.unwrap();
    let sequences: Vec<i64> = page.iter().map(|n| n.sequence_number).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}
