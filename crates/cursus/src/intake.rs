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

//! Notification intake from sub-domains.
//!
//! Sub-domains deliver JSON batch envelopes. Each record is validated,
//! checked against the idempotency guard and appended to its cabinet.
//! Malformed envelopes and records go to a dead-letter sink with a
//! reason instead of being silently dropped. Ingestion parallelizes across
//! recipients but stays sequential within one recipient's stream, so
//! sequence-number ordering is preserved.
//!
//! A storage fault aborts the batch; the source queue redelivers, and
//! the idempotency guard makes the replay harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PostOfficeConfig;
use crate::dal::{AppendOutcome, IdempotencyInsert, DAL};
use crate::database::universal_types::UniversalUuid;
use crate::error::IngestError;
use crate::models::actor::ActorId;
use crate::models::drawer::Drawer;
use crate::models::idempotency::content_fingerprint;
use crate::models::notification::{NewNotification, SubDomain};

/// A batch of notifications as delivered on the intake queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeEnvelope {
    pub version: u32,
    pub notifications: Vec<IntakeRecord>,
}

/// One notification record on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub id: Uuid,
    pub recipient: String,
    pub content_type: String,
    pub origin: String,
    pub supports_bundling: bool,
    pub weight: i32,
    pub sequence_number: i64,
    pub document_type: String,
}

impl IntakeRecord {
    /// Validates the record into a domain notification, or explains why
    /// it cannot be one.
    fn into_notification(self) -> Result<NewNotification, String> {
        let recipient = ActorId::parse(&self.recipient)
            .ok_or_else(|| format!("unrecognized recipient '{}'", self.recipient))?;
        let origin: SubDomain = self.origin.parse()?;
        if self.weight <= 0 {
            return Err(format!("non-positive weight {}", self.weight));
        }
        Ok(NewNotification {
            id: UniversalUuid(self.id),
            recipient,
            origin,
            content_type: self.content_type,
            document_type: self.document_type,
            supports_bundling: self.supports_bundling,
            weight: self.weight,
            sequence_number: self.sequence_number,
        })
    }
}

/// Receives messages the intake could not process.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn dead_letter(&self, payload: Vec<u8>, reason: String);
}

/// A dead-lettered message with its reason.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub payload: Vec<u8>,
    pub reason: String,
}

/// An in-process dead-letter sink.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetters {
    entries: Arc<parking_lot::Mutex<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the collected dead letters.
    pub fn take_all(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.entries.lock())
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetters {
    async fn dead_letter(&self, payload: Vec<u8>, reason: String) {
        warn!(reason = %reason, "Dead-lettering intake message");
        self.entries.lock().push(DeadLetter { payload, reason });
    }
}

/// What happened to a single ingested notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First-time delivery; stored against this drawer.
    Stored { drawer_id: UniversalUuid },
    /// A pure duplicate of an already-recorded delivery; dropped.
    Duplicate,
}

/// Tally of one batch ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    pub duplicates: usize,
    pub dead_lettered: usize,
}

/// Ingests sub-domain notifications into the notification store.
#[derive(Clone)]
pub struct IngestionService {
    dal: DAL,
    config: PostOfficeConfig,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl IngestionService {
    pub fn new(dal: DAL, config: PostOfficeConfig, dead_letters: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            dal,
            config,
            dead_letters,
        }
    }

    /// Processes one intake envelope.
    ///
    /// Malformed envelopes and invalid or conflicting records are
    /// dead-lettered and counted; storage faults abort the batch so the
    /// source queue redelivers it.
    pub async fn ingest_batch(&self, payload: &[u8]) -> Result<IngestReport, IngestError> {
        let envelope: IntakeEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.dead_letters
                    .dead_letter(payload.to_vec(), format!("unparseable envelope: {}", e))
                    .await;
                return Ok(IngestReport {
                    dead_lettered: 1,
                    ..Default::default()
                });
            }
        };

        let mut report = IngestReport::default();

        // Validate records and partition by recipient; each recipient's
        // stream must stay in order.
        let mut per_recipient: HashMap<String, Vec<NewNotification>> = HashMap::new();
        for record in envelope.notifications {
            let raw = serde_json::to_vec(&record).unwrap_or_default();
            match record.into_notification() {
                Ok(notification) => per_recipient
                    .entry(notification.recipient.storage_key())
                    .or_default()
                    .push(notification),
                Err(reason) => {
                    self.dead_letters.dead_letter(raw, reason).await;
                    report.dead_lettered += 1;
                }
            }
        }

        let mut handles = Vec::new();
        for (_, notifications) in per_recipient {
            let service = self.clone();
            handles.push(tokio::spawn(async move {
                let mut stored = 0usize;
                let mut duplicates = 0usize;
                let mut dead_lettered = 0usize;
                for notification in notifications {
                    let raw = serde_json::to_vec(&notification).unwrap_or_default();
                    match service.ingest(&notification).await {
                        Ok(IngestOutcome::Stored { .. }) => stored += 1,
                        Ok(IngestOutcome::Duplicate) => duplicates += 1,
                        Err(IngestError::ConflictingContent { notification_id }) => {
                            service
                                .dead_letters
                                .dead_letter(
                                    raw,
                                    format!(
                                        "conflicting content for notification {}",
                                        notification_id
                                    ),
                                )
                                .await;
                            dead_lettered += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok((stored, duplicates, dead_lettered))
            }));
        }

        for joined in futures::future::join_all(handles).await {
            let (stored, duplicates, dead_lettered) = joined
                .map_err(|e| IngestError::Storage(crate::error::StorageError::ConnectionPool(
                    e.to_string(),
                )))??;
            report.stored += stored;
            report.duplicates += duplicates;
            report.dead_lettered += dead_lettered;
        }

        debug!(
            stored = report.stored,
            duplicates = report.duplicates,
            dead_lettered = report.dead_lettered,
            "Intake batch processed"
        );
        Ok(report)
    }

    /// Ingests a single notification: guard, then append with bounded
    /// retry against drawer-fill races.
    pub async fn ingest(
        &self,
        notification: &NewNotification,
    ) -> Result<IngestOutcome, IngestError> {
        if notification.weight <= 0 {
            return Err(IngestError::InvalidNotification {
                notification_id: notification.id.as_uuid(),
                reason: format!("non-positive weight {}", notification.weight),
            });
        }

        let cabinet = notification.cabinet_key();
        let drawer = self
            .dal
            .drawer()
            .ensure_open(&cabinet, self.config.max_drawer_size())
            .await?;

        if self.was_received_previously(notification, &drawer).await? {
            debug!(
                notification_id = %notification.id,
                cabinet = %cabinet,
                "Dropping duplicate notification"
            );
            return Ok(IngestOutcome::Duplicate);
        }

        let attempts = self.config.append_retries();
        for attempt in 1..=attempts {
            match self
                .dal
                .notification()
                .append(notification, self.config.max_drawer_size())
                .await?
            {
                AppendOutcome::Appended { drawer_id } => {
                    debug!(
                        notification_id = %notification.id,
                        drawer_id = %drawer_id,
                        cabinet = %cabinet,
                        "Notification stored"
                    );
                    return Ok(IngestOutcome::Stored { drawer_id });
                }
                AppendOutcome::DrawerFull => {
                    debug!(
                        notification_id = %notification.id,
                        attempt,
                        "Open drawer filled concurrently; retrying append"
                    );
                }
            }
        }

        Err(IngestError::DrawerContention {
            notification_id: notification.id.as_uuid(),
            attempts,
        })
    }

    /// The idempotency guard.
    ///
    /// Creating the record is the duplicate check. On conflict: a record
    /// whose item was already consumed by cleanup is re-pointed at the
    /// new drawer and the delivery treated as first-time; otherwise
    /// identical fingerprints mean a pure duplicate and differing ones a
    /// data-integrity fault.
    async fn was_received_previously(
        &self,
        notification: &NewNotification,
        destination: &Drawer,
    ) -> Result<bool, IngestError> {
        let fingerprint = content_fingerprint(notification);
        match self
            .dal
            .idempotency()
            .try_insert(notification.id, &fingerprint, destination.id)
            .await?
        {
            IdempotencyInsert::Inserted => Ok(false),
            IdempotencyInsert::Conflict(existing) => {
                if !self.dal.notification().exists(notification.id).await? {
                    // The original was already consumed; treat the
                    // redelivery as first-time under the new drawer.
                    self.dal
                        .idempotency()
                        .repoint(notification.id, &fingerprint, destination.id)
                        .await?;
                    return Ok(false);
                }
                if existing.fingerprint == fingerprint {
                    Ok(true)
                } else {
                    Err(IngestError::ConflictingContent {
                        notification_id: notification.id.as_uuid(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_validation() {
        let record = IntakeRecord {
            id: Uuid::new_v4(),
            recipient: "5790000000001".into(),
            content_type: "RSM-012".into(),
            origin: "TimeSeries".into(),
            supports_bundling: true,
            weight: 1,
            sequence_number: 1,
            document_type: "MeteredDataTimeSeries".into(),
        };
        assert!(record.clone().into_notification().is_ok());

        let mut bad_recipient = record.clone();
        bad_recipient.recipient = "nobody".into();
        assert!(bad_recipient.into_notification().is_err());

        let mut bad_origin = record.clone();
        bad_origin.origin = "Billing".into();
        assert!(bad_origin.into_notification().is_err());

        let mut bad_weight = record;
        bad_weight.weight = 0;
        assert!(bad_weight.into_notification().is_err());
    }

    #[test]
    fn test_envelope_decodes() {
        let json = serde_json::json!({
            "version": 1,
            "notifications": [{
                "id": Uuid::new_v4(),
                "recipient": "5790000000001",
                "content_type": "RSM-012",
                "origin": "TimeSeries",
                "supports_bundling": true,
                "weight": 1,
                "sequence_number": 1,
                "document_type": "MeteredDataTimeSeries"
            }]
        });
        let envelope: IntakeEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(envelope.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_sink_collects() {
        let sink = InMemoryDeadLetters::new();
        sink.dead_letter(b"junk".to_vec(), "unparseable".into()).await;
        let letters = sink.take_all();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].reason, "unparseable");
        assert!(sink.take_all().is_empty());
    }
}
