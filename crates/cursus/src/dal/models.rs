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

//! Database row models.
//!
//! These structs use portable column types (TEXT uuids, naive UTC
//! timestamps) that both backends accept, so one model set serves
//! PostgreSQL and SQLite. Ids and timestamps are generated client-side,
//! which keeps inserts identical across backends. Conversion to domain
//! types happens here; stored values that fail to parse surface as
//! [`StorageError::Corrupt`] rather than panicking.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::database::schema::{
    archived_notifications, bundles, drawers, idempotency_records, notifications,
};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::bundle::{Bundle, DomainGroup, NewBundle, ResponseFormat};
use crate::models::drawer::Drawer;
use crate::models::idempotency::IdempotencyRecord;
use crate::models::notification::{CabinetKey, NewNotification, Notification, SubDomain};

pub(crate) fn parse_uuid(value: &str) -> Result<UniversalUuid, StorageError> {
    UniversalUuid::parse(value).map_err(|e| StorageError::Corrupt(format!("uuid '{}': {}", value, e)))
}

pub(crate) fn parse_origin(value: &str) -> Result<SubDomain, StorageError> {
    value.parse().map_err(StorageError::Corrupt)
}

fn parse_uuid_list(value: &str) -> Result<Vec<UniversalUuid>, StorageError> {
    let raw: Vec<String> = serde_json::from_str(value)
        .map_err(|e| StorageError::Corrupt(format!("uuid list: {}", e)))?;
    raw.iter().map(|s| parse_uuid(s)).collect()
}

fn encode_uuid_list(ids: &[UniversalUuid]) -> String {
    let raw: Vec<String> = ids.iter().map(|id| id.to_storage()).collect();
    serde_json::to_string(&raw).expect("string list is always serializable")
}

fn parse_string_list(value: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(value).map_err(|e| StorageError::Corrupt(format!("string list: {}", e)))
}

fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).expect("string list is always serializable")
}

// ============================================================================
// Notification rows
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = notifications)]
pub struct NotificationRow {
    pub id: String,
    pub recipient: String,
    pub origin: String,
    pub content_type: String,
    pub document_type: String,
    pub supports_bundling: bool,
    pub weight: i32,
    pub sequence_number: i64,
    pub drawer_id: String,
    pub acknowledged: bool,
    pub created_at: NaiveDateTime,
}

impl NotificationRow {
    pub fn for_insert(
        notification: &NewNotification,
        drawer_id: &str,
        now: UniversalTimestamp,
    ) -> Self {
        Self {
            id: notification.id.to_storage(),
            recipient: notification.recipient.storage_key(),
            origin: notification.origin.as_str().to_string(),
            content_type: notification.content_type.clone(),
            document_type: notification.document_type.clone(),
            supports_bundling: notification.supports_bundling,
            weight: notification.weight,
            sequence_number: notification.sequence_number,
            drawer_id: drawer_id.to_string(),
            acknowledged: false,
            created_at: now.to_naive(),
        }
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StorageError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: parse_uuid(&row.id)?,
            recipient: row.recipient,
            origin: parse_origin(&row.origin)?,
            content_type: row.content_type,
            document_type: row.document_type,
            supports_bundling: row.supports_bundling,
            weight: row.weight,
            sequence_number: row.sequence_number,
            drawer_id: parse_uuid(&row.drawer_id)?,
            acknowledged: row.acknowledged,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        })
    }
}

// ============================================================================
// Drawer rows
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = drawers)]
pub struct DrawerRow {
    pub id: String,
    pub recipient: String,
    pub origin: String,
    pub content_type: String,
    pub position: i32,
    pub created_at: NaiveDateTime,
}

impl DrawerRow {
    pub fn fresh(cabinet: &CabinetKey, now: UniversalTimestamp) -> Self {
        Self {
            id: UniversalUuid::new_v4().to_storage(),
            recipient: cabinet.recipient.clone(),
            origin: cabinet.origin.as_str().to_string(),
            content_type: cabinet.content_type.clone(),
            position: 0,
            created_at: now.to_naive(),
        }
    }
}

impl TryFrom<DrawerRow> for Drawer {
    type Error = StorageError;

    fn try_from(row: DrawerRow) -> Result<Self, Self::Error> {
        Ok(Drawer {
            id: parse_uuid(&row.id)?,
            cabinet: CabinetKey {
                recipient: row.recipient,
                origin: parse_origin(&row.origin)?,
                content_type: row.content_type,
            },
            position: row.position,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        })
    }
}

// ============================================================================
// Bundle rows
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = bundles)]
pub struct BundleRow {
    pub id: String,
    pub recipient: String,
    pub origin: String,
    pub domain_group: String,
    pub content_type: String,
    pub notification_ids: String,
    pub document_types: String,
    pub response_format: String,
    pub response_version: i32,
    pub dequeued: bool,
    pub content_reference: Option<String>,
    pub notifications_archived: bool,
    pub created_at: NaiveDateTime,
    pub dequeued_at: Option<NaiveDateTime>,
}

impl BundleRow {
    pub fn for_insert(bundle: &NewBundle, now: UniversalTimestamp) -> Self {
        Self {
            id: bundle.id.to_storage(),
            recipient: bundle.recipient.clone(),
            origin: bundle.origin.as_str().to_string(),
            domain_group: bundle.domain_group().as_str().to_string(),
            content_type: bundle.content_type.clone(),
            notification_ids: encode_uuid_list(&bundle.notification_ids),
            document_types: encode_string_list(&bundle.document_types),
            response_format: bundle.response_format.as_str().to_string(),
            response_version: bundle.response_version,
            dequeued: false,
            content_reference: None,
            notifications_archived: false,
            created_at: now.to_naive(),
            dequeued_at: None,
        }
    }
}

impl TryFrom<BundleRow> for Bundle {
    type Error = StorageError;

    fn try_from(row: BundleRow) -> Result<Self, Self::Error> {
        Ok(Bundle {
            id: parse_uuid(&row.id)?,
            recipient: row.recipient,
            origin: parse_origin(&row.origin)?,
            domain_group: row
                .domain_group
                .parse::<DomainGroup>()
                .map_err(StorageError::Corrupt)?,
            content_type: row.content_type,
            notification_ids: parse_uuid_list(&row.notification_ids)?,
            document_types: parse_string_list(&row.document_types)?,
            response_format: row
                .response_format
                .parse::<ResponseFormat>()
                .map_err(StorageError::Corrupt)?,
            response_version: row.response_version,
            dequeued: row.dequeued,
            content_reference: row.content_reference,
            notifications_archived: row.notifications_archived,
            created_at: UniversalTimestamp::from_naive(row.created_at),
            dequeued_at: row.dequeued_at.map(UniversalTimestamp::from_naive),
        })
    }
}

// ============================================================================
// Idempotency rows
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = idempotency_records)]
pub struct IdempotencyRow {
    pub notification_id: String,
    pub fingerprint: Vec<u8>,
    pub drawer_id: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = StorageError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        Ok(IdempotencyRecord {
            notification_id: parse_uuid(&row.notification_id)?,
            fingerprint: row.fingerprint,
            drawer_id: parse_uuid(&row.drawer_id)?,
            created_at: UniversalTimestamp::from_naive(row.created_at),
        })
    }
}

// ============================================================================
// Archived notification rows
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = archived_notifications)]
pub struct ArchivedNotificationRow {
    pub id: String,
    pub recipient: String,
    pub origin: String,
    pub content_type: String,
    pub document_type: String,
    pub weight: i32,
    pub sequence_number: i64,
    pub bundle_id: Option<String>,
    pub archived_at: NaiveDateTime,
}

impl ArchivedNotificationRow {
    pub fn from_live(
        row: &NotificationRow,
        bundle_id: Option<&UniversalUuid>,
        now: UniversalTimestamp,
    ) -> Self {
        Self {
            id: row.id.clone(),
            recipient: row.recipient.clone(),
            origin: row.origin.clone(),
            content_type: row.content_type.clone(),
            document_type: row.document_type.clone(),
            weight: row.weight,
            sequence_number: row.sequence_number,
            bundle_id: bundle_id.map(|id| id.to_storage()),
            archived_at: now.to_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::ActorId;

    #[test]
    fn test_uuid_list_roundtrip() {
        let ids = vec![UniversalUuid::new_v4(), UniversalUuid::new_v4()];
        let encoded = encode_uuid_list(&ids);
        assert_eq!(parse_uuid_list(&encoded).unwrap(), ids);
    }

    #[test]
    fn test_uuid_list_rejects_garbage() {
        assert!(parse_uuid_list("[\"zap\"]").is_err());
        assert!(parse_uuid_list("not json").is_err());
    }

    #[test]
    fn test_notification_row_roundtrip() {
        let new = NewNotification {
            id: UniversalUuid::new_v4(),
            recipient: ActorId::parse("5790000000001").unwrap(),
            origin: SubDomain::TimeSeries,
            content_type: "RSM-012".into(),
            document_type: "MeteredDataTimeSeries".into(),
            supports_bundling: true,
            weight: 3,
            sequence_number: 42,
        };
        let drawer_id = UniversalUuid::new_v4();
        let row =
            NotificationRow::for_insert(&new, &drawer_id.to_storage(), UniversalTimestamp::now());
        let domain: Notification = row.try_into().unwrap();
        assert_eq!(domain.id, new.id);
        assert_eq!(domain.recipient, "5790000000001");
        assert_eq!(domain.origin, SubDomain::TimeSeries);
        assert_eq!(domain.drawer_id, drawer_id);
        assert!(!domain.acknowledged);
    }

    #[test]
    fn test_bundle_row_roundtrip() {
        let new = NewBundle {
            id: UniversalUuid::new_v4(),
            recipient: "5790000000001".into(),
            origin: SubDomain::Charges,
            content_type: "RSM-033".into(),
            notification_ids: vec![UniversalUuid::new_v4()],
            document_types: vec!["ChargeNotification".into()],
            response_format: ResponseFormat::Json,
            response_version: 2,
        };
        let row = BundleRow::for_insert(&new, UniversalTimestamp::now());
        assert_eq!(row.domain_group, "MasterData");
        let domain: Bundle = row.try_into().unwrap();
        assert_eq!(domain.id, new.id);
        assert_eq!(domain.domain_group, DomainGroup::MasterData);
        assert_eq!(domain.notification_ids, new.notification_ids);
        assert!(!domain.dequeued);
        assert!(domain.content_reference.is_none());
    }
}
