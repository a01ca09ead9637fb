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

//! Duplicate-delivery detection records.
//!
//! One record per notification id. A record is never updated after
//! successful creation, with one exception: when the owning drawer no
//! longer holds a live row (concurrent cleanup consumed it), redelivery
//! is treated as first-time and the record is re-pointed at the new
//! drawer.

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::notification::NewNotification;

/// A stored idempotency record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub notification_id: UniversalUuid,
    pub fingerprint: Vec<u8>,
    pub drawer_id: UniversalUuid,
    pub created_at: UniversalTimestamp,
}

/// Deterministic content fingerprint of a notification.
///
/// Concatenates content type, origin, recipient key, the
/// supports-bundling flag and the weight as bytes. Two deliveries under
/// the same id are duplicates exactly when their fingerprints match;
/// a mismatch is a data-integrity fault in the producer.
pub fn content_fingerprint(notification: &NewNotification) -> Vec<u8> {
    let recipient_key = notification.recipient.storage_key();
    let mut bytes = Vec::with_capacity(
        notification.content_type.len() + notification.origin.as_str().len() + recipient_key.len() + 5,
    );
    bytes.extend_from_slice(notification.content_type.as_bytes());
    bytes.extend_from_slice(notification.origin.as_str().as_bytes());
    bytes.extend_from_slice(recipient_key.as_bytes());
    bytes.push(notification.supports_bundling as u8);
    bytes.extend_from_slice(&notification.weight.to_be_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::ActorId;
    use crate::models::notification::SubDomain;

    fn notification(weight: i32) -> NewNotification {
        NewNotification {
            id: UniversalUuid::new_v4(),
            recipient: ActorId::parse("5790000000001").unwrap(),
            origin: SubDomain::Charges,
            content_type: "RSM-033".into(),
            document_type: "ChargeNotification".into(),
            supports_bundling: true,
            weight,
            sequence_number: 7,
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = notification(10);
        let mut b = a.clone();
        // Fields outside the fingerprint must not affect it.
        b.id = UniversalUuid::new_v4();
        b.sequence_number = 99;
        b.document_type = "Other".into();
        assert_eq!(content_fingerprint(&a), content_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_detects_content_change() {
        let a = notification(10);
        let mut b = a.clone();
        b.weight = 11;
        assert_ne!(content_fingerprint(&a), content_fingerprint(&b));

        let mut c = a.clone();
        c.supports_bundling = false;
        assert_ne!(content_fingerprint(&a), content_fingerprint(&c));

        let mut d = a.clone();
        d.origin = SubDomain::Wholesale;
        assert_ne!(content_fingerprint(&a), content_fingerprint(&d));
    }
}
