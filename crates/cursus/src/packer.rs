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

//! Bundle packing.
//!
//! Greedy prefix selection under a weight budget:
//!
//! 1. The first notification is always taken, even when its weight alone
//!    exceeds the budget: a bundle must make progress, so a single
//!    oversized item becomes its own bundle.
//! 2. A non-bundlable first notification short-circuits to a bundle of
//!    one.
//! 3. Each further notification is peeked before being taken; the first
//!    one that is non-bundlable or would overflow the budget is left for
//!    the next bundle.

use crate::cabinet::NotificationReader;
use crate::database::universal_types::UniversalUuid;
use crate::error::StorageError;

/// The result of packing one bundle's worth of notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedBundle {
    /// Constituent notification ids, in reader order.
    pub notification_ids: Vec<UniversalUuid>,
    /// Distinct document types, in first-seen order.
    pub document_types: Vec<String>,
    /// Sum of the constituents' weights.
    pub total_weight: i64,
}

impl PackedBundle {
    pub fn is_empty(&self) -> bool {
        self.notification_ids.is_empty()
    }
}

/// Packs a prefix of the reader's pending notifications under
/// `max_weight`.
///
/// Returns an empty pack when the reader has nothing; callers should
/// treat that as "no bundle to offer".
pub async fn pack<R>(reader: &mut R, max_weight: i32) -> Result<PackedBundle, StorageError>
where
    R: NotificationReader + Send,
{
    let mut packed = PackedBundle::default();

    let Some(first) = reader.take().await? else {
        return Ok(packed);
    };

    packed.total_weight = i64::from(first.weight);
    packed.notification_ids.push(first.id);
    packed.document_types.push(first.document_type.clone());

    if !first.supports_bundling {
        return Ok(packed);
    }

    loop {
        let fits = match reader.peek() {
            Some(next) => {
                next.supports_bundling
                    && packed.total_weight + i64::from(next.weight) <= i64::from(max_weight)
            }
            None => false,
        };
        if !fits {
            break;
        }

        let Some(next) = reader.take().await? else {
            break;
        };
        packed.total_weight += i64::from(next.weight);
        packed.notification_ids.push(next.id);
        if !packed.document_types.contains(&next.document_type) {
            packed.document_types.push(next.document_type);
        }
    }

    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabinet::VecReader;
    use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
    use crate::models::notification::{Notification, SubDomain};

    fn notification(weight: i32, bundlable: bool, document_type: &str) -> Notification {
        Notification {
            id: UniversalUuid::new_v4(),
            recipient: "5790000000001".into(),
            origin: SubDomain::TimeSeries,
            content_type: "RSM-012".into(),
            document_type: document_type.into(),
            supports_bundling: bundlable,
            weight,
            sequence_number: 0,
            drawer_id: UniversalUuid::new_v4(),
            acknowledged: false,
            created_at: UniversalTimestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_reader_packs_nothing() {
        let mut reader = VecReader::new(vec![]);
        let packed = pack(&mut reader, 10).await.unwrap();
        assert!(packed.is_empty());
        assert_eq!(packed.total_weight, 0);
    }

    #[tokio::test]
    async fn test_stops_before_budget_overflow() {
        // Weights [5, 3, 4] with budget 7: the first item is taken, 5+3
        // overflows, so the bundle is the first item alone.
        let items = vec![
            notification(5, true, "A"),
            notification(3, true, "A"),
            notification(4, true, "A"),
        ];
        let first_id = items[0].id;
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 7).await.unwrap();
        assert_eq!(packed.notification_ids, vec![first_id]);
        assert_eq!(packed.total_weight, 5);
        // The overflowing item was peeked, not consumed.
        assert_eq!(reader.peek().unwrap().weight, 3);
    }

    #[tokio::test]
    async fn test_packs_to_exact_budget() {
        // Weights [5, 2, 3] with budget 10 fit exactly.
        let items = vec![
            notification(5, true, "A"),
            notification(2, true, "B"),
            notification(3, true, "A"),
        ];
        let ids: Vec<_> = items.iter().map(|n| n.id).collect();
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 10).await.unwrap();
        assert_eq!(packed.notification_ids, ids);
        assert_eq!(packed.total_weight, 10);
        assert_eq!(packed.document_types, vec!["A".to_string(), "B".to_string()]);
        assert!(!reader.can_peek());
    }

    #[tokio::test]
    async fn test_oversized_first_item_becomes_own_bundle() {
        let items = vec![notification(100, true, "A"), notification(1, true, "A")];
        let first_id = items[0].id;
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 10).await.unwrap();
        assert_eq!(packed.notification_ids, vec![first_id]);
        assert_eq!(packed.total_weight, 100);
    }

    #[tokio::test]
    async fn test_non_bundlable_first_item_short_circuits() {
        let items = vec![
            notification(1, false, "A"),
            notification(1, true, "A"),
            notification(1, true, "A"),
        ];
        let first_id = items[0].id;
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 10).await.unwrap();
        assert_eq!(packed.notification_ids, vec![first_id]);
        assert!(reader.can_peek());
    }

    #[tokio::test]
    async fn test_non_bundlable_follower_is_left_behind() {
        let items = vec![
            notification(1, true, "A"),
            notification(1, false, "B"),
            notification(1, true, "A"),
        ];
        let first_id = items[0].id;
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 10).await.unwrap();
        assert_eq!(packed.notification_ids, vec![first_id]);
        // The non-bundlable follower heads the next bundle.
        assert!(!reader.peek().unwrap().supports_bundling);
    }

    #[tokio::test]
    async fn test_document_types_are_distinct() {
        let items = vec![
            notification(1, true, "A"),
            notification(1, true, "A"),
            notification(1, true, "B"),
        ];
        let mut reader = VecReader::new(items);

        let packed = pack(&mut reader, 10).await.unwrap();
        assert_eq!(packed.notification_ids.len(), 3);
        assert_eq!(packed.document_types, vec!["A".to_string(), "B".to_string()]);
    }
}
