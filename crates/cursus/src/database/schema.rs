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

//! Diesel schema shared by both backends.
//!
//! Column types are restricted to representations both PostgreSQL and
//! SQLite support (TEXT uuids, TIMESTAMP, BOOL, INTEGER/BIGINT, BINARY),
//! so a single model set serves both. Backend-specific DDL lives in the
//! per-backend migration directories; the partial unique index that
//! enforces the single-active-bundle invariant is created there.

diesel::table! {
    /// Working-set notification log, partitioned by cabinet key
    /// (recipient, origin, content_type) and paged by drawer.
    notifications (id) {
        id -> Text,
        recipient -> Text,
        origin -> Text,
        content_type -> Text,
        document_type -> Text,
        supports_bundling -> Bool,
        weight -> Integer,
        sequence_number -> BigInt,
        drawer_id -> Text,
        acknowledged -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// One bounded page of a cabinet's notification log.
    drawers (id) {
        id -> Text,
        recipient -> Text,
        origin -> Text,
        content_type -> Text,
        position -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Bundles offered to market operators. At most one row per
    /// (recipient, domain_group) may have dequeued = false; a partial
    /// unique index rejects a second concurrent insert.
    bundles (id) {
        id -> Text,
        recipient -> Text,
        origin -> Text,
        domain_group -> Text,
        content_type -> Text,
        notification_ids -> Text,
        document_types -> Text,
        response_format -> Text,
        response_version -> Integer,
        dequeued -> Bool,
        content_reference -> Nullable<Text>,
        notifications_archived -> Bool,
        created_at -> Timestamp,
        dequeued_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    /// Duplicate-delivery detection, one row per notification id.
    idempotency_records (notification_id) {
        notification_id -> Text,
        fingerprint -> Binary,
        drawer_id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Cold store for consumed notifications.
    archived_notifications (id) {
        id -> Text,
        recipient -> Text,
        origin -> Text,
        content_type -> Text,
        document_type -> Text,
        weight -> Integer,
        sequence_number -> BigInt,
        bundle_id -> Nullable<Text>,
        archived_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    notifications,
    drawers,
    bundles,
    idempotency_records,
    archived_notifications,
);
