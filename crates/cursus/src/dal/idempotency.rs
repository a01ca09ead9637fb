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

//! Idempotency record operations.
//!
//! Insert-first: the attempt to create the record is itself the
//! duplicate check. A conflicting insert returns the existing record so
//! the guard can compare fingerprints without a second round trip.

use diesel::prelude::*;

use super::models::IdempotencyRow;
use super::DAL;
use crate::database::schema::idempotency_records;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::idempotency::IdempotencyRecord;

/// Result of an idempotency record insert attempt.
#[derive(Debug, Clone)]
pub enum IdempotencyInsert {
    /// First-time delivery; the record was created.
    Inserted,
    /// A record for this notification id already exists.
    Conflict(IdempotencyRecord),
}

/// Data access layer for idempotency records.
#[derive(Clone)]
pub struct IdempotencyDAL<'a> {
    dal: &'a DAL,
}

impl<'a> IdempotencyDAL<'a> {
    /// Creates a new IdempotencyDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Attempts to create a record for the notification id.
    ///
    /// Returns [`IdempotencyInsert::Conflict`] with the existing record
    /// when one is already stored.
    pub async fn try_insert(
        &self,
        notification_id: UniversalUuid,
        fingerprint: &[u8],
        drawer_id: UniversalUuid,
    ) -> Result<IdempotencyInsert, StorageError> {
        let row = IdempotencyRow {
            notification_id: notification_id.to_storage(),
            fingerprint: fingerprint.to_vec(),
            drawer_id: drawer_id.to_storage(),
            created_at: UniversalTimestamp::now().to_naive(),
        };
        crate::dispatch_backend!(
            self.dal.backend(),
            self.try_insert_postgres(row).await,
            self.try_insert_sqlite(row).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn try_insert_postgres(
        &self,
        row: IdempotencyRow,
    ) -> Result<IdempotencyInsert, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id = row.notification_id.clone();

        let inserted = conn
            .interact(move |conn| {
                diesel::insert_into(idempotency_records::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if inserted > 0 {
            return Ok(IdempotencyInsert::Inserted);
        }

        let existing: Option<IdempotencyRow> = conn
            .interact(move |conn| idempotency_records::table.find(&id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        match existing {
            Some(row) => Ok(IdempotencyInsert::Conflict(row.try_into()?)),
            // The conflicting record vanished between the insert and the
            // read (concurrent cleanup). Treat as first-time; the caller
            // retries the whole guard.
            None => Ok(IdempotencyInsert::Inserted),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn try_insert_sqlite(
        &self,
        row: IdempotencyRow,
    ) -> Result<IdempotencyInsert, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id = row.notification_id.clone();

        let inserted = conn
            .interact(move |conn| {
                diesel::insert_into(idempotency_records::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if inserted > 0 {
            return Ok(IdempotencyInsert::Inserted);
        }

        let existing: Option<IdempotencyRow> = conn
            .interact(move |conn| idempotency_records::table.find(&id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        match existing {
            Some(row) => Ok(IdempotencyInsert::Conflict(row.try_into()?)),
            None => Ok(IdempotencyInsert::Inserted),
        }
    }

    /// Re-points an existing record at a new drawer with a fresh
    /// fingerprint. Used when the original item was already consumed by
    /// cleanup and redelivery is treated as first-time.
    pub async fn repoint(
        &self,
        notification_id: UniversalUuid,
        fingerprint: &[u8],
        drawer_id: UniversalUuid,
    ) -> Result<(), StorageError> {
        let id = notification_id.to_storage();
        let fingerprint = fingerprint.to_vec();
        let drawer = drawer_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.repoint_postgres(id, fingerprint, drawer).await,
            self.repoint_sqlite(id, fingerprint, drawer).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn repoint_postgres(
        &self,
        id: String,
        fingerprint: Vec<u8>,
        drawer: String,
    ) -> Result<(), StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        conn.interact(move |conn| {
            let now = UniversalTimestamp::now().to_naive();
            diesel::update(idempotency_records::table.find(&id))
                .set((
                    idempotency_records::fingerprint.eq(&fingerprint),
                    idempotency_records::drawer_id.eq(&drawer),
                    idempotency_records::created_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn repoint_sqlite(
        &self,
        id: String,
        fingerprint: Vec<u8>,
        drawer: String,
    ) -> Result<(), StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        conn.interact(move |conn| {
            let now = UniversalTimestamp::now().to_naive();
            diesel::update(idempotency_records::table.find(&id))
                .set((
                    idempotency_records::fingerprint.eq(&fingerprint),
                    idempotency_records::drawer_id.eq(&drawer),
                    idempotency_records::created_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Loads a record by notification id.
    pub async fn get(
        &self,
        notification_id: UniversalUuid,
    ) -> Result<Option<IdempotencyRecord>, StorageError> {
        let id = notification_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_postgres(id).await,
            self.get_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_postgres(&self, id: String) -> Result<Option<IdempotencyRecord>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let row: Option<IdempotencyRow> = conn
            .interact(move |conn| idempotency_records::table.find(&id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(IdempotencyRecord::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_sqlite(&self, id: String) -> Result<Option<IdempotencyRecord>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: Option<IdempotencyRow> = conn
            .interact(move |conn| idempotency_records::table.find(&id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(IdempotencyRecord::try_from).transpose()
    }
}
