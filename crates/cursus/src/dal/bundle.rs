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

//! Bundle store operations.
//!
//! The single-active-bundle invariant lives in the database: a partial
//! unique index over (recipient, domain_group) where `dequeued = false`
//! makes the second of two racing `try_create` calls fail with a unique
//! violation, which is mapped to [`TryCreateOutcome::AnotherBundleExists`].
//! No client-side locking is involved; peek calls may originate from
//! different processes.

use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use super::models::BundleRow;
use super::DAL;
use crate::database::schema::bundles;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::bundle::{Bundle, DomainGroup, NewBundle};

/// Result of an atomic bundle creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryCreateOutcome {
    /// The bundle was committed; this caller owns the in-flight bundle.
    Created,
    /// An unacknowledged bundle already exists for the recipient and
    /// domain group; this caller lost the race.
    AnotherBundleExists,
    /// The (client-suggested) bundle id collides with an unrelated
    /// existing bundle.
    BundleIdAlreadyInUse,
}

/// Data access layer for bundle operations.
#[derive(Clone)]
pub struct BundleDAL<'a> {
    dal: &'a DAL,
}

impl<'a> BundleDAL<'a> {
    /// Creates a new BundleDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Loads all unacknowledged bundles for the recipient keys within
    /// the given domain groups. The caller applies priority order; at
    /// most one row exists per (key, group).
    pub async fn get_active(
        &self,
        recipient_keys: &[String],
        groups: &[DomainGroup],
    ) -> Result<Vec<Bundle>, StorageError> {
        let keys = recipient_keys.to_vec();
        let group_keys: Vec<String> = groups.iter().map(|g| g.as_str().to_string()).collect();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_active_postgres(keys, group_keys).await,
            self.get_active_sqlite(keys, group_keys).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_active_postgres(
        &self,
        keys: Vec<String>,
        groups: Vec<String>,
    ) -> Result<Vec<Bundle>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let rows: Vec<BundleRow> = conn
            .interact(move |conn| {
                bundles::table
                    .filter(bundles::recipient.eq_any(&keys))
                    .filter(bundles::domain_group.eq_any(&groups))
                    .filter(bundles::dequeued.eq(false))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Bundle::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn get_active_sqlite(
        &self,
        keys: Vec<String>,
        groups: Vec<String>,
    ) -> Result<Vec<Bundle>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let rows: Vec<BundleRow> = conn
            .interact(move |conn| {
                bundles::table
                    .filter(bundles::recipient.eq_any(&keys))
                    .filter(bundles::domain_group.eq_any(&groups))
                    .filter(bundles::dequeued.eq(false))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Bundle::try_from).collect()
    }

    /// Loads a bundle by id, provided it belongs to one of the recipient
    /// keys. A bundle owned by someone else is reported as absent.
    pub async fn get_by_id(
        &self,
        recipient_keys: &[String],
        bundle_id: UniversalUuid,
    ) -> Result<Option<Bundle>, StorageError> {
        let keys = recipient_keys.to_vec();
        let id = bundle_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_by_id_postgres(keys, id).await,
            self.get_by_id_sqlite(keys, id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(
        &self,
        keys: Vec<String>,
        id: String,
    ) -> Result<Option<Bundle>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let row: Option<BundleRow> = conn
            .interact(move |conn| {
                bundles::table
                    .filter(bundles::id.eq(&id))
                    .filter(bundles::recipient.eq_any(&keys))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Bundle::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(
        &self,
        keys: Vec<String>,
        id: String,
    ) -> Result<Option<Bundle>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: Option<BundleRow> = conn
            .interact(move |conn| {
                bundles::table
                    .filter(bundles::id.eq(&id))
                    .filter(bundles::recipient.eq_any(&keys))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Bundle::try_from).transpose()
    }

    /// Atomically creates a bundle, enforcing the single-active-bundle
    /// invariant server-side.
    ///
    /// On a unique violation the outcome is disambiguated by whether a
    /// row with this id exists: a primary-key hit means the suggested id
    /// is taken, a partial-index hit means another bundle is in flight.
    pub async fn try_create(&self, bundle: &NewBundle) -> Result<TryCreateOutcome, StorageError> {
        let row = BundleRow::for_insert(bundle, UniversalTimestamp::now());
        crate::dispatch_backend!(
            self.dal.backend(),
            self.try_create_postgres(row).await,
            self.try_create_sqlite(row).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn try_create_postgres(&self, row: BundleRow) -> Result<TryCreateOutcome, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let id = row.id.clone();

        let insert_result: Result<usize, diesel::result::Error> = conn
            .interact(move |conn| {
                diesel::insert_into(bundles::table)
                    .values(&row)
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        match insert_result {
            Ok(_) => Ok(TryCreateOutcome::Created),
            Err(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            )) => {
                let id_taken: Option<String> = conn
                    .interact(move |conn| {
                        bundles::table
                            .find(&id)
                            .select(bundles::id)
                            .first(conn)
                            .optional()
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

                if id_taken.is_some() {
                    Ok(TryCreateOutcome::BundleIdAlreadyInUse)
                } else {
                    Ok(TryCreateOutcome::AnotherBundleExists)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn try_create_sqlite(&self, row: BundleRow) -> Result<TryCreateOutcome, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let id = row.id.clone();

        let insert_result: Result<usize, diesel::result::Error> = conn
            .interact(move |conn| {
                diesel::insert_into(bundles::table)
                    .values(&row)
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        match insert_result {
            Ok(_) => Ok(TryCreateOutcome::Created),
            Err(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            )) => {
                let id_taken: Option<String> = conn
                    .interact(move |conn| {
                        bundles::table
                            .find(&id)
                            .select(bundles::id)
                            .first(conn)
                            .optional()
                    })
                    .await
                    .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

                if id_taken.is_some() {
                    Ok(TryCreateOutcome::BundleIdAlreadyInUse)
                } else {
                    Ok(TryCreateOutcome::AnotherBundleExists)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persists the content reference once the owning sub-domain has
    /// answered. Only an unassigned, undequeued bundle is updated, so
    /// the state machine stays monotonic; anything else is a no-op.
    pub async fn assign_content(
        &self,
        bundle_id: UniversalUuid,
        content_reference: &str,
    ) -> Result<(), StorageError> {
        let id = bundle_id.to_storage();
        let reference = content_reference.to_string();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.assign_content_postgres(id, reference).await,
            self.assign_content_sqlite(id, reference).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn assign_content_postgres(
        &self,
        id: String,
        reference: String,
    ) -> Result<(), StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        conn.interact(move |conn| {
            diesel::update(
                bundles::table
                    .filter(bundles::id.eq(&id))
                    .filter(bundles::dequeued.eq(false))
                    .filter(bundles::content_reference.is_null()),
            )
            .set(bundles::content_reference.eq(&reference))
            .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn assign_content_sqlite(
        &self,
        id: String,
        reference: String,
    ) -> Result<(), StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        conn.interact(move |conn| {
            diesel::update(
                bundles::table
                    .filter(bundles::id.eq(&id))
                    .filter(bundles::dequeued.eq(false))
                    .filter(bundles::content_reference.is_null()),
            )
            .set(bundles::content_reference.eq(&reference))
            .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Flips `dequeued` on a bundle the recipient owns.
    ///
    /// Idempotent: an unknown or already-dequeued bundle returns `None`.
    /// On success returns the bundle as it was at acknowledgment, with
    /// the dequeued flag set, so the caller can acknowledge and archive
    /// the constituent notifications.
    pub async fn acknowledge(
        &self,
        recipient_keys: &[String],
        bundle_id: UniversalUuid,
    ) -> Result<Option<Bundle>, StorageError> {
        let keys = recipient_keys.to_vec();
        let id = bundle_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.acknowledge_postgres(keys, id).await,
            self.acknowledge_sqlite(keys, id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn acknowledge_postgres(
        &self,
        keys: Vec<String>,
        id: String,
    ) -> Result<Option<Bundle>, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let row: Option<BundleRow> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now().to_naive();

                    let flipped = diesel::update(
                        bundles::table
                            .filter(bundles::id.eq(&id))
                            .filter(bundles::recipient.eq_any(&keys))
                            .filter(bundles::dequeued.eq(false)),
                    )
                    .set((
                        bundles::dequeued.eq(true),
                        bundles::dequeued_at.eq(Some(now)),
                    ))
                    .execute(conn)?;

                    if flipped == 0 {
                        return Ok(None);
                    }

                    bundles::table.find(&id).first(conn).optional()
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Bundle::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn acknowledge_sqlite(
        &self,
        keys: Vec<String>,
        id: String,
    ) -> Result<Option<Bundle>, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: Option<BundleRow> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now().to_naive();

                    let flipped = diesel::update(
                        bundles::table
                            .filter(bundles::id.eq(&id))
                            .filter(bundles::recipient.eq_any(&keys))
                            .filter(bundles::dequeued.eq(false)),
                    )
                    .set((
                        bundles::dequeued.eq(true),
                        bundles::dequeued_at.eq(Some(now)),
                    ))
                    .execute(conn)?;

                    if flipped == 0 {
                        return Ok(None);
                    }

                    bundles::table.find(&id).first(conn).optional()
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Bundle::try_from).transpose()
    }

    /// Marks a bundle's notifications as copied to the archive and
    /// removed from the working set.
    pub async fn mark_archived(&self, bundle_id: UniversalUuid) -> Result<(), StorageError> {
        let id = bundle_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.mark_archived_postgres(id).await,
            self.mark_archived_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn mark_archived_postgres(&self, id: String) -> Result<(), StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        conn.interact(move |conn| {
            diesel::update(bundles::table.filter(bundles::id.eq(&id)))
                .set(bundles::notifications_archived.eq(true))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn mark_archived_sqlite(&self, id: String) -> Result<(), StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        conn.interact(move |conn| {
            diesel::update(bundles::table.filter(bundles::id.eq(&id)))
                .set(bundles::notifications_archived.eq(true))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }
}
