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

//! Notification store operations.
//!
//! Appends are transactional: drawer selection, the conditional position
//! advance and the notification insert commit together or not at all. A
//! lost fill race surfaces as [`AppendOutcome::DrawerFull`] so the caller
//! can retry against the (possibly new) open drawer; nothing partial is
//! committed.

use diesel::prelude::*;

use super::models::{ArchivedNotificationRow, DrawerRow, NotificationRow};
use super::DAL;
use crate::database::schema::{archived_notifications, drawers, notifications};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::notification::{CabinetKey, NewNotification, Notification, SubDomain};

/// Result of a single append attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The notification was written against this drawer.
    Appended { drawer_id: UniversalUuid },
    /// A concurrent writer filled the open drawer first. Retry; the next
    /// attempt will select or create a fresh drawer.
    DrawerFull,
}

/// Data access layer for the notification log.
#[derive(Clone)]
pub struct NotificationDAL<'a> {
    dal: &'a DAL,
}

impl<'a> NotificationDAL<'a> {
    /// Creates a new NotificationDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Appends a notification to its cabinet's open drawer, creating a
    /// drawer when none is open.
    ///
    /// The open drawer is the oldest one below capacity, so concurrent
    /// writers converge on the same page and fill it before starting the
    /// next.
    pub async fn append(
        &self,
        notification: &NewNotification,
        max_drawer_size: i32,
    ) -> Result<AppendOutcome, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.append_postgres(notification.clone(), max_drawer_size)
                .await,
            self.append_sqlite(notification.clone(), max_drawer_size)
                .await
        )
    }

    #[cfg(feature = "postgres")]
    async fn append_postgres(
        &self,
        notification: NewNotification,
        max_drawer_size: i32,
    ) -> Result<AppendOutcome, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let drawer_id: Option<String> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now();
                    let cabinet = notification.cabinet_key();

                    // Oldest drawer still below capacity.
                    let open: Option<DrawerRow> = drawers::table
                        .filter(drawers::recipient.eq(&cabinet.recipient))
                        .filter(drawers::origin.eq(cabinet.origin.as_str()))
                        .filter(drawers::content_type.eq(&cabinet.content_type))
                        .filter(drawers::position.lt(max_drawer_size))
                        .order(drawers::created_at.asc())
                        .first(conn)
                        .optional()?;

                    let drawer = match open {
                        Some(d) => d,
                        None => {
                            let fresh = DrawerRow::fresh(&cabinet, now);
                            diesel::insert_into(drawers::table)
                                .values(&fresh)
                                .execute(conn)?;
                            fresh
                        }
                    };

                    // Conditional advance; zero rows means a concurrent
                    // writer filled the drawer underneath us.
                    let advanced = diesel::update(
                        drawers::table
                            .filter(drawers::id.eq(&drawer.id))
                            .filter(drawers::position.lt(max_drawer_size)),
                    )
                    .set(drawers::position.eq(drawers::position + 1))
                    .execute(conn)?;

                    if advanced == 0 {
                        return Ok(None);
                    }

                    let row = NotificationRow::for_insert(&notification, &drawer.id, now);
                    diesel::insert_into(notifications::table)
                        .values(&row)
                        .execute(conn)?;

                    Ok(Some(drawer.id))
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(match drawer_id {
            Some(id) => AppendOutcome::Appended {
                drawer_id: super::models::parse_uuid(&id)?,
            },
            None => AppendOutcome::DrawerFull,
        })
    }

    #[cfg(feature = "sqlite")]
    async fn append_sqlite(
        &self,
        notification: NewNotification,
        max_drawer_size: i32,
    ) -> Result<AppendOutcome, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let drawer_id: Option<String> = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now();
                    let cabinet = notification.cabinet_key();

                    // Oldest drawer still below capacity.
                    let open: Option<DrawerRow> = drawers::table
                        .filter(drawers::recipient.eq(&cabinet.recipient))
                        .filter(drawers::origin.eq(cabinet.origin.as_str()))
                        .filter(drawers::content_type.eq(&cabinet.content_type))
                        .filter(drawers::position.lt(max_drawer_size))
                        .order(drawers::created_at.asc())
                        .first(conn)
                        .optional()?;

                    let drawer = match open {
                        Some(d) => d,
                        None => {
                            let fresh = DrawerRow::fresh(&cabinet, now);
                            diesel::insert_into(drawers::table)
                                .values(&fresh)
                                .execute(conn)?;
                            fresh
                        }
                    };

                    // Conditional advance; zero rows means a concurrent
                    // writer filled the drawer underneath us.
                    let advanced = diesel::update(
                        drawers::table
                            .filter(drawers::id.eq(&drawer.id))
                            .filter(drawers::position.lt(max_drawer_size)),
                    )
                    .set(drawers::position.eq(drawers::position + 1))
                    .execute(conn)?;

                    if advanced == 0 {
                        return Ok(None);
                    }

                    let row = NotificationRow::for_insert(&notification, &drawer.id, now);
                    diesel::insert_into(notifications::table)
                        .values(&row)
                        .execute(conn)?;

                    Ok(Some(drawer.id))
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(match drawer_id {
            Some(id) => AppendOutcome::Appended {
                drawer_id: super::models::parse_uuid(&id)?,
            },
            None => AppendOutcome::DrawerFull,
        })
    }

    /// Loads the unacknowledged notifications of one drawer page, oldest
    /// first (sequence number ascending, id as the final tie break).
    pub async fn pending_page(
        &self,
        drawer_id: UniversalUuid,
    ) -> Result<Vec<Notification>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.pending_page_postgres(drawer_id).await,
            self.pending_page_sqlite(drawer_id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn pending_page_postgres(
        &self,
        drawer_id: UniversalUuid,
    ) -> Result<Vec<Notification>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let key = drawer_id.to_storage();

        let rows: Vec<NotificationRow> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::drawer_id.eq(key))
                    .filter(notifications::acknowledged.eq(false))
                    .order((
                        notifications::sequence_number.asc(),
                        notifications::id.asc(),
                    ))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Notification::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn pending_page_sqlite(
        &self,
        drawer_id: UniversalUuid,
    ) -> Result<Vec<Notification>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let key = drawer_id.to_storage();

        let rows: Vec<NotificationRow> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::drawer_id.eq(key))
                    .filter(notifications::acknowledged.eq(false))
                    .order((
                        notifications::sequence_number.asc(),
                        notifications::id.asc(),
                    ))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Whether any unacknowledged notification exists for the cabinet.
    pub async fn has_pending(&self, cabinet: &CabinetKey) -> Result<bool, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.has_pending_postgres(cabinet.clone()).await,
            self.has_pending_sqlite(cabinet.clone()).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn has_pending_postgres(&self, cabinet: CabinetKey) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let found: Option<String> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::recipient.eq(&cabinet.recipient))
                    .filter(notifications::origin.eq(cabinet.origin.as_str()))
                    .filter(notifications::content_type.eq(&cabinet.content_type))
                    .filter(notifications::acknowledged.eq(false))
                    .select(notifications::id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.is_some())
    }

    #[cfg(feature = "sqlite")]
    async fn has_pending_sqlite(&self, cabinet: CabinetKey) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let found: Option<String> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::recipient.eq(&cabinet.recipient))
                    .filter(notifications::origin.eq(cabinet.origin.as_str()))
                    .filter(notifications::content_type.eq(&cabinet.content_type))
                    .filter(notifications::acknowledged.eq(false))
                    .select(notifications::id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.is_some())
    }

    /// Finds the cabinet holding the oldest pending notification for the
    /// recipient keys within one origin. Peek uses this to decide which
    /// content type to serve next; oldest data wins.
    pub async fn first_pending_cabinet(
        &self,
        recipient_keys: &[String],
        origin: SubDomain,
    ) -> Result<Option<CabinetKey>, StorageError> {
        let keys = recipient_keys.to_vec();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.first_pending_cabinet_postgres(keys, origin).await,
            self.first_pending_cabinet_sqlite(keys, origin).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn first_pending_cabinet_postgres(
        &self,
        keys: Vec<String>,
        origin: SubDomain,
    ) -> Result<Option<CabinetKey>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let found: Option<(String, String)> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::recipient.eq_any(&keys))
                    .filter(notifications::origin.eq(origin.as_str()))
                    .filter(notifications::acknowledged.eq(false))
                    .order((
                        notifications::created_at.asc(),
                        notifications::sequence_number.asc(),
                    ))
                    .select((notifications::recipient, notifications::content_type))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.map(|(recipient, content_type)| CabinetKey {
            recipient,
            origin,
            content_type,
        }))
    }

    #[cfg(feature = "sqlite")]
    async fn first_pending_cabinet_sqlite(
        &self,
        keys: Vec<String>,
        origin: SubDomain,
    ) -> Result<Option<CabinetKey>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let found: Option<(String, String)> = conn
            .interact(move |conn| {
                notifications::table
                    .filter(notifications::recipient.eq_any(&keys))
                    .filter(notifications::origin.eq(origin.as_str()))
                    .filter(notifications::acknowledged.eq(false))
                    .order((
                        notifications::created_at.asc(),
                        notifications::sequence_number.asc(),
                    ))
                    .select((notifications::recipient, notifications::content_type))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.map(|(recipient, content_type)| CabinetKey {
            recipient,
            origin,
            content_type,
        }))
    }

    /// Marks notifications consumed so they no longer appear in readers.
    ///
    /// Idempotent: re-acknowledging already-consumed or unknown ids is a
    /// no-op. Returns the number of rows newly acknowledged.
    pub async fn acknowledge(
        &self,
        recipient_keys: &[String],
        notification_ids: &[UniversalUuid],
    ) -> Result<usize, StorageError> {
        let keys = recipient_keys.to_vec();
        let ids: Vec<String> = notification_ids.iter().map(|id| id.to_storage()).collect();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.acknowledge_postgres(keys, ids).await,
            self.acknowledge_sqlite(keys, ids).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn acknowledge_postgres(
        &self,
        keys: Vec<String>,
        ids: Vec<String>,
    ) -> Result<usize, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    notifications::table
                        .filter(notifications::id.eq_any(&ids))
                        .filter(notifications::recipient.eq_any(&keys))
                        .filter(notifications::acknowledged.eq(false)),
                )
                .set(notifications::acknowledged.eq(true))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(updated)
    }

    #[cfg(feature = "sqlite")]
    async fn acknowledge_sqlite(
        &self,
        keys: Vec<String>,
        ids: Vec<String>,
    ) -> Result<usize, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let updated = conn
            .interact(move |conn| {
                diesel::update(
                    notifications::table
                        .filter(notifications::id.eq_any(&ids))
                        .filter(notifications::recipient.eq_any(&keys))
                        .filter(notifications::acknowledged.eq(false)),
                )
                .set(notifications::acknowledged.eq(true))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(updated)
    }

    /// Copies notifications into the cold store.
    ///
    /// Tolerates targets that are already archived or already gone
    /// (concurrent cleanup). Returns the number of rows newly copied.
    pub async fn archive(
        &self,
        notification_ids: &[UniversalUuid],
        bundle_id: Option<UniversalUuid>,
    ) -> Result<usize, StorageError> {
        let ids: Vec<String> = notification_ids.iter().map(|id| id.to_storage()).collect();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.archive_postgres(ids, bundle_id).await,
            self.archive_sqlite(ids, bundle_id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn archive_postgres(
        &self,
        ids: Vec<String>,
        bundle_id: Option<UniversalUuid>,
    ) -> Result<usize, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let copied = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now();
                    let live: Vec<NotificationRow> = notifications::table
                        .filter(notifications::id.eq_any(&ids))
                        .load(conn)?;
                    if live.is_empty() {
                        return Ok(0);
                    }
                    let rows: Vec<ArchivedNotificationRow> = live
                        .iter()
                        .map(|r| ArchivedNotificationRow::from_live(r, bundle_id.as_ref(), now))
                        .collect();
                    diesel::insert_into(archived_notifications::table)
                        .values(&rows)
                        .on_conflict_do_nothing()
                        .execute(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(copied)
    }

    #[cfg(feature = "sqlite")]
    async fn archive_sqlite(
        &self,
        ids: Vec<String>,
        bundle_id: Option<UniversalUuid>,
    ) -> Result<usize, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let copied = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now();
                    let live: Vec<NotificationRow> = notifications::table
                        .filter(notifications::id.eq_any(&ids))
                        .load(conn)?;
                    if live.is_empty() {
                        return Ok(0);
                    }
                    let rows: Vec<ArchivedNotificationRow> = live
                        .iter()
                        .map(|r| ArchivedNotificationRow::from_live(r, bundle_id.as_ref(), now))
                        .collect();
                    // SQLite does not support batch insert combined with
                    // ON CONFLICT in diesel, so insert row by row.
                    let mut copied = 0usize;
                    for row in &rows {
                        copied += diesel::insert_into(archived_notifications::table)
                            .values(row)
                            .on_conflict_do_nothing()
                            .execute(conn)?;
                    }
                    Ok(copied)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(copied)
    }

    /// Removes notifications from the working set.
    ///
    /// Tolerates rows a concurrent sweep already removed. Returns the
    /// number of rows actually deleted.
    pub async fn delete(&self, notification_ids: &[UniversalUuid]) -> Result<usize, StorageError> {
        let ids: Vec<String> = notification_ids.iter().map(|id| id.to_storage()).collect();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.delete_postgres(ids).await,
            self.delete_sqlite(ids).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn delete_postgres(&self, ids: Vec<String>) -> Result<usize, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let deleted = conn
            .interact(move |conn| {
                diesel::delete(notifications::table.filter(notifications::id.eq_any(&ids)))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(deleted)
    }

    #[cfg(feature = "sqlite")]
    async fn delete_sqlite(&self, ids: Vec<String>) -> Result<usize, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let deleted = conn
            .interact(move |conn| {
                diesel::delete(notifications::table.filter(notifications::id.eq_any(&ids)))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(deleted)
    }

    /// Whether a live (working-set) row exists for the notification id.
    /// Used by the idempotency guard to detect records whose original
    /// item was already consumed by cleanup.
    pub async fn exists(&self, notification_id: UniversalUuid) -> Result<bool, StorageError> {
        let key = notification_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.exists_postgres(key).await,
            self.exists_sqlite(key).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn exists_postgres(&self, key: String) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let found: Option<String> = conn
            .interact(move |conn| {
                notifications::table
                    .find(key)
                    .select(notifications::id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.is_some())
    }

    #[cfg(feature = "sqlite")]
    async fn exists_sqlite(&self, key: String) -> Result<bool, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let found: Option<String> = conn
            .interact(move |conn| {
                notifications::table
                    .find(key)
                    .select(notifications::id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(found.is_some())
    }

    /// Loads archived notification ids (cold store) for the given
    /// recipient keys.
    pub async fn archived_ids(
        &self,
        recipient_keys: &[String],
    ) -> Result<Vec<UniversalUuid>, StorageError> {
        let keys = recipient_keys.to_vec();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.archived_ids_postgres(keys).await,
            self.archived_ids_sqlite(keys).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn archived_ids_postgres(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<UniversalUuid>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let ids: Vec<String> = conn
            .interact(move |conn| {
                archived_notifications::table
                    .filter(archived_notifications::recipient.eq_any(&keys))
                    .select(archived_notifications::id)
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        ids.iter().map(|id| super::models::parse_uuid(id)).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn archived_ids_sqlite(
        &self,
        keys: Vec<String>,
    ) -> Result<Vec<UniversalUuid>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let ids: Vec<String> = conn
            .interact(move |conn| {
                archived_notifications::table
                    .filter(archived_notifications::recipient.eq_any(&keys))
                    .select(archived_notifications::id)
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        ids.iter().map(|id| super::models::parse_uuid(id)).collect()
    }
}
