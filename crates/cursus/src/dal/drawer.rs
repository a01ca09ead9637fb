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

//! Drawer (cabinet page) operations and page-level garbage collection.

use diesel::prelude::*;

use super::models::DrawerRow;
use super::DAL;
use crate::database::schema::{drawers, notifications};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;
use crate::models::drawer::Drawer;
use crate::models::notification::CabinetKey;

/// Data access layer for drawer operations.
#[derive(Clone)]
pub struct DrawerDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DrawerDAL<'a> {
    /// Creates a new DrawerDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Lists a cabinet's drawers oldest first. The reader walks these in
    /// order, one page at a time.
    pub async fn list_for_cabinet(&self, cabinet: &CabinetKey) -> Result<Vec<Drawer>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_for_cabinet_postgres(cabinet.clone()).await,
            self.list_for_cabinet_sqlite(cabinet.clone()).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_for_cabinet_postgres(
        &self,
        cabinet: CabinetKey,
    ) -> Result<Vec<Drawer>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let rows: Vec<DrawerRow> = conn
            .interact(move |conn| {
                drawers::table
                    .filter(drawers::recipient.eq(&cabinet.recipient))
                    .filter(drawers::origin.eq(cabinet.origin.as_str()))
                    .filter(drawers::content_type.eq(&cabinet.content_type))
                    .order((drawers::created_at.asc(), drawers::id.asc()))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Drawer::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_for_cabinet_sqlite(
        &self,
        cabinet: CabinetKey,
    ) -> Result<Vec<Drawer>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let rows: Vec<DrawerRow> = conn
            .interact(move |conn| {
                drawers::table
                    .filter(drawers::recipient.eq(&cabinet.recipient))
                    .filter(drawers::origin.eq(cabinet.origin.as_str()))
                    .filter(drawers::content_type.eq(&cabinet.content_type))
                    .order((drawers::created_at.asc(), drawers::id.asc()))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Drawer::try_from).collect()
    }

    /// Finds or creates the cabinet's open drawer: the oldest one below
    /// capacity. The idempotency guard records this as the destination
    /// before the append runs.
    pub async fn ensure_open(
        &self,
        cabinet: &CabinetKey,
        max_drawer_size: i32,
    ) -> Result<Drawer, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.ensure_open_postgres(cabinet.clone(), max_drawer_size)
                .await,
            self.ensure_open_sqlite(cabinet.clone(), max_drawer_size)
                .await
        )
    }

    #[cfg(feature = "postgres")]
    async fn ensure_open_postgres(
        &self,
        cabinet: CabinetKey,
        max_drawer_size: i32,
    ) -> Result<Drawer, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let row: DrawerRow = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let open: Option<DrawerRow> = drawers::table
                        .filter(drawers::recipient.eq(&cabinet.recipient))
                        .filter(drawers::origin.eq(cabinet.origin.as_str()))
                        .filter(drawers::content_type.eq(&cabinet.content_type))
                        .filter(drawers::position.lt(max_drawer_size))
                        .order(drawers::created_at.asc())
                        .first(conn)
                        .optional()?;

                    match open {
                        Some(d) => Ok(d),
                        None => {
                            let fresh = DrawerRow::fresh(&cabinet, UniversalTimestamp::now());
                            diesel::insert_into(drawers::table)
                                .values(&fresh)
                                .execute(conn)?;
                            Ok(fresh)
                        }
                    }
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    #[cfg(feature = "sqlite")]
    async fn ensure_open_sqlite(
        &self,
        cabinet: CabinetKey,
        max_drawer_size: i32,
    ) -> Result<Drawer, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: DrawerRow = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let open: Option<DrawerRow> = drawers::table
                        .filter(drawers::recipient.eq(&cabinet.recipient))
                        .filter(drawers::origin.eq(cabinet.origin.as_str()))
                        .filter(drawers::content_type.eq(&cabinet.content_type))
                        .filter(drawers::position.lt(max_drawer_size))
                        .order(drawers::created_at.asc())
                        .first(conn)
                        .optional()?;

                    match open {
                        Some(d) => Ok(d),
                        None => {
                            let fresh = DrawerRow::fresh(&cabinet, UniversalTimestamp::now());
                            diesel::insert_into(drawers::table)
                                .values(&fresh)
                                .execute(conn)?;
                            Ok(fresh)
                        }
                    }
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Finds sealed drawers whose age exceeds the retention cutoff:
    /// position at capacity and created before `cutoff`.
    pub async fn find_expired(
        &self,
        max_drawer_size: i32,
        cutoff: UniversalTimestamp,
    ) -> Result<Vec<Drawer>, StorageError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.find_expired_postgres(max_drawer_size, cutoff).await,
            self.find_expired_sqlite(max_drawer_size, cutoff).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn find_expired_postgres(
        &self,
        max_drawer_size: i32,
        cutoff: UniversalTimestamp,
    ) -> Result<Vec<Drawer>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;
        let cutoff = cutoff.to_naive();

        let rows: Vec<DrawerRow> = conn
            .interact(move |conn| {
                drawers::table
                    .filter(drawers::position.ge(max_drawer_size))
                    .filter(drawers::created_at.le(cutoff))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Drawer::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn find_expired_sqlite(
        &self,
        max_drawer_size: i32,
        cutoff: UniversalTimestamp,
    ) -> Result<Vec<Drawer>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;
        let cutoff = cutoff.to_naive();

        let rows: Vec<DrawerRow> = conn
            .interact(move |conn| {
                drawers::table
                    .filter(drawers::position.ge(max_drawer_size))
                    .filter(drawers::created_at.le(cutoff))
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(Drawer::try_from).collect()
    }

    /// Deletes all notifications partitioned under a drawer, then the
    /// drawer record itself, in one transaction.
    ///
    /// Both deletes tolerate "already gone": a concurrent sweeper or an
    /// earlier per-bundle archival may have removed the data first.
    /// Returns the number of notification rows removed.
    pub async fn delete_with_notifications(
        &self,
        drawer_id: UniversalUuid,
    ) -> Result<usize, StorageError> {
        let key = drawer_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.delete_with_notifications_postgres(key).await,
            self.delete_with_notifications_sqlite(key).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn delete_with_notifications_postgres(&self, key: String) -> Result<usize, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let removed = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let removed = diesel::delete(
                        notifications::table.filter(notifications::drawer_id.eq(&key)),
                    )
                    .execute(conn)?;
                    diesel::delete(drawers::table.filter(drawers::id.eq(&key))).execute(conn)?;
                    Ok(removed)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    #[cfg(feature = "sqlite")]
    async fn delete_with_notifications_sqlite(&self, key: String) -> Result<usize, StorageError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_sqlite_connection().await?;

        let removed = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let removed = diesel::delete(
                        notifications::table.filter(notifications::drawer_id.eq(&key)),
                    )
                    .execute(conn)?;
                    diesel::delete(drawers::table.filter(drawers::id.eq(&key))).execute(conn)?;
                    Ok(removed)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Loads a drawer by id.
    pub async fn get_by_id(&self, drawer_id: UniversalUuid) -> Result<Option<Drawer>, StorageError> {
        let key = drawer_id.to_storage();
        crate::dispatch_backend!(
            self.dal.backend(),
            self.get_by_id_postgres(key).await,
            self.get_by_id_sqlite(key).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(&self, key: String) -> Result<Option<Drawer>, StorageError> {
        let conn = self.dal.database.get_postgres_connection().await?;

        let row: Option<DrawerRow> = conn
            .interact(move |conn| drawers::table.find(key).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Drawer::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(&self, key: String) -> Result<Option<Drawer>, StorageError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        let row: Option<DrawerRow> = conn
            .interact(move |conn| drawers::table.find(key).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(Drawer::try_from).transpose()
    }
}
