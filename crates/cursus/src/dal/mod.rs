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

//! Data Access Layer with runtime backend selection.
//!
//! Each DAL operation dispatches to a backend-specific implementation
//! based on the database connection type. The row models and queries are
//! shared; only connection acquisition and the occasional SQL semantic
//! (conflict handling) differ per backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use cursus::dal::DAL;
//! use cursus::database::Database;
//!
//! let db = Database::new(":memory:", "", 1);
//! db.run_migrations().await?;
//! let dal = DAL::new(db);
//!
//! let active = dal.bundle().get_active(&keys, &groups).await?;
//! ```

use crate::database::Database;

pub mod bundle;
pub mod drawer;
pub mod idempotency;
pub mod models;
pub mod notification;

pub use bundle::{BundleDAL, TryCreateOutcome};
pub use drawer::DrawerDAL;
pub use idempotency::{IdempotencyDAL, IdempotencyInsert};
pub use notification::{AppendOutcome, NotificationDAL};

/// Helper macro for dispatching operations based on backend type.
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg_expr:expr, $sqlite_expr:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg_expr,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite_expr,
        }
    };
}

/// The Data Access Layer facade.
///
/// # Thread Safety
///
/// `DAL` is `Clone` and can be safely shared between tasks. Each clone
/// references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> crate::database::BackendType {
        self.database.backend()
    }

    /// Returns a notification DAL for notification-log operations.
    pub fn notification(&self) -> NotificationDAL {
        NotificationDAL::new(self)
    }

    /// Returns a drawer DAL for page operations and cleanup.
    pub fn drawer(&self) -> DrawerDAL {
        DrawerDAL::new(self)
    }

    /// Returns a bundle DAL for bundle operations.
    pub fn bundle(&self) -> BundleDAL {
        BundleDAL::new(self)
    }

    /// Returns an idempotency DAL for duplicate-delivery records.
    pub fn idempotency(&self) -> IdempotencyDAL {
        IdempotencyDAL::new(self)
    }
}
