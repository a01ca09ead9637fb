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

//! Error types for the post-office engine.
//!
//! The error surface follows a strict taxonomy:
//!
//! - **Validation errors** are caused by the caller and reported back
//!   unchanged ([`PeekError`] mismatch variants, [`IngestError::ConflictingContent`]).
//! - **Transient outcomes** are not errors at all: "nothing pending",
//!   "lost the creation race" and "content not ready" are ordinary return
//!   values on the service types, so clients can poll safely.
//! - **Storage conflicts** (a drawer filled by a concurrent writer, a row
//!   already deleted by a concurrent sweep) are retried or tolerated
//!   inside the DAL and never reach the caller.
//! - **Fatal faults** (pool exhaustion, serialization, unreachable
//!   database) surface as [`StorageError`] and propagate with `?`.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the data access layer.
///
/// Everything here is fatal from the caller's perspective: no partial
/// state has been committed (each append, idempotency insert and bundle
/// creation is a single atomic write).
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to obtain a connection from the pool, or the blocking
    /// interaction with the connection was aborted.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// An underlying database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Running embedded migrations failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored value could not be decoded into its domain type.
    #[error("Stored data could not be decoded: {0}")]
    Corrupt(String),
}

/// Errors raised by `peek`.
///
/// Only client mistakes and fatal storage faults appear here; "no data
/// yet" in all its forms is a [`crate::service::PeekOutcome`], not an error.
#[derive(Error, Debug)]
pub enum PeekError {
    /// The caller suggested a bundle id, but a different bundle is
    /// already in flight for this recipient.
    #[error("Suggested bundle id {suggested} does not match the active bundle {active}")]
    BundleIdMismatch { suggested: Uuid, active: Uuid },

    /// The caller asked for a different response format than the one the
    /// active bundle was created with. Switching format mid-handshake
    /// would corrupt the client's in-flight peek/dequeue exchange.
    #[error("Requested response format {requested} does not match the active bundle's format {active}")]
    ResponseFormatMismatch { requested: String, active: String },

    /// The caller-suggested bundle id is already taken by an unrelated
    /// bundle.
    #[error("Bundle id {0} is already in use")]
    BundleIdAlreadyInUse(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by `dequeue`.
///
/// An unknown or already-dequeued bundle is *not* an error; `dequeue`
/// returns `false` for those so re-sent acknowledgments stay harmless.
#[derive(Error, Debug)]
pub enum DequeueError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised during notification intake.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A notification arrived under an id that was already recorded with
    /// *different* content. This is a data-integrity fault in the
    /// producing sub-domain, never silently overwritten.
    #[error("Notification {notification_id} was already received with different content")]
    ConflictingContent { notification_id: Uuid },

    /// The open drawer kept being filled by concurrent writers; the
    /// bounded internal retry gave up.
    #[error("Could not append notification {notification_id} after {attempts} attempts")]
    DrawerContention {
        notification_id: Uuid,
        attempts: u32,
    },

    /// The notification failed basic field validation (for example a
    /// non-positive weight).
    #[error("Invalid notification {notification_id}: {reason}")]
    InvalidNotification {
        notification_id: Uuid,
        reason: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Fatal faults in the content broker's channel.
///
/// A timeout or a sub-domain error reply is *not* a `BrokerError`: the
/// broker reports those as `None` ("not ready yet") because a client
/// re-peek is always valid. Only a broken channel surfaces here.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The underlying message channel refused the send or closed.
    #[error("Message channel failure: {0}")]
    Channel(String),

    /// A request or reply payload could not be (de)serialized.
    #[error("Broker payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building a [`crate::config::PostOfficeConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max drawer size: {size} (must be positive)")]
    InvalidMaxDrawerSize { size: i32 },

    #[error("Invalid weight bound for {origin}: {bound} (must be positive)")]
    InvalidWeightBound { origin: String, bound: i32 },

    #[error("Invalid append retry limit: {attempts} (must be positive)")]
    InvalidAppendRetries { attempts: u32 },
}
