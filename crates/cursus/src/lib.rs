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

//! # cursus
//!
//! The post office of an energy-market data hub. Sub-domains announce
//! that data exists for a market-operator recipient; operators peek
//! weight-bounded bundles of those notifications and dequeue them once
//! received; payloads are fetched lazily from the producing sub-domain.
//!
//! The engine guarantees:
//!
//! - **Idempotent ingestion**: redelivering a notification id with
//!   identical content stores nothing new; redelivering it with
//!   different content is rejected as a data-integrity fault.
//! - **Single active bundle**: per recipient and domain group, at most
//!   one unacknowledged bundle exists, enforced by the store so that
//!   peeks racing across processes stay consistent.
//! - **Safe polling**: "nothing pending", "lost a race" and "content
//!   not ready yet" are ordinary outcomes, never errors.
//!
//! Storage runs on PostgreSQL or SQLite (selected at runtime from the
//! connection URL); content requests travel over a pluggable message
//! channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cursus::broker::InMemoryChannel;
//! use cursus::config::PostOfficeConfig;
//! use cursus::dal::DAL;
//! use cursus::database::Database;
//! use cursus::service::{PeekRequest, PostOffice};
//!
//! let database = Database::new("post_office.db", "", 1);
//! database.run_migrations().await?;
//!
//! let config = PostOfficeConfig::default();
//! let post_office = PostOffice::new(
//!     DAL::new(database),
//!     config,
//!     Arc::new(InMemoryChannel::new()),
//! );
//!
//! let outcome = post_office.peek(request).await?;
//! ```

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("At least one of the `postgres` or `sqlite` features must be enabled");

pub mod broker;
pub mod cabinet;
pub mod cleanup;
pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod intake;
pub mod models;
pub mod packer;
pub mod service;

pub use broker::{ContentBroker, InMemoryChannel, MessageChannel};
pub use cabinet::{CabinetReader, NotificationReader};
pub use cleanup::CleanupService;
pub use config::{PostOfficeConfig, WeightPolicy};
pub use dal::DAL;
pub use database::Database;
pub use error::{BrokerError, ConfigError, DequeueError, IngestError, PeekError, StorageError};
pub use intake::{IngestionService, InMemoryDeadLetters};
pub use models::{
    ActorId, Bundle, DomainGroup, DomainGroupSelector, NewNotification, Notification, Recipient,
    ResponseFormat, SubDomain,
};
pub use service::{PeekOutcome, PeekRequest, PostOffice};
