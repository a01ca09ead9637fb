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

//! Domain types for the post-office engine.
//!
//! These are plain data structures used by business logic and at the API
//! boundary. Database-facing models live in the DAL and are converted
//! to/from these types at that boundary.

pub mod actor;
pub mod bundle;
pub mod drawer;
pub mod idempotency;
pub mod notification;

pub use actor::{ActorId, GlnNumber, Recipient};
pub use bundle::{Bundle, BundleStatus, DomainGroup, DomainGroupSelector, NewBundle, ResponseFormat};
pub use drawer::Drawer;
pub use idempotency::{content_fingerprint, IdempotencyRecord};
pub use notification::{CabinetKey, NewNotification, Notification, SubDomain};
