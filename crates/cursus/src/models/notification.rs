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

//! Notifications and the cabinet partitioning they are stored under.
//!
//! A notification is a sub-domain's announcement that data exists for a
//! recipient. It never carries the payload; the payload is requested from
//! the owning sub-domain only when a bundle containing the notification
//! is peeked.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::actor::ActorId;

/// The sub-domain a notification originates from.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SubDomain {
    TimeSeries,
    Charges,
    MarketRoles,
    MeteringPoints,
    Wholesale,
    Aggregations,
}

impl SubDomain {
    /// Storage and wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubDomain::TimeSeries => "TimeSeries",
            SubDomain::Charges => "Charges",
            SubDomain::MarketRoles => "MarketRoles",
            SubDomain::MeteringPoints => "MeteringPoints",
            SubDomain::Wholesale => "Wholesale",
            SubDomain::Aggregations => "Aggregations",
        }
    }

    /// All sub-domains, in declaration order.
    pub const ALL: [SubDomain; 6] = [
        SubDomain::TimeSeries,
        SubDomain::Charges,
        SubDomain::MarketRoles,
        SubDomain::MeteringPoints,
        SubDomain::Wholesale,
        SubDomain::Aggregations,
    ];

    /// The name of the queue this sub-domain answers content requests on.
    pub fn content_queue(&self) -> String {
        format!("{}-content-requests", self.as_str().to_lowercase())
    }
}

impl fmt::Display for SubDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TimeSeries" => Ok(SubDomain::TimeSeries),
            "Charges" => Ok(SubDomain::Charges),
            "MarketRoles" => Ok(SubDomain::MarketRoles),
            "MeteringPoints" => Ok(SubDomain::MeteringPoints),
            "Wholesale" => Ok(SubDomain::Wholesale),
            "Aggregations" => Ok(SubDomain::Aggregations),
            other => Err(format!("Unknown sub-domain '{}'", other)),
        }
    }
}

/// The partition one logical queue of notifications lives under:
/// (recipient, origin, content type).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CabinetKey {
    /// Canonical storage key of the recipient actor.
    pub recipient: String,
    pub origin: SubDomain,
    pub content_type: String,
}

impl CabinetKey {
    pub fn new(recipient: &ActorId, origin: SubDomain, content_type: impl Into<String>) -> Self {
        Self {
            recipient: recipient.storage_key(),
            origin,
            content_type: content_type.into(),
        }
    }
}

impl fmt::Display for CabinetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.recipient, self.origin, self.content_type)
    }
}

/// A stored notification (domain type). Immutable once written; the
/// acknowledged flag is the only field that ever changes, and only from
/// false to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: UniversalUuid,
    /// Canonical storage key of the recipient actor.
    pub recipient: String,
    pub origin: SubDomain,
    pub content_type: String,
    /// Free-form document type shown to the client in bundle metadata.
    pub document_type: String,
    pub supports_bundling: bool,
    /// Positive packing cost.
    pub weight: i32,
    /// Monotonic per ingestion stream; orders notifications within a page.
    pub sequence_number: i64,
    pub drawer_id: UniversalUuid,
    pub acknowledged: bool,
    pub created_at: UniversalTimestamp,
}

impl Notification {
    pub fn cabinet_key(&self) -> CabinetKey {
        CabinetKey {
            recipient: self.recipient.clone(),
            origin: self.origin,
            content_type: self.content_type.clone(),
        }
    }
}

/// An incoming notification prior to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub id: UniversalUuid,
    pub recipient: ActorId,
    pub origin: SubDomain,
    pub content_type: String,
    pub document_type: String,
    pub supports_bundling: bool,
    pub weight: i32,
    pub sequence_number: i64,
}

impl NewNotification {
    pub fn cabinet_key(&self) -> CabinetKey {
        CabinetKey::new(&self.recipient, self.origin, self.content_type.clone())
    }
}
