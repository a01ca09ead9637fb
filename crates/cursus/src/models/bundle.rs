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

//! Bundles: batches of notifications offered to a market operator as one
//! unit of work.
//!
//! A bundle moves through a monotonic state machine:
//!
//! ```text
//! Created ──▶ ContentAssigned ──▶ Dequeued ──▶ Archived
//! ```
//!
//! `Created` may persist across multiple peek calls: content assignment
//! can time out and is retried on the next peek. No transition moves
//! backward.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::notification::SubDomain;

/// The logical notification group a bundle is built from and the unit
/// the single-active-bundle invariant applies to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DomainGroup {
    TimeSeries,
    Aggregations,
    /// Master data: charges, market roles, metering points and wholesale
    /// results share one logical queue.
    MasterData,
}

impl DomainGroup {
    /// Storage and wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainGroup::TimeSeries => "TimeSeries",
            DomainGroup::Aggregations => "Aggregations",
            DomainGroup::MasterData => "MasterData",
        }
    }

    /// The sub-domains whose notifications belong to this group.
    pub fn members(&self) -> &'static [SubDomain] {
        match self {
            DomainGroup::TimeSeries => &[SubDomain::TimeSeries],
            DomainGroup::Aggregations => &[SubDomain::Aggregations],
            DomainGroup::MasterData => &[
                SubDomain::Charges,
                SubDomain::MarketRoles,
                SubDomain::MeteringPoints,
                SubDomain::Wholesale,
            ],
        }
    }

    /// The group a sub-domain's notifications are bundled under.
    pub fn of(origin: SubDomain) -> DomainGroup {
        match origin {
            SubDomain::TimeSeries => DomainGroup::TimeSeries,
            SubDomain::Aggregations => DomainGroup::Aggregations,
            SubDomain::Charges
            | SubDomain::MarketRoles
            | SubDomain::MeteringPoints
            | SubDomain::Wholesale => DomainGroup::MasterData,
        }
    }

    /// The order groups are tried for an unrestricted peek: the first
    /// group with pending data wins.
    pub const fn priority_order() -> [DomainGroup; 3] {
        [
            DomainGroup::TimeSeries,
            DomainGroup::Aggregations,
            DomainGroup::MasterData,
        ]
    }
}

impl fmt::Display for DomainGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TimeSeries" => Ok(DomainGroup::TimeSeries),
            "Aggregations" => Ok(DomainGroup::Aggregations),
            "MasterData" => Ok(DomainGroup::MasterData),
            other => Err(format!("Unknown domain group '{}'", other)),
        }
    }
}

/// What a peek call is allowed to serve.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DomainGroupSelector {
    TimeSeries,
    Aggregations,
    MasterData,
    /// Any group, tried in [`DomainGroup::priority_order`].
    Unrestricted,
}

impl DomainGroupSelector {
    /// The candidate groups for this selector, in the order they are
    /// tried.
    pub fn candidates(&self) -> Vec<DomainGroup> {
        match self {
            DomainGroupSelector::TimeSeries => vec![DomainGroup::TimeSeries],
            DomainGroupSelector::Aggregations => vec![DomainGroup::Aggregations],
            DomainGroupSelector::MasterData => vec![DomainGroup::MasterData],
            DomainGroupSelector::Unrestricted => DomainGroup::priority_order().to_vec(),
        }
    }
}

/// The serialization format a bundle's content is requested in.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Xml,
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Xml => "Xml",
            ResponseFormat::Json => "Json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Xml" => Ok(ResponseFormat::Xml),
            "Json" => Ok(ResponseFormat::Json),
            other => Err(format!("Unknown response format '{}'", other)),
        }
    }
}

/// Where a bundle sits in its lifecycle.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum BundleStatus {
    Created,
    ContentAssigned,
    Dequeued,
    Archived,
}

/// A stored bundle (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub id: UniversalUuid,
    /// Canonical storage key of the recipient actor.
    pub recipient: String,
    pub origin: SubDomain,
    pub domain_group: DomainGroup,
    pub content_type: String,
    /// Constituent notification ids, in packing order.
    pub notification_ids: Vec<UniversalUuid>,
    /// Distinct document types, for client-facing metadata.
    pub document_types: Vec<String>,
    pub response_format: ResponseFormat,
    pub response_version: i32,
    pub dequeued: bool,
    /// Set once the owning sub-domain has answered a content request.
    pub content_reference: Option<String>,
    pub notifications_archived: bool,
    pub created_at: UniversalTimestamp,
    pub dequeued_at: Option<UniversalTimestamp>,
}

impl Bundle {
    /// Derives the lifecycle state from the stored flags.
    pub fn status(&self) -> BundleStatus {
        if self.notifications_archived {
            BundleStatus::Archived
        } else if self.dequeued {
            BundleStatus::Dequeued
        } else if self.content_reference.is_some() {
            BundleStatus::ContentAssigned
        } else {
            BundleStatus::Created
        }
    }
}

/// A bundle prior to its atomic creation in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBundle {
    /// Client-suggested or freshly generated id.
    pub id: UniversalUuid,
    pub recipient: String,
    pub origin: SubDomain,
    pub content_type: String,
    pub notification_ids: Vec<UniversalUuid>,
    pub document_types: Vec<String>,
    pub response_format: ResponseFormat,
    pub response_version: i32,
}

impl NewBundle {
    pub fn domain_group(&self) -> DomainGroup {
        DomainGroup::of(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sub_domain_has_a_group() {
        for origin in SubDomain::ALL {
            let group = DomainGroup::of(origin);
            assert!(group.members().contains(&origin));
        }
    }

    #[test]
    fn test_unrestricted_priority_order() {
        let candidates = DomainGroupSelector::Unrestricted.candidates();
        assert_eq!(
            candidates,
            vec![
                DomainGroup::TimeSeries,
                DomainGroup::Aggregations,
                DomainGroup::MasterData
            ]
        );
    }

    #[test]
    fn test_status_derivation() {
        let mut bundle = Bundle {
            id: UniversalUuid::new_v4(),
            recipient: "5790000000001".into(),
            origin: SubDomain::TimeSeries,
            domain_group: DomainGroup::TimeSeries,
            content_type: "RSM-012".into(),
            notification_ids: vec![UniversalUuid::new_v4()],
            document_types: vec!["RSM-012".into()],
            response_format: ResponseFormat::Xml,
            response_version: 1,
            dequeued: false,
            content_reference: None,
            notifications_archived: false,
            created_at: UniversalTimestamp::now(),
            dequeued_at: None,
        };
        assert_eq!(bundle.status(), BundleStatus::Created);

        bundle.content_reference = Some("https://content/1".into());
        assert_eq!(bundle.status(), BundleStatus::ContentAssigned);

        bundle.dequeued = true;
        assert_eq!(bundle.status(), BundleStatus::Dequeued);

        bundle.notifications_archived = true;
        assert_eq!(bundle.status(), BundleStatus::Archived);
    }
}
