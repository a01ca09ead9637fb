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

//! Market-actor identity.
//!
//! The hub is mid-migration between two identity schemes: the legacy
//! GLN-based actor number and the new GUID-based actor id. Rather than a
//! subclass hierarchy, identity is a tagged union with an explicit
//! resolution order: repositories look up the new-style id first, then
//! fall back to the legacy number.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::universal_types::UniversalUuid;

/// A legacy GS1 Global Location Number: exactly 13 digits.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct GlnNumber(String);

impl GlnNumber {
    /// Validates and wraps a GLN. Returns `None` unless the input is
    /// exactly 13 ASCII digits.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.len() == 13 && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlnNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A market-actor identifier in either identity scheme.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ActorId {
    /// New-style GUID actor id.
    Guid(UniversalUuid),
    /// Legacy GLN actor number.
    LegacyGln(GlnNumber),
}

impl ActorId {
    /// The canonical TEXT form this identity is stored under.
    pub fn storage_key(&self) -> String {
        match self {
            ActorId::Guid(id) => id.to_storage(),
            ActorId::LegacyGln(gln) => gln.as_str().to_string(),
        }
    }

    /// Parses a stored key back into an identity. GUID forms win; a
    /// 13-digit string is treated as a legacy GLN.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(id) = UniversalUuid::parse(s) {
            return Some(ActorId::Guid(id));
        }
        GlnNumber::new(s).map(ActorId::LegacyGln)
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, ActorId::LegacyGln(_))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Guid(id) => write!(f, "{}", id),
            ActorId::LegacyGln(gln) => write!(f, "{}", gln),
        }
    }
}

/// A recipient as seen by peek/dequeue: a primary identity plus the
/// legacy identity the same actor may still have data stored under.
///
/// Lookups resolve in declaration order: the new-style id first, then
/// the legacy one. Data ingested before the identity migration stays
/// reachable without a registry round trip.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: ActorId,
    pub legacy_id: Option<ActorId>,
}

impl Recipient {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            legacy_id: None,
        }
    }

    pub fn with_legacy(id: ActorId, legacy_id: ActorId) -> Self {
        Self {
            id,
            legacy_id: Some(legacy_id),
        }
    }

    /// Storage keys to try, in resolution order. The primary key always
    /// comes first; a legacy key identical to the primary is skipped.
    pub fn lookup_keys(&self) -> Vec<String> {
        let primary = self.id.storage_key();
        let mut keys = vec![primary.clone()];
        if let Some(legacy) = &self.legacy_id {
            let key = legacy.storage_key();
            if key != primary {
                keys.push(key);
            }
        }
        keys
    }

    /// The key new writes (bundles, acknowledgments) are recorded under.
    pub fn primary_key(&self) -> String {
        self.id.storage_key()
    }
}

impl From<ActorId> for Recipient {
    fn from(id: ActorId) -> Self {
        Recipient::new(id)
    }
}
