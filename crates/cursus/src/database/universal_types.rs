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

//! Universal type wrappers for cross-database compatibility.
//!
//! Domain code works with `UniversalUuid` and `UniversalTimestamp`;
//! database models use portable column representations (TEXT uuids and
//! native TIMESTAMP columns) that both PostgreSQL and SQLite accept, and
//! the DAL converts at its boundary. This keeps Diesel-specific concerns
//! out of the domain types entirely.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Universal UUID wrapper.
///
/// A domain type around `uuid::Uuid`. Stored as its canonical hyphenated
/// TEXT form in both backends.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UniversalUuid(pub Uuid);

impl UniversalUuid {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Canonical TEXT form used as the storage representation.
    pub fn to_storage(&self) -> String {
        self.0.to_string()
    }

    /// Parse from the stored TEXT form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(UniversalUuid)
    }
}

impl fmt::Display for UniversalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UniversalUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<UniversalUuid> for Uuid {
    fn from(wrapper: UniversalUuid) -> Self {
        wrapper.0
    }
}

impl From<&UniversalUuid> for Uuid {
    fn from(wrapper: &UniversalUuid) -> Self {
        wrapper.0
    }
}

/// Universal timestamp wrapper.
///
/// A domain type around `DateTime<Utc>`. Stored as a naive UTC TIMESTAMP
/// in both backends.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UniversalTimestamp(pub DateTime<Utc>);

impl UniversalTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Convert to a naive UTC value for TIMESTAMP storage.
    pub fn to_naive(&self) -> NaiveDateTime {
        self.0.naive_utc()
    }

    /// Create from a stored naive UTC TIMESTAMP.
    pub fn from_naive(naive: NaiveDateTime) -> Self {
        UniversalTimestamp(Utc.from_utc_datetime(&naive))
    }
}

impl fmt::Display for UniversalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for UniversalTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<UniversalTimestamp> for DateTime<Utc> {
    fn from(wrapper: UniversalTimestamp) -> Self {
        wrapper.0
    }
}

impl From<NaiveDateTime> for UniversalTimestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Self::from_naive(naive)
    }
}

/// Helper function for current timestamp
pub fn current_timestamp() -> UniversalTimestamp {
    UniversalTimestamp::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universal_uuid_roundtrip() {
        let uuid = UniversalUuid::new_v4();
        let stored = uuid.to_storage();
        let back = UniversalUuid::parse(&stored).unwrap();
        assert_eq!(uuid, back);

        let std_uuid = Uuid::new_v4();
        let universal = UniversalUuid::from(std_uuid);
        let back: Uuid = universal.into();
        assert_eq!(std_uuid, back);
    }

    #[test]
    fn test_universal_uuid_rejects_garbage() {
        assert!(UniversalUuid::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_universal_timestamp_naive_roundtrip() {
        let ts = UniversalTimestamp::now();
        let naive = ts.to_naive();
        let back = UniversalTimestamp::from_naive(naive);
        assert_eq!(ts.0.timestamp_micros(), back.0.timestamp_micros());
    }

    #[test]
    fn test_universal_timestamp_ordering() {
        let earlier = UniversalTimestamp::now();
        let later = UniversalTimestamp(earlier.0 + chrono::Duration::seconds(5));
        assert!(earlier < later);
    }
}
