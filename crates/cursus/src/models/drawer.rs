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

//! Cabinet drawers: bounded pages of a cabinet's notification log.
//!
//! A drawer fills up to a configured maximum item count and is then
//! sealed; new notifications start a new drawer. Paging bounds query
//! cost and lets cleanup reclaim a whole page once it is consumed and
//! aged out.

use serde::{Deserialize, Serialize};

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::notification::CabinetKey;

/// One page of a cabinet's notification log (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawer {
    pub id: UniversalUuid,
    pub cabinet: CabinetKey,
    /// Number of notifications written against this drawer
    /// (0..=max_drawer_size). The append path advances this with a
    /// conditional update; losing the race is a retriable conflict.
    pub position: i32,
    pub created_at: UniversalTimestamp,
}

impl Drawer {
    /// Whether this drawer has reached the given capacity and is sealed.
    pub fn is_full(&self, max_drawer_size: i32) -> bool {
        self.position >= max_drawer_size
    }
}
