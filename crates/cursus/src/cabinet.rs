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

//! Sequential readers over a cabinet's pending notifications.
//!
//! A reader walks drawers oldest first and loads one page at a time, so
//! query cost stays bounded by the drawer size regardless of backlog.
//! The peek/take split lets the packer decide to stop *before* consuming
//! a notification that would overflow the weight budget.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::dal::DAL;
use crate::error::StorageError;
use crate::models::drawer::Drawer;
use crate::models::notification::{CabinetKey, Notification};

/// Position-ordered access to pending notifications.
///
/// `peek` is non-consuming look-ahead; `take` consumes and advances.
/// Implementations must yield notifications oldest first, ties broken by
/// sequence number ascending.
#[async_trait]
pub trait NotificationReader {
    /// The next notification, without consuming it.
    fn peek(&self) -> Option<&Notification>;

    /// Whether another notification is available.
    fn can_peek(&self) -> bool {
        self.peek().is_some()
    }

    /// Consumes and returns the next notification, or `None` when the
    /// reader is drained.
    async fn take(&mut self) -> Result<Option<Notification>, StorageError>;
}

/// A [`NotificationReader`] over one cabinet's drawers.
pub struct CabinetReader<'a> {
    dal: &'a DAL,
    cabinet: CabinetKey,
    /// Drawers not yet paged in, oldest first.
    drawers: VecDeque<Drawer>,
    /// The current page's remaining notifications.
    buffer: VecDeque<Notification>,
}

impl<'a> CabinetReader<'a> {
    /// Opens a reader over the cabinet's pending notifications.
    ///
    /// Returns `None` when nothing is pending, so callers distinguish
    /// "no data" from "reader with data" up front.
    pub async fn open(dal: &'a DAL, cabinet: CabinetKey) -> Result<Option<Self>, StorageError> {
        let drawers = dal.drawer().list_for_cabinet(&cabinet).await?;
        let mut reader = Self {
            dal,
            cabinet,
            drawers: drawers.into(),
            buffer: VecDeque::new(),
        };
        reader.refill().await?;
        if reader.buffer.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reader))
        }
    }

    /// The cabinet this reader serves.
    pub fn cabinet(&self) -> &CabinetKey {
        &self.cabinet
    }

    /// Pages in the next non-empty drawer, if any.
    async fn refill(&mut self) -> Result<(), StorageError> {
        while self.buffer.is_empty() {
            let Some(drawer) = self.drawers.pop_front() else {
                return Ok(());
            };
            let page = self.dal.notification().pending_page(drawer.id).await?;
            self.buffer = page.into();
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> NotificationReader for CabinetReader<'a> {
    fn peek(&self) -> Option<&Notification> {
        self.buffer.front()
    }

    async fn take(&mut self) -> Result<Option<Notification>, StorageError> {
        let next = self.buffer.pop_front();
        if next.is_some() {
            // Keep the look-ahead invariant: peek() is only empty when
            // the cabinet is drained.
            self.refill().await?;
        }
        Ok(next)
    }
}

/// An in-memory reader over a fixed sequence. Used by tests and by
/// callers that already hold the notifications.
pub struct VecReader {
    buffer: VecDeque<Notification>,
}

impl VecReader {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            buffer: notifications.into(),
        }
    }
}

#[async_trait]
impl NotificationReader for VecReader {
    fn peek(&self) -> Option<&Notification> {
        self.buffer.front()
    }

    async fn take(&mut self) -> Result<Option<Notification>, StorageError> {
        Ok(self.buffer.pop_front())
    }
}
