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

//! In-memory message channel.
//!
//! Backs tests and deployments where sub-domains run in the same
//! process. Requests pile up per queue; replies are keyed by
//! (queue, correlation id) and waiters are woken through a notify
//! handle.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::MessageChannel;
use crate::error::BrokerError;

#[derive(Default)]
struct ChannelState {
    /// Messages sent to each queue, oldest first.
    sent: HashMap<String, VecDeque<Vec<u8>>>,
    /// Replies by (reply queue, correlation id).
    replies: HashMap<(String, String), Vec<u8>>,
}

/// A process-local [`MessageChannel`].
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<Mutex<ChannelState>>,
    notify: Arc<Notify>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest message sent to a queue. Test sub-domains use
    /// this to consume requests.
    pub fn take_request(&self, queue: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.sent.get_mut(queue).and_then(|q| q.pop_front())
    }

    /// Posts a reply for a correlation id and wakes any waiter.
    pub fn post_reply(&self, reply_queue: &str, correlation_id: &str, payload: Vec<u8>) {
        {
            let mut state = self.state.lock();
            state
                .replies
                .insert((reply_queue.to_string(), correlation_id.to_string()), payload);
        }
        self.notify.notify_waiters();
    }

    fn take_reply(&self, reply_queue: &str, correlation_id: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state
            .replies
            .remove(&(reply_queue.to_string(), correlation_id.to_string()))
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn send(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state
            .sent
            .entry(queue.to_string())
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn receive(
        &self,
        reply_queue: &str,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let deadline = Instant::now() + timeout;

        loop {
            // Subscribe before checking, so a reply posted between the
            // check and the wait still wakes us.
            let notified = self.notify.notified();

            if let Some(payload) = self.take_reply(reply_queue, correlation_id) {
                return Ok(Some(payload));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
