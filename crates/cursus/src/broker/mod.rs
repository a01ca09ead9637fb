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

//! Content request/reply correlation with sub-domains.
//!
//! A bundle announces *that* data exists; the payload is owned by the
//! producing sub-domain and requested lazily. The broker sends a content
//! request on the sub-domain's queue and awaits a reply correlated by
//! the bundle id, bounded by a timeout.
//!
//! Timeouts and sub-domain error replies are both "not ready yet": the
//! broker returns `None`, the bundle stays in its created state, and the
//! next peek retries. Only a broken channel is an error.
//!
//! The wire transport is a capability seam ([`MessageChannel`]): the
//! core needs "send to a named queue" and "receive a correlated reply",
//! nothing more. An in-memory implementation backs tests and
//! same-process sub-domains; a Kafka implementation is available behind
//! the `kafka` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::BrokerError;
use crate::models::bundle::{Bundle, ResponseFormat};

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use memory::InMemoryChannel;

/// The queue replies from sub-domains arrive on.
pub const REPLY_QUEUE: &str = "post-office-content-replies";

/// Minimal message-transport capabilities the broker needs.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Sends a message to a named queue.
    async fn send(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Awaits the message correlated with `correlation_id` on the reply
    /// queue. Returns `Ok(None)` when the timeout elapses first.
    async fn receive(
        &self,
        reply_queue: &str,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError>;
}

/// A content request sent to the owning sub-domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    /// The bundle id; replies are correlated on this.
    pub correlation_id: String,
    pub content_type: String,
    pub response_format: ResponseFormat,
    pub response_version: i32,
}

/// Why a sub-domain could not produce content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentErrorReason {
    DatasetNotFound,
    DatasetNotAvailable,
    InternalError,
}

/// A sub-domain's answer to a content request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContentReply {
    /// Content is ready at the given URI.
    Success { content_uri: String },
    /// The sub-domain could not produce the content.
    Error {
        reason: ContentErrorReason,
        description: String,
    },
}

/// Requests bundle content from producing sub-domains.
#[derive(Clone)]
pub struct ContentBroker {
    channel: Arc<dyn MessageChannel>,
    timeout: Duration,
}

impl ContentBroker {
    pub fn new(channel: Arc<dyn MessageChannel>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    /// Sends a content request for the bundle and awaits the correlated
    /// reply.
    ///
    /// Returns the content URI on success, or `None` when the sub-domain
    /// timed out or answered with an application error; the caller
    /// leaves the bundle re-triable either way. No store-side state is
    /// held while waiting.
    pub async fn request_content(
        &self,
        bundle: &Bundle,
        response_format: ResponseFormat,
        response_version: i32,
    ) -> Result<Option<String>, BrokerError> {
        let correlation_id = bundle.id.to_storage();
        let request = ContentRequest {
            correlation_id: correlation_id.clone(),
            content_type: bundle.content_type.clone(),
            response_format,
            response_version,
        };
        let payload = serde_json::to_vec(&request)?;

        let queue = bundle.origin.content_queue();
        debug!(
            bundle_id = %bundle.id,
            queue = %queue,
            content_type = %bundle.content_type,
            "Requesting bundle content"
        );
        self.channel.send(&queue, payload).await?;

        let reply = self
            .channel
            .receive(REPLY_QUEUE, &correlation_id, self.timeout)
            .await?;

        match reply {
            None => {
                warn!(
                    bundle_id = %bundle.id,
                    origin = %bundle.origin,
                    timeout_secs = self.timeout.as_secs(),
                    "Content request timed out; bundle stays re-triable"
                );
                Ok(None)
            }
            Some(bytes) => match serde_json::from_slice::<ContentReply>(&bytes)? {
                ContentReply::Success { content_uri } => {
                    debug!(bundle_id = %bundle.id, "Content reply received");
                    Ok(Some(content_uri))
                }
                ContentReply::Error {
                    reason,
                    description,
                } => {
                    warn!(
                        bundle_id = %bundle.id,
                        origin = %bundle.origin,
                        reason = ?reason,
                        description = %description,
                        "Sub-domain reported a content error; bundle stays re-triable"
                    );
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
    use crate::models::bundle::DomainGroup;
    use crate::models::notification::SubDomain;

    fn bundle() -> Bundle {
        Bundle {
            id: UniversalUuid::new_v4(),
            recipient: "5790000000001".into(),
            origin: SubDomain::TimeSeries,
            domain_group: DomainGroup::TimeSeries,
            content_type: "RSM-012".into(),
            notification_ids: vec![UniversalUuid::new_v4()],
            document_types: vec!["MeteredDataTimeSeries".into()],
            response_format: ResponseFormat::Xml,
            response_version: 1,
            dequeued: false,
            content_reference: None,
            notifications_archived: false,
            created_at: UniversalTimestamp::now(),
            dequeued_at: None,
        }
    }

    #[tokio::test]
    async fn test_success_reply_yields_content_uri() {
        let channel = InMemoryChannel::new();
        let broker = ContentBroker::new(Arc::new(channel.clone()), Duration::from_secs(1));
        let bundle = bundle();

        let reply = ContentReply::Success {
            content_uri: "https://content/abc".into(),
        };
        channel.post_reply(
            REPLY_QUEUE,
            &bundle.id.to_storage(),
            serde_json::to_vec(&reply).unwrap(),
        );

        let content = broker
            .request_content(&bundle, ResponseFormat::Xml, 1)
            .await
            .unwrap();
        assert_eq!(content.as_deref(), Some("https://content/abc"));

        // The request landed on the origin's queue with the right fields.
        let sent = channel
            .take_request("timeseries-content-requests")
            .expect("request was sent");
        let request: ContentRequest = serde_json::from_slice(&sent).unwrap();
        assert_eq!(request.correlation_id, bundle.id.to_storage());
        assert_eq!(request.content_type, "RSM-012");
    }

    #[tokio::test]
    async fn test_error_reply_is_not_ready_yet() {
        let channel = InMemoryChannel::new();
        let broker = ContentBroker::new(Arc::new(channel.clone()), Duration::from_secs(1));
        let bundle = bundle();

        let reply = ContentReply::Error {
            reason: ContentErrorReason::DatasetNotAvailable,
            description: "still aggregating".into(),
        };
        channel.post_reply(
            REPLY_QUEUE,
            &bundle.id.to_storage(),
            serde_json::to_vec(&reply).unwrap(),
        );

        let content = broker
            .request_content(&bundle, ResponseFormat::Xml, 1)
            .await
            .unwrap();
        assert!(content.is_none());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_timeout_is_not_ready_yet() {
        let channel = InMemoryChannel::new();
        let broker = ContentBroker::new(Arc::new(channel.clone()), Duration::from_millis(20));
        let bundle = bundle();

        let content = broker
            .request_content(&bundle, ResponseFormat::Xml, 1)
            .await
            .unwrap();
        assert!(content.is_none());
        assert!(logs_contain("Content request timed out"));
    }

    #[test]
    fn test_reply_wire_shape() {
        let reply = ContentReply::Error {
            reason: ContentErrorReason::DatasetNotFound,
            description: "unknown dataset".into(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("\"outcome\":\"error\""));
        assert!(json.contains("DatasetNotFound"));

        let back: ContentReply = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ContentReply::Error { .. }));
    }
}
