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

//! Kafka-backed message channel.
//!
//! Requests are produced to the sub-domain's topic with the correlation
//! id as the record key; replies are consumed from the reply topic and
//! matched on the same key. Receives are serialized through a mutex:
//! the consumer is a single stream, and the orchestrator issues at most
//! one content wait per bundle anyway. Records for other correlations
//! observed while waiting are skipped; their waiters re-request on the
//! next peek, which is always safe.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use rdkafka::Message;

use super::MessageChannel;
use crate::error::BrokerError;

/// A [`MessageChannel`] over Kafka topics.
pub struct KafkaChannel {
    producer: FutureProducer,
    consumer: Mutex<StreamConsumer>,
    send_timeout: Duration,
}

impl KafkaChannel {
    /// Connects to the brokers and subscribes to the reply topic.
    pub fn new(
        brokers: &str,
        group_id: &str,
        reply_topic: &str,
    ) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        consumer
            .subscribe(&[reply_topic])
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        Ok(Self {
            producer,
            consumer: Mutex::new(consumer),
            send_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn send(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        // The request's correlation id travels in the payload; replies
        // carry it as the record key, set by the answering sub-domain.
        let record: FutureRecord<'_, (), Vec<u8>> = FutureRecord::to(queue).payload(&payload);
        self.producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(e, _)| BrokerError::Channel(e.to_string()))?;
        Ok(())
    }

    async fn receive(
        &self,
        _reply_queue: &str,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let consumer = self.consumer.lock().await;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let message = match tokio::time::timeout(remaining, consumer.recv()).await {
                Err(_) => return Ok(None),
                Ok(Err(e)) => return Err(BrokerError::Channel(e.to_string())),
                Ok(Ok(message)) => message,
            };

            let matches = message
                .key()
                .map(|key| key == correlation_id.as_bytes())
                .unwrap_or(false);
            if !matches {
                debug!("Skipping reply for another correlation id");
                continue;
            }

            return Ok(message.payload().map(|p| p.to_vec()));
        }
    }
}
