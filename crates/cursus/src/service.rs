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

//! The peek/dequeue orchestrator.
//!
//! Peek either serves the recipient's in-flight bundle or builds one:
//! domain groups are tried in priority order, the first with pending
//! data wins, the packer selects a weight-bounded prefix and the store
//! commits it atomically. Dequeue acknowledges a bundle, consumes its
//! notifications and archives them.
//!
//! Everything transient (nothing pending, a lost creation race, content
//! not ready) is an outcome, not an error, so operators can poll
//! safely.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::broker::{ContentBroker, MessageChannel};
use crate::cabinet::CabinetReader;
use crate::config::PostOfficeConfig;
use crate::dal::{TryCreateOutcome, DAL};
use crate::database::universal_types::UniversalUuid;
use crate::error::{DequeueError, PeekError, StorageError};
use crate::models::actor::Recipient;
use crate::models::bundle::{Bundle, DomainGroupSelector, NewBundle, ResponseFormat};
use crate::packer;

/// A market operator's peek call.
#[derive(Debug, Clone)]
pub struct PeekRequest {
    pub recipient: Recipient,
    /// Client-suggested bundle id; must match the active bundle if one
    /// is in flight.
    pub suggested_bundle_id: Option<UniversalUuid>,
    pub domain_group: DomainGroupSelector,
    pub response_format: ResponseFormat,
    pub response_version: i32,
}

/// What a peek produced.
#[derive(Debug, Clone)]
pub enum PeekOutcome {
    /// Nothing pending anywhere the selector allows, or a concurrent
    /// peek won the creation race and its bundle will be served instead.
    NoContent,
    /// A bundle is in flight but its content is not ready yet; peeking
    /// again later is safe and keeps the client's place.
    Pending { bundle: Bundle },
    /// A bundle with content.
    Ready {
        bundle: Bundle,
        content_reference: String,
    },
}

impl PeekOutcome {
    pub fn has_content(&self) -> bool {
        matches!(self, PeekOutcome::Ready { .. })
    }

    pub fn bundle_id(&self) -> Option<UniversalUuid> {
        match self {
            PeekOutcome::NoContent => None,
            PeekOutcome::Pending { bundle } | PeekOutcome::Ready { bundle, .. } => Some(bundle.id),
        }
    }
}

/// The post office: bundling and dequeue consistency engine.
#[derive(Clone)]
pub struct PostOffice {
    dal: DAL,
    config: PostOfficeConfig,
    broker: ContentBroker,
}

impl PostOffice {
    pub fn new(dal: DAL, config: PostOfficeConfig, channel: Arc<dyn MessageChannel>) -> Self {
        let broker = ContentBroker::new(channel, config.content_timeout());
        Self {
            dal,
            config,
            broker,
        }
    }

    /// Retrieves (without consuming) the next bundle for the recipient.
    pub async fn peek(&self, request: PeekRequest) -> Result<PeekOutcome, PeekError> {
        let keys = request.recipient.lookup_keys();
        let groups = request.domain_group.candidates();

        // Serve the in-flight bundle if one exists; at most one per
        // group, picked in priority order.
        let active = self.dal.bundle().get_active(&keys, &groups).await?;
        let active = groups
            .iter()
            .find_map(|group| active.iter().find(|b| b.domain_group == *group))
            .cloned();

        if let Some(bundle) = active {
            if let Some(suggested) = request.suggested_bundle_id {
                if suggested != bundle.id {
                    return Err(PeekError::BundleIdMismatch {
                        suggested: suggested.as_uuid(),
                        active: bundle.id.as_uuid(),
                    });
                }
            }
            if bundle.response_format != request.response_format {
                return Err(PeekError::ResponseFormatMismatch {
                    requested: request.response_format.to_string(),
                    active: bundle.response_format.to_string(),
                });
            }
            debug!(
                recipient = %request.recipient.id,
                bundle_id = %bundle.id,
                "Serving in-flight bundle"
            );
            return self
                .resolve_content(bundle, request.response_format, request.response_version)
                .await;
        }

        // No bundle in flight: the first domain with pending data wins.
        for group in &groups {
            for origin in group.members() {
                let Some(cabinet) = self
                    .dal
                    .notification()
                    .first_pending_cabinet(&keys, *origin)
                    .await?
                else {
                    continue;
                };

                let Some(mut reader) = CabinetReader::open(&self.dal, cabinet.clone()).await?
                else {
                    continue;
                };

                let max_weight = self.config.weight_policy().max_weight(*origin);
                let packed = packer::pack(&mut reader, max_weight).await?;
                if packed.is_empty() {
                    continue;
                }

                let new_bundle = NewBundle {
                    id: request
                        .suggested_bundle_id
                        .unwrap_or_else(UniversalUuid::new_v4),
                    recipient: request.recipient.primary_key(),
                    origin: *origin,
                    content_type: cabinet.content_type.clone(),
                    notification_ids: packed.notification_ids,
                    document_types: packed.document_types,
                    response_format: request.response_format,
                    response_version: request.response_version,
                };
                let bundle_id = new_bundle.id;

                match self.dal.bundle().try_create(&new_bundle).await? {
                    TryCreateOutcome::Created => {
                        info!(
                            recipient = %request.recipient.id,
                            bundle_id = %bundle_id,
                            origin = %origin,
                            content_type = %new_bundle.content_type,
                            notifications = new_bundle.notification_ids.len(),
                            total_weight = packed.total_weight,
                            "Bundle created"
                        );
                        let bundle = self
                            .dal
                            .bundle()
                            .get_by_id(&[new_bundle.recipient.clone()], bundle_id)
                            .await?
                            .ok_or_else(|| {
                                StorageError::Corrupt(format!(
                                    "bundle {} vanished after creation",
                                    bundle_id
                                ))
                            })?;
                        return self
                            .resolve_content(
                                bundle,
                                request.response_format,
                                request.response_version,
                            )
                            .await;
                    }
                    TryCreateOutcome::AnotherBundleExists => {
                        // Lost the race; the winner's bundle will be
                        // served on the next peek.
                        debug!(
                            recipient = %request.recipient.id,
                            "Concurrent peek created a bundle first"
                        );
                        return Ok(PeekOutcome::NoContent);
                    }
                    TryCreateOutcome::BundleIdAlreadyInUse => {
                        return Err(PeekError::BundleIdAlreadyInUse(bundle_id.as_uuid()));
                    }
                }
            }
        }

        Ok(PeekOutcome::NoContent)
    }

    /// Acknowledges a bundle: marks its notifications consumed, flips
    /// the dequeued flag and archives the constituents.
    ///
    /// Returns `false` for unknown or already-dequeued bundles, a
    /// normal outcome rather than an error, so re-sent acknowledgments
    /// stay harmless.
    pub async fn dequeue(
        &self,
        recipient: &Recipient,
        bundle_id: UniversalUuid,
    ) -> Result<bool, DequeueError> {
        let keys = recipient.lookup_keys();

        let Some(bundle) = self.dal.bundle().get_by_id(&keys, bundle_id).await? else {
            debug!(recipient = %recipient.id, bundle_id = %bundle_id, "Unknown bundle; not dequeued");
            return Ok(false);
        };
        if bundle.dequeued {
            debug!(recipient = %recipient.id, bundle_id = %bundle_id, "Bundle already dequeued");
            return Ok(false);
        }

        // Consume the constituents first: if we fail between the two
        // acknowledgments, the bundle stays active and the client's
        // retry lands on the same bundle.
        self.dal
            .notification()
            .acknowledge(&keys, &bundle.notification_ids)
            .await?;

        let Some(bundle) = self.dal.bundle().acknowledge(&keys, bundle_id).await? else {
            // A concurrent dequeue flipped the flag in between.
            return Ok(false);
        };

        info!(
            recipient = %recipient.id,
            bundle_id = %bundle_id,
            notifications = bundle.notification_ids.len(),
            "Bundle dequeued"
        );

        self.archive_bundle(&bundle).await?;
        Ok(true)
    }

    /// Copies a dequeued bundle's notifications to the cold store,
    /// deletes them from the working set and marks the bundle archived.
    async fn archive_bundle(&self, bundle: &Bundle) -> Result<(), StorageError> {
        self.dal
            .notification()
            .archive(&bundle.notification_ids, Some(bundle.id))
            .await?;
        self.dal
            .notification()
            .delete(&bundle.notification_ids)
            .await?;
        self.dal.bundle().mark_archived(bundle.id).await?;

        debug!(
            bundle_id = %bundle.id,
            notifications = bundle.notification_ids.len(),
            "Bundle notifications archived"
        );
        Ok(())
    }

    /// Ensures the bundle has content, asking the owning sub-domain when
    /// it does not yet.
    async fn resolve_content(
        &self,
        bundle: Bundle,
        response_format: ResponseFormat,
        response_version: i32,
    ) -> Result<PeekOutcome, PeekError> {
        if let Some(reference) = bundle.content_reference.clone() {
            return Ok(PeekOutcome::Ready {
                bundle,
                content_reference: reference,
            });
        }

        match self
            .broker
            .request_content(&bundle, response_format, response_version)
            .await
        {
            Ok(Some(reference)) => {
                self.dal.bundle().assign_content(bundle.id, &reference).await?;
                let mut bundle = bundle;
                bundle.content_reference = Some(reference.clone());
                Ok(PeekOutcome::Ready {
                    bundle,
                    content_reference: reference,
                })
            }
            Ok(None) => Ok(PeekOutcome::Pending { bundle }),
            Err(e) => {
                // A broken channel is an infrastructure fault, but the
                // bundle itself is intact and re-triable; report it as
                // pending rather than failing the peek.
                error!(bundle_id = %bundle.id, error = %e, "Content channel failure");
                Ok(PeekOutcome::Pending { bundle })
            }
        }
    }
}
