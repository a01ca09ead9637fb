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

//! Shared integration-test harness: a file-backed SQLite database per
//! test, migrated and wired into the services.

// Each integration test binary compiles this module; not every binary
// uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cursus::broker::InMemoryChannel;
use cursus::config::PostOfficeConfig;
use cursus::dal::DAL;
use cursus::database::Database;
use cursus::database::universal_types::UniversalUuid;
use cursus::intake::{IngestionService, InMemoryDeadLetters};
use cursus::models::actor::{ActorId, Recipient};
use cursus::models::bundle::{DomainGroupSelector, ResponseFormat};
use cursus::models::notification::{NewNotification, SubDomain};
use cursus::service::{PeekRequest, PostOffice};
use cursus::cleanup::CleanupService;

pub struct TestHarness {
    // Keeps the database file alive for the duration of the test.
    _dir: tempfile::TempDir,
    pub dal: DAL,
    pub config: PostOfficeConfig,
    pub channel: InMemoryChannel,
    pub dead_letters: InMemoryDeadLetters,
    pub post_office: PostOffice,
    pub ingestion: IngestionService,
    pub cleanup: CleanupService,
}

/// Builds a harness with short timeouts suitable for tests.
pub async fn harness() -> TestHarness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: PostOfficeConfig) -> TestHarness {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("post_office.db");
    let database = Database::new(path.to_str().expect("utf-8 path"), "", 1);
    database.run_migrations().await.expect("migrations apply");

    let dal = DAL::new(database);
    let channel = InMemoryChannel::new();
    let dead_letters = InMemoryDeadLetters::new();
    let post_office = PostOffice::new(dal.clone(), config.clone(), Arc::new(channel.clone()));
    let ingestion = IngestionService::new(dal.clone(), config.clone(), Arc::new(dead_letters.clone()));
    let cleanup = CleanupService::new(dal.clone(), config.clone());

    TestHarness {
        _dir: dir,
        dal,
        config,
        channel,
        dead_letters,
        post_office,
        ingestion,
        cleanup,
    }
}

/// Defaults with a broker timeout short enough to exercise the
/// "content not ready" path without stalling the suite.
pub fn test_config() -> PostOfficeConfig {
    PostOfficeConfig::builder()
        .content_timeout(Duration::from_millis(50))
        .build()
        .expect("test config is valid")
}

pub fn gln_recipient(gln: &str) -> Recipient {
    Recipient::new(ActorId::parse(gln).expect("valid GLN"))
}

pub fn notification(
    recipient: &Recipient,
    origin: SubDomain,
    content_type: &str,
    weight: i32,
    supports_bundling: bool,
    sequence_number: i64,
) -> NewNotification {
    NewNotification {
        id: UniversalUuid::new_v4(),
        recipient: recipient.id.clone(),
        origin,
        content_type: content_type.into(),
        document_type: format!("{}-document", content_type),
        supports_bundling,
        weight,
        sequence_number,
    }
}

pub fn peek_request(recipient: &Recipient, selector: DomainGroupSelector) -> PeekRequest {
    PeekRequest {
        recipient: recipient.clone(),
        suggested_bundle_id: None,
        domain_group: selector,
        response_format: ResponseFormat::Xml,
        response_version: 1,
    }
}
