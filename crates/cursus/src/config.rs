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

//! Runtime configuration for the post office.
//!
//! # Construction
//!
//! Use [`PostOfficeConfig::builder()`]:
//!
//! ```rust
//! use std::time::Duration;
//! use cursus::config::PostOfficeConfig;
//!
//! let config = PostOfficeConfig::builder()
//!     .max_drawer_size(500)
//!     .content_timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_drawer_size(), 500);
//! ```
//!
//! Or use the defaults via `PostOfficeConfig::default()`.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::notification::SubDomain;

/// Default maximum items per drawer.
const DEFAULT_MAX_DRAWER_SIZE: i32 = 1000;

/// Default weight budget per bundle when no per-origin bound is set.
const DEFAULT_WEIGHT_BOUND: i32 = 50_000;

/// Per-origin bundle weight budgets.
///
/// A pure lookup from origin to a positive weight bound; origins without
/// an explicit bound use the default.
#[derive(Debug, Clone)]
pub struct WeightPolicy {
    bounds: HashMap<SubDomain, i32>,
    default_bound: i32,
}

impl WeightPolicy {
    pub fn new(default_bound: i32) -> Self {
        Self {
            bounds: HashMap::new(),
            default_bound,
        }
    }

    /// Sets an explicit bound for one origin.
    pub fn with_bound(mut self, origin: SubDomain, bound: i32) -> Self {
        self.bounds.insert(origin, bound);
        self
    }

    /// The weight budget for bundles built from this origin.
    pub fn max_weight(&self, origin: SubDomain) -> i32 {
        self.bounds.get(&origin).copied().unwrap_or(self.default_bound)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_bound <= 0 {
            return Err(ConfigError::InvalidWeightBound {
                origin: "<default>".into(),
                bound: self.default_bound,
            });
        }
        for (origin, bound) in &self.bounds {
            if *bound <= 0 {
                return Err(ConfigError::InvalidWeightBound {
                    origin: origin.as_str().into(),
                    bound: *bound,
                });
            }
        }
        Ok(())
    }
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT_BOUND)
    }
}

/// Configuration for the post-office engine.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PostOfficeConfig {
    max_drawer_size: i32,
    append_retries: u32,
    drawer_retention: Duration,
    cleanup_interval: Duration,
    content_timeout: Duration,
    weight_policy: WeightPolicy,
}

impl PostOfficeConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> PostOfficeConfigBuilder {
        PostOfficeConfigBuilder::default()
    }

    /// Maximum notifications per drawer before it seals.
    pub fn max_drawer_size(&self) -> i32 {
        self.max_drawer_size
    }

    /// How many times an append retries a drawer-fill race before
    /// reporting contention.
    pub fn append_retries(&self) -> u32 {
        self.append_retries
    }

    /// How long a sealed drawer is kept before cleanup may reclaim it.
    pub fn drawer_retention(&self) -> Duration {
        self.drawer_retention
    }

    /// How often the cleanup sweeper runs.
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// How long a content request waits for the sub-domain's reply.
    pub fn content_timeout(&self) -> Duration {
        self.content_timeout
    }

    /// The per-origin bundle weight budgets.
    pub fn weight_policy(&self) -> &WeightPolicy {
        &self.weight_policy
    }
}

impl Default for PostOfficeConfig {
    fn default() -> Self {
        PostOfficeConfigBuilder::default()
            .build()
            .expect("default configuration is valid")
    }
}

/// Builder for [`PostOfficeConfig`].
#[derive(Debug, Clone)]
pub struct PostOfficeConfigBuilder {
    max_drawer_size: i32,
    append_retries: u32,
    drawer_retention: Duration,
    cleanup_interval: Duration,
    content_timeout: Duration,
    weight_policy: WeightPolicy,
}

impl Default for PostOfficeConfigBuilder {
    fn default() -> Self {
        Self {
            max_drawer_size: DEFAULT_MAX_DRAWER_SIZE,
            append_retries: 3,
            drawer_retention: Duration::from_secs(7 * 24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            content_timeout: Duration::from_secs(30),
            weight_policy: WeightPolicy::default(),
        }
    }
}

impl PostOfficeConfigBuilder {
    /// Maximum notifications per drawer before it seals.
    pub fn max_drawer_size(mut self, size: i32) -> Self {
        self.max_drawer_size = size;
        self
    }

    /// How many times an append retries a drawer-fill race.
    pub fn append_retries(mut self, attempts: u32) -> Self {
        self.append_retries = attempts;
        self
    }

    /// How long a sealed drawer is kept before cleanup may reclaim it.
    pub fn drawer_retention(mut self, retention: Duration) -> Self {
        self.drawer_retention = retention;
        self
    }

    /// How often the cleanup sweeper runs.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// How long a content request waits for the sub-domain's reply.
    pub fn content_timeout(mut self, timeout: Duration) -> Self {
        self.content_timeout = timeout;
        self
    }

    /// The per-origin bundle weight budgets.
    pub fn weight_policy(mut self, policy: WeightPolicy) -> Self {
        self.weight_policy = policy;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<PostOfficeConfig, ConfigError> {
        if self.max_drawer_size <= 0 {
            return Err(ConfigError::InvalidMaxDrawerSize {
                size: self.max_drawer_size,
            });
        }
        if self.append_retries == 0 {
            return Err(ConfigError::InvalidAppendRetries {
                attempts: self.append_retries,
            });
        }
        self.weight_policy.validate()?;

        Ok(PostOfficeConfig {
            max_drawer_size: self.max_drawer_size,
            append_retries: self.append_retries,
            drawer_retention: self.drawer_retention,
            cleanup_interval: self.cleanup_interval,
            content_timeout: self.content_timeout,
            weight_policy: self.weight_policy,
        })
    }
}
