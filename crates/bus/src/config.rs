// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Bus configuration, including the production preset.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The policy applied when a priority queue is at capacity and a new message must be enqueued.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "kebab-case")]
pub enum DropPolicy {
    /// Evict the head of the target queue, then append the new message.
    #[default]
    Oldest,
    /// Drop the incoming message.
    Newest,
    /// Displace a lower-priority queue first; fall back to evicting the target queue's head.
    LowPriority,
}

/// Bus configuration. Defaults match the non-production column of the specification's
/// configuration table; [`BusConfig::production`] bundles the production column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub enable_logging: bool,
    pub enable_metrics: bool,
    pub max_listeners_per_event: usize,
    pub max_data_size: usize,
    pub warn_data_size: usize,
    pub max_pending_requests: usize,
    pub enable_duplicate_handler_check: bool,
    pub enable_priority_queue: bool,
    pub max_queue_size: usize,
    pub drop_policy: DropPolicy,
    pub batch_size: usize,
    pub max_processing_time_ms: u64,
    pub enable_backpressure: bool,
    pub backpressure_threshold: f64,
    pub adaptive_processing: bool,
    pub pattern_cache_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            max_timeout_ms: 60_000,
            enable_logging: false,
            enable_metrics: true,
            max_listeners_per_event: 100,
            max_data_size: 1024 * 1024,
            warn_data_size: 512 * 1024,
            max_pending_requests: 1_000,
            enable_duplicate_handler_check: true,
            enable_priority_queue: false,
            max_queue_size: 10_000,
            drop_policy: DropPolicy::Oldest,
            batch_size: 100,
            max_processing_time_ms: 16,
            enable_backpressure: true,
            backpressure_threshold: 0.8,
            adaptive_processing: false,
            pattern_cache_capacity: crate::pattern::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl BusConfig {
    /// The recommended production preset.
    #[must_use]
    pub fn production() -> Self {
        Self {
            max_listeners_per_event: 1_000,
            max_data_size: 2 * 1024 * 1024,
            warn_data_size: 1024 * 1024,
            max_pending_requests: 5_000,
            enable_priority_queue: true,
            max_queue_size: 50_000,
            drop_policy: DropPolicy::LowPriority,
            batch_size: 200,
            max_processing_time_ms: 8,
            backpressure_threshold: 0.7,
            adaptive_processing: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.default_timeout_ms, 5_000);
        assert!(!config.enable_priority_queue);
        assert_eq!(config.drop_policy, DropPolicy::Oldest);
    }

    #[rstest]
    fn test_production_preset() {
        let config = BusConfig::production();
        assert!(config.enable_priority_queue);
        assert_eq!(config.drop_policy, DropPolicy::LowPriority);
        assert_eq!(config.max_pending_requests, 5_000);
        assert!(config.adaptive_processing);
    }
}
