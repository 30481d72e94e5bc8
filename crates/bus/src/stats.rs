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

//! Bus counters, derived rates, and the health score.

use std::{
    cell::{Cell, RefCell},
    time::{Duration, Instant},
};

use serde::Serialize;

/// How long a [`StatsSnapshot`] is cached for before `snapshot()` recomputes it.
const SNAPSHOT_CACHE_MS: u64 = 100;

/// Raw counters updated on the hot path.
///
/// In the single-threaded cooperative target these are plain `Cell<u64>`; a parallel-threaded
/// port (admissible per the concurrency model) would make these atomics instead.
#[derive(Debug, Default)]
pub struct Stats {
    pub messages_sent: Cell<u64>,
    pub messages_received: Cell<u64>,
    pub messages_dropped: Cell<u64>,
    pub requests_sent: Cell<u64>,
    pub requests_completed: Cell<u64>,
    pub requests_timed_out: Cell<u64>,
    pub requests_failed: Cell<u64>,
    pub errors_caught: Cell<u64>,
    pub large_message_warnings: Cell<u64>,
    pub peak_listeners: Cell<usize>,
    pub peak_pending_requests: Cell<usize>,
    cached: RefCell<Option<(Instant, StatsSnapshot)>>,
}

/// Inputs the bus supplies at snapshot time that are not themselves counters (current
/// queue/table occupancy and the configured caps used to derive utilization and health).
#[derive(Copy, Clone, Debug, Default)]
pub struct SnapshotInputs {
    pub total_queued: usize,
    pub pending_requests: usize,
    pub pressure_level: f64,
    pub max_queue_size: usize,
    pub max_pending_requests: usize,
    pub uptime: Duration,
}

/// A point-in-time view of the bus's health and throughput.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub requests_sent: u64,
    pub requests_completed: u64,
    pub requests_timed_out: u64,
    pub requests_failed: u64,
    pub errors_caught: u64,
    pub large_message_warnings: u64,
    pub peak_listeners: usize,
    pub peak_pending_requests: usize,
    pub total_queued: usize,
    pub pending_requests: usize,
    pub pressure_level: f64,
    pub messages_per_second: f64,
    pub processing_rate: f64,
    pub drop_rate: f64,
    pub request_success_rate: f64,
    pub queue_utilization: f64,
    pub uptime_secs: u64,
    pub health_score: u8,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_listener_count(&self, count: usize) {
        if count > self.peak_listeners.get() {
            self.peak_listeners.set(count);
        }
    }

    pub fn record_pending_count(&self, count: usize) {
        if count > self.peak_pending_requests.get() {
            self.peak_pending_requests.set(count);
        }
    }

    /// Returns a cached or freshly computed snapshot. Cached for [`SNAPSHOT_CACHE_MS`].
    #[must_use]
    pub fn snapshot(&self, inputs: SnapshotInputs) -> StatsSnapshot {
        if let Some((taken_at, snapshot)) = self.cached.borrow().as_ref() {
            if taken_at.elapsed() < Duration::from_millis(SNAPSHOT_CACHE_MS) {
                return snapshot.clone();
            }
        }

        let snapshot = self.compute(inputs);
        *self.cached.borrow_mut() = Some((Instant::now(), snapshot.clone()));
        snapshot
    }

    fn compute(&self, inputs: SnapshotInputs) -> StatsSnapshot {
        let sent = self.messages_sent.get();
        let received = self.messages_received.get();
        let dropped = self.messages_dropped.get();
        let errors = self.errors_caught.get();
        let req_completed = self.requests_completed.get();
        let req_failed = self.requests_failed.get();
        let req_timed_out = self.requests_timed_out.get();

        let uptime_secs = inputs.uptime.as_secs().max(1);
        let messages_per_second = sent as f64 / uptime_secs as f64;
        let processing_rate = received as f64 / uptime_secs as f64;
        let drop_rate = ratio(dropped, sent);

        let total_requests = req_completed + req_failed + req_timed_out;
        let request_success_rate = if total_requests == 0 {
            1.0
        } else {
            req_completed as f64 / total_requests as f64
        };

        let queue_utilization = if inputs.max_queue_size == 0 {
            0.0
        } else {
            inputs.total_queued as f64 / (3.0 * inputs.max_queue_size as f64)
        };

        let health_score = health_score(HealthFactors {
            request_success_rate,
            error_rate: ratio(errors, sent),
            queue_utilization,
            pending_request_ratio: if inputs.max_pending_requests == 0 {
                0.0
            } else {
                inputs.pending_requests as f64 / inputs.max_pending_requests as f64
            },
            drop_rate,
        });

        StatsSnapshot {
            messages_sent: sent,
            messages_received: received,
            messages_dropped: dropped,
            requests_sent: self.requests_sent.get(),
            requests_completed: req_completed,
            requests_timed_out: req_timed_out,
            requests_failed: req_failed,
            errors_caught: errors,
            large_message_warnings: self.large_message_warnings.get(),
            peak_listeners: self.peak_listeners.get(),
            peak_pending_requests: self.peak_pending_requests.get(),
            total_queued: inputs.total_queued,
            pending_requests: inputs.pending_requests,
            pressure_level: inputs.pressure_level,
            messages_per_second,
            processing_rate,
            drop_rate,
            request_success_rate,
            queue_utilization,
            uptime_secs,
            health_score,
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

struct HealthFactors {
    request_success_rate: f64,
    error_rate: f64,
    queue_utilization: f64,
    pending_request_ratio: f64,
    drop_rate: f64,
}

/// Computes the health score: the mean of five factors, each clamped to `[0,1]`, scaled to
/// `[0,100]` and rounded.
fn health_score(factors: HealthFactors) -> u8 {
    let clamp = |v: f64| v.clamp(0.0, 1.0);
    let mean = (clamp(factors.request_success_rate)
        + clamp(1.0 - factors.error_rate)
        + clamp(1.0 - factors.queue_utilization)
        + clamp(1.0 - factors.pending_request_ratio)
        + clamp(1.0 - factors.drop_rate))
        / 5.0;
    (mean * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_health_score_perfect() {
        let stats = Stats::new();
        stats.messages_sent.set(10);
        stats.messages_received.set(10);
        let snap = stats.snapshot(SnapshotInputs {
            max_queue_size: 100,
            max_pending_requests: 100,
            uptime: Duration::from_secs(1),
            ..Default::default()
        });
        assert_eq!(snap.health_score, 100);
    }

    #[rstest]
    fn test_health_score_degrades_with_errors() {
        let stats = Stats::new();
        stats.messages_sent.set(10);
        stats.errors_caught.set(10);
        let snap = stats.snapshot(SnapshotInputs {
            max_queue_size: 100,
            max_pending_requests: 100,
            uptime: Duration::from_secs(1),
            ..Default::default()
        });
        assert!(snap.health_score < 100);
    }

    #[rstest]
    fn test_request_success_rate_default_is_one_with_no_requests() {
        let stats = Stats::new();
        let snap = stats.snapshot(SnapshotInputs {
            max_queue_size: 10,
            max_pending_requests: 10,
            uptime: Duration::from_secs(1),
            ..Default::default()
        });
        assert_eq!(snap.request_success_rate, 1.0);
    }

    #[rstest]
    fn test_peak_tracking() {
        let stats = Stats::new();
        stats.record_listener_count(3);
        stats.record_listener_count(1);
        stats.record_listener_count(5);
        assert_eq!(stats.peak_listeners.get(), 5);
    }
}
