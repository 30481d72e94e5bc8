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

//! The three bounded, FIFO-within-priority queues that back queued dispatch mode.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    config::DropPolicy,
    message::{Message, Priority},
};

/// How often `pressure_level` is allowed to be recomputed.
const PRESSURE_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Pressure is boosted by this amount when the running drop rate exceeds 10%.
const DROP_RATE_BOOST_THRESHOLD: f64 = 0.10;
const DROP_RATE_BOOST: f64 = 0.2;

/// The outcome of attempting to enqueue a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    DroppedByBackpressure,
    DroppedByQuota,
}

/// Three bounded priority queues with backpressure gating and a configurable drop policy.
#[derive(Debug)]
pub struct PriorityQueues {
    high: RefCell<VecDeque<Message>>,
    normal: RefCell<VecDeque<Message>>,
    low: RefCell<VecDeque<Message>>,
    max_queue_size: usize,
    drop_policy: DropPolicy,
    enable_backpressure: bool,
    backpressure_threshold: f64,
    pressure_level: Cell<f64>,
    last_pressure_update: Cell<Option<Instant>>,
}

impl PriorityQueues {
    #[must_use]
    pub fn new(
        max_queue_size: usize,
        drop_policy: DropPolicy,
        enable_backpressure: bool,
        backpressure_threshold: f64,
    ) -> Self {
        Self {
            high: RefCell::new(VecDeque::new()),
            normal: RefCell::new(VecDeque::new()),
            low: RefCell::new(VecDeque::new()),
            max_queue_size,
            drop_policy,
            enable_backpressure,
            backpressure_threshold,
            pressure_level: Cell::new(0.0),
            last_pressure_update: Cell::new(None),
        }
    }

    fn queue(&self, priority: Priority) -> &RefCell<VecDeque<Message>> {
        match priority {
            Priority::High => &self.high,
            Priority::Normal => &self.normal,
            Priority::Low => &self.low,
        }
    }

    /// Total number of messages currently queued across all three priorities.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.high.borrow().len() + self.normal.borrow().len() + self.low.borrow().len()
    }

    /// Current pressure level, in `[0,1]`.
    #[must_use]
    pub fn pressure_level(&self) -> f64 {
        self.pressure_level.get()
    }

    /// Recomputes `pressure_level` if at least [`PRESSURE_UPDATE_INTERVAL`] has elapsed since
    /// the last recomputation. `drop_rate` is the caller's running `messages_dropped /
    /// messages_sent` ratio.
    pub fn maybe_update_pressure(&self, drop_rate: f64) {
        let now = Instant::now();
        let due = match self.last_pressure_update.get() {
            None => true,
            Some(last) => now.duration_since(last) >= PRESSURE_UPDATE_INTERVAL,
        };
        if !due {
            return;
        }

        let cap = (3 * self.max_queue_size).max(1) as f64;
        let mut level = (self.total_len() as f64 / cap).clamp(0.0, 1.0);
        if drop_rate > DROP_RATE_BOOST_THRESHOLD {
            level = (level + DROP_RATE_BOOST).min(1.0);
        }

        self.pressure_level.set(level);
        self.last_pressure_update.set(Some(now));
    }

    /// Attempts to enqueue `message`, applying the backpressure gate then the drop policy.
    pub fn enqueue(&self, message: Message) -> EnqueueOutcome {
        if self.enable_backpressure
            && self.pressure_level.get() > self.backpressure_threshold
            && self.pressure_level.get() > 0.9
            && message.priority == Priority::Low
        {
            return EnqueueOutcome::DroppedByBackpressure;
        }

        let target = self.queue(message.priority);
        if target.borrow().len() >= self.max_queue_size {
            return self.apply_drop_policy(message);
        }

        target.borrow_mut().push_back(message);
        EnqueueOutcome::Enqueued
    }

    fn apply_drop_policy(&self, message: Message) -> EnqueueOutcome {
        match self.drop_policy {
            DropPolicy::Oldest => {
                self.queue(message.priority).borrow_mut().pop_front();
                self.queue(message.priority).borrow_mut().push_back(message);
                EnqueueOutcome::DroppedByQuota
            }
            DropPolicy::Newest => EnqueueOutcome::DroppedByQuota,
            DropPolicy::LowPriority => {
                if self.evict_lower_priority(message.priority) {
                    self.queue(message.priority).borrow_mut().push_back(message);
                } else {
                    self.queue(message.priority).borrow_mut().pop_front();
                    self.queue(message.priority).borrow_mut().push_back(message);
                }
                EnqueueOutcome::DroppedByQuota
            }
        }
    }

    /// Tries to evict one message from a queue with lower priority than `priority`. High
    /// displaces low first, then normal; normal displaces low.
    fn evict_lower_priority(&self, priority: Priority) -> bool {
        match priority {
            Priority::High => {
                if self.low.borrow_mut().pop_front().is_some() {
                    return true;
                }
                self.normal.borrow_mut().pop_front().is_some()
            }
            Priority::Normal => self.low.borrow_mut().pop_front().is_some(),
            Priority::Low => false,
        }
    }

    /// Pops one message from the highest-priority non-empty queue, if any.
    pub fn pop_highest(&self) -> Option<Message> {
        self.high
            .borrow_mut()
            .pop_front()
            .or_else(|| self.normal.borrow_mut().pop_front())
            .or_else(|| self.low.borrow_mut().pop_front())
    }

    /// Clears all three queues.
    pub fn clear(&self) {
        self.high.borrow_mut().clear();
        self.normal.borrow_mut().clear();
        self.low.borrow_mut().clear();
        self.pressure_level.set(0.0);
        self.last_pressure_update.set(None);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::message::EmitOptions;

    fn msg(priority: Priority) -> Message {
        Message::new(
            ustr::Ustr::from("t"),
            json!(null),
            0,
            EmitOptions {
                priority: Some(priority),
                ..Default::default()
            },
        )
    }

    #[rstest]
    fn test_fifo_within_priority_and_priority_ordering() {
        let q = PriorityQueues::new(10, DropPolicy::Oldest, false, 0.8);
        q.enqueue(msg(Priority::Low));
        q.enqueue(msg(Priority::High));
        q.enqueue(msg(Priority::Normal));
        q.enqueue(msg(Priority::High));

        let order: Vec<Priority> = std::iter::from_fn(|| q.pop_highest().map(|m| m.priority)).collect();
        assert_eq!(order, vec![Priority::High, Priority::High, Priority::Normal, Priority::Low]);
    }

    #[rstest]
    fn test_quota_full_at_exact_max_queue_size() {
        let q = PriorityQueues::new(2, DropPolicy::Newest, false, 0.8);
        assert_eq!(q.enqueue(msg(Priority::Normal)), EnqueueOutcome::Enqueued);
        assert_eq!(q.enqueue(msg(Priority::Normal)), EnqueueOutcome::Enqueued);
        assert_eq!(q.enqueue(msg(Priority::Normal)), EnqueueOutcome::DroppedByQuota);
    }

    #[rstest]
    fn test_drop_policy_oldest_evicts_head() {
        let q = PriorityQueues::new(1, DropPolicy::Oldest, false, 0.8);
        q.enqueue(msg(Priority::Normal));
        let outcome = q.enqueue(msg(Priority::High));
        assert_eq!(outcome, EnqueueOutcome::DroppedByQuota);
        assert_eq!(q.total_len(), 1);
        assert_eq!(q.pop_highest().unwrap().priority, Priority::High);
    }

    #[rstest]
    fn test_drop_policy_low_priority_displaces_low_queue() {
        let q = PriorityQueues::new(1, DropPolicy::LowPriority, false, 0.8);
        q.enqueue(msg(Priority::Low));
        let outcome = q.enqueue(msg(Priority::High));
        assert_eq!(outcome, EnqueueOutcome::DroppedByQuota);
        assert_eq!(q.total_len(), 1);
        assert_eq!(q.pop_highest().unwrap().priority, Priority::High);
    }

    #[rstest]
    fn test_clear_resets_pressure() {
        let q = PriorityQueues::new(10, DropPolicy::Oldest, false, 0.8);
        q.enqueue(msg(Priority::Normal));
        q.maybe_update_pressure(0.0);
        q.clear();
        assert_eq!(q.total_len(), 0);
        assert_eq!(q.pressure_level(), 0.0);
    }
}
