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

//! The message envelope produced by `emit`/`request`, and the priority tag shared by messages
//! and subscriptions.

use cadbus_core::UUID4;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use ustr::Ustr;

/// Priority of a message or a subscription.
///
/// Ordered so that `High < Normal < Low`, which lets the dispatch loop sort matching
/// subscriptions for a message with a plain ascending sort.
#[repr(u8)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

/// Options accepted by `emit`, forwarded into the resulting [`Message`].
#[derive(Clone, Debug, Default)]
pub struct EmitOptions {
    /// Overrides the default `Normal` priority.
    pub priority: Option<Priority>,
    /// Set when this emission is issued on behalf of a `request`, or answers one via `reply`.
    pub request_id: Option<UUID4>,
    /// Set by a [`crate::bus::ScopedBusHandle`] to the owning module's name.
    pub source: Option<String>,
}

/// An envelope produced by `emit`/`request` and delivered to matching subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// The event name this message was published under.
    pub event: Ustr,
    /// Arbitrary serializable payload.
    pub data: serde_json::Value,
    /// Monotonic timestamp in milliseconds, assigned by the bus at emission time.
    pub timestamp: u64,
    /// Unique identifier for this message.
    pub id: UUID4,
    /// Delivery priority.
    pub priority: Priority,
    /// Set when this message correlates to a pending `request`.
    pub request_id: Option<UUID4>,
    /// Name of the module that emitted this message via a scoped handle, if any.
    pub source: Option<String>,
}

impl Message {
    /// Creates a new message, stamping it with a fresh id and the given monotonic timestamp.
    #[must_use]
    pub fn new(event: Ustr, data: serde_json::Value, timestamp: u64, options: EmitOptions) -> Self {
        Self {
            event,
            data,
            timestamp,
            id: UUID4::new(),
            priority: options.priority.unwrap_or_default(),
            request_id: options.request_id,
            source: options.source,
        }
    }

    /// Estimates the wire size of this message's payload using canonical JSON encoding.
    ///
    /// This is the deterministic size estimator used for `max_data_size`/`warn_data_size`
    /// enforcement; it intentionally ignores envelope metadata (event name, id, timestamp).
    #[must_use]
    pub fn data_size(&self) -> usize {
        serde_json::to_vec(&self.data).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_priority_ordering() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[rstest]
    fn test_priority_display() {
        assert_eq!(Priority::High.to_string(), "HIGH");
        assert_eq!(Priority::Low.to_string(), "LOW");
    }

    #[rstest]
    fn test_message_new_defaults() {
        let msg = Message::new(Ustr::from("a.b"), json!({"x": 1}), 42, EmitOptions::default());
        assert_eq!(msg.event.as_str(), "a.b");
        assert_eq!(msg.priority, Priority::Normal);
        assert!(msg.request_id.is_none());
        assert!(msg.source.is_none());
    }

    #[rstest]
    fn test_data_size() {
        let msg = Message::new(Ustr::from("a"), json!({"a": 1}), 0, EmitOptions::default());
        assert_eq!(msg.data_size(), serde_json::to_vec(&json!({"a": 1})).unwrap().len());
    }
}
