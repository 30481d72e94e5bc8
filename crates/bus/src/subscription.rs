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

//! The subscription record installed by `subscribe`.

use std::cell::Cell;

use ustr::Ustr;

use crate::{handler::ShareableMessageHandler, message::Priority};

/// A subscription to a particular pattern.
///
/// Equality and hashing are by `(pattern, handler_id)`, which is the identity the
/// duplicate-registration guard keys on; `id` is a separate opaque handle used for
/// targeted removal and is not part of that identity.
#[derive(Clone, Debug)]
pub struct Subscription {
    /// Opaque id of this subscription, distinct from the handler's own id.
    pub id: Ustr,
    pub pattern: Ustr,
    pub handler: ShareableMessageHandler,
    pub handler_id: Ustr,
    pub priority: Priority,
    pub once: bool,
    pub created_at: u64,
    /// Monotonically increasing registration sequence, assigned by the bus. Used as the
    /// tie-break for subscriptions of equal priority, since pattern-creation order alone does
    /// not reflect the order in which individual handlers were registered.
    pub seq: u64,
    pub call_count: Cell<u64>,
    pub total_exec_nanos: Cell<u64>,
    pub last_exec_nanos: Cell<u64>,
}

impl Subscription {
    /// Creates a new subscription record.
    #[must_use]
    pub fn new(
        pattern: Ustr,
        handler: ShareableMessageHandler,
        priority: Priority,
        once: bool,
        created_at: u64,
        seq: u64,
    ) -> Self {
        Self {
            id: Ustr::from(&cadbus_core::UUID4::new().to_string()),
            handler_id: handler.id(),
            pattern,
            handler,
            priority,
            once,
            created_at,
            seq,
            call_count: Cell::new(0),
            total_exec_nanos: Cell::new(0),
            last_exec_nanos: Cell::new(0),
        }
    }

    /// Records one invocation's execution time.
    pub fn record_invocation(&self, exec_nanos: u64) {
        self.call_count.set(self.call_count.get() + 1);
        self.total_exec_nanos.set(self.total_exec_nanos.get() + exec_nanos);
        self.last_exec_nanos.set(exec_nanos);
    }

    /// Returns whether this subscription and `other` share the same `(pattern, handler)` key,
    /// i.e. whether registering `other` would be a duplicate of this one.
    #[must_use]
    pub fn same_key(&self, pattern: &Ustr, handler_id: &Ustr) -> bool {
        &self.pattern == pattern && &self.handler_id == handler_id
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use rstest::rstest;

    use super::*;
    use crate::handler::TypedMessageHandler;

    fn handler() -> ShareableMessageHandler {
        ShareableMessageHandler::from(
            Rc::new(TypedMessageHandler::<i32, _>::from(|_: &i32| {})) as Rc<dyn crate::handler::MessageHandler>,
        )
    }

    #[rstest]
    fn test_same_key() {
        let h = handler();
        let sub = Subscription::new(Ustr::from("a.*"), h.clone(), Priority::Normal, false, 0, 0);
        assert!(sub.same_key(&Ustr::from("a.*"), &h.id()));
        assert!(!sub.same_key(&Ustr::from("a.b"), &h.id()));
    }

    #[rstest]
    fn test_record_invocation() {
        let sub = Subscription::new(Ustr::from("a"), handler(), Priority::High, true, 0, 0);
        sub.record_invocation(100);
        sub.record_invocation(200);
        assert_eq!(sub.call_count.get(), 2);
        assert_eq!(sub.total_exec_nanos.get(), 300);
        assert_eq!(sub.last_exec_nanos.get(), 200);
    }
}
