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

//! Stub handlers used by this crate's own tests and available to collaborators' tests.

use std::{
    any::Any,
    cell::RefCell,
    fmt::Debug,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
};

use ustr::Ustr;
use uuid::Uuid;

use crate::{
    handler::{MessageHandler, ShareableMessageHandler},
    message::Message,
};

/// A handler that records whether it was invoked at all.
#[derive(Debug)]
pub struct CallCheckMessageHandler {
    id: Ustr,
    called: Rc<AtomicBool>,
}

impl CallCheckMessageHandler {
    #[must_use]
    pub fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

impl MessageHandler for CallCheckMessageHandler {
    fn id(&self) -> Ustr {
        self.id
    }

    fn handle(&self, _message: &dyn Any) {
        self.called.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates a [`CallCheckMessageHandler`] wrapped as a [`ShareableMessageHandler`].
#[must_use]
pub fn get_call_check_shareable_handler(id: Option<Ustr>) -> ShareableMessageHandler {
    let unique_id = id.unwrap_or_else(|| Ustr::from(&Uuid::new_v4().to_string()));
    ShareableMessageHandler(Rc::new(CallCheckMessageHandler {
        id: unique_id,
        called: Rc::new(AtomicBool::new(false)),
    }))
}

/// Returns whether the given handler (expected to be a [`CallCheckMessageHandler`]) was called.
///
/// # Panics
///
/// Panics if `handler` does not wrap a `CallCheckMessageHandler`.
#[must_use]
pub fn check_handler_was_called(handler: &ShareableMessageHandler) -> bool {
    handler.0.as_any().downcast_ref::<CallCheckMessageHandler>().unwrap().was_called()
}

/// A handler that throws (panics) on every invocation, for fault-containment tests.
#[derive(Debug)]
pub struct FaultyMessageHandler {
    id: Ustr,
}

impl FaultyMessageHandler {
    #[must_use]
    pub fn new(id: Option<Ustr>) -> ShareableMessageHandler {
        let unique_id = id.unwrap_or_else(|| Ustr::from(&Uuid::new_v4().to_string()));
        ShareableMessageHandler(Rc::new(Self { id: unique_id }))
    }
}

impl MessageHandler for FaultyMessageHandler {
    fn id(&self) -> Ustr {
        self.id
    }

    fn handle(&self, _message: &dyn Any) {
        panic!("FaultyMessageHandler always fails");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A handler that saves every message it receives, for assertions against delivery order.
#[derive(Debug, Clone)]
pub struct MessageSavingHandler {
    id: Ustr,
    messages: Rc<RefCell<Vec<Message>>>,
}

impl MessageSavingHandler {
    #[must_use]
    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }
}

impl MessageHandler for MessageSavingHandler {
    fn id(&self) -> Ustr {
        self.id
    }

    /// # Panics
    ///
    /// Panics if the payload is not a [`Message`].
    fn handle(&self, message: &dyn Any) {
        let message = message.downcast_ref::<Message>().expect("expected a Message payload").clone();
        self.messages.borrow_mut().push(message);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates a [`MessageSavingHandler`] wrapped as a [`ShareableMessageHandler`].
#[must_use]
pub fn get_message_saving_handler(id: Option<Ustr>) -> ShareableMessageHandler {
    let unique_id = id.unwrap_or_else(|| Ustr::from(&Uuid::new_v4().to_string()));
    ShareableMessageHandler(Rc::new(MessageSavingHandler {
        id: unique_id,
        messages: Rc::new(RefCell::new(Vec::new())),
    }))
}

/// Retrieves the messages saved by a [`MessageSavingHandler`].
///
/// # Panics
///
/// Panics if `handler` does not wrap a `MessageSavingHandler`.
#[must_use]
pub fn get_saved_messages(handler: &ShareableMessageHandler) -> Vec<Message> {
    handler.0.as_any().downcast_ref::<MessageSavingHandler>().unwrap().get_messages()
}
