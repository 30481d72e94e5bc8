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

//! Message handler functionality for the message bus.
//!
//! Handlers are type-erased behind [`MessageHandler`] so the bus can hold a single
//! subscription registry over arbitrary payload types.

use std::{
    any::{Any, type_name},
    fmt::Debug,
    marker::PhantomData,
    rc::Rc,
};

use cadbus_core::UUID4;
use ustr::Ustr;

/// A type-erased message handler.
///
/// `id()` must be stable for the lifetime of the handler: it is the identity used by the
/// duplicate-registration guard and by targeted `unsubscribe`.
pub trait MessageHandler: Any {
    /// Returns the unique identifier for this handler.
    fn id(&self) -> Ustr;
    /// Handles a message envelope's payload.
    fn handle(&self, message: &dyn Any);
    /// Returns this handler as a trait object, for downcasting in tests.
    fn as_any(&self) -> &dyn Any;
}

impl PartialEq for dyn MessageHandler {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn MessageHandler {}

/// A handler that downcasts the message payload to `T` before invoking a closure.
#[derive(Debug)]
pub struct TypedMessageHandler<T: 'static + ?Sized, F: Fn(&T) + 'static> {
    id: Ustr,
    callback: F,
    _phantom: PhantomData<T>,
}

impl<T: 'static, F: Fn(&T) + 'static> TypedMessageHandler<T, F> {
    /// Creates a new handler with an optional caller-provided id.
    pub fn new<S: AsRef<str>>(id: Option<S>, callback: F) -> Self {
        let id = id.map_or_else(|| generate_handler_id(&callback), |s| Ustr::from(s.as_ref()));
        Self {
            id,
            callback,
            _phantom: PhantomData,
        }
    }

    /// Creates a new handler with an auto-generated id.
    pub fn from(callback: F) -> Self {
        Self::new::<Ustr>(None, callback)
    }
}

impl<T: 'static, F: Fn(&T) + 'static> MessageHandler for TypedMessageHandler<T, F> {
    fn id(&self) -> Ustr {
        self.id
    }

    fn handle(&self, message: &dyn Any) {
        if let Some(typed) = message.downcast_ref::<T>() {
            (self.callback)(typed);
        } else {
            log::error!("expected message payload of type {}", type_name::<T>());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn generate_handler_id<T: 'static + ?Sized, F: 'static + Fn(&T)>(callback: &F) -> Ustr {
    let callback_ptr = std::ptr::from_ref(callback);
    let uuid = UUID4::new();
    Ustr::from(&format!("<{callback_ptr:?}>-{uuid}"))
}

/// A cloneable, shareable handle to a [`MessageHandler`].
///
/// Wraps `Rc<dyn MessageHandler>`, which is not `Send`/`Sync`: the bus is a single-threaded,
/// cooperative component and handlers are never shared across threads.
#[repr(transparent)]
#[derive(Clone)]
pub struct ShareableMessageHandler(pub Rc<dyn MessageHandler>);

impl ShareableMessageHandler {
    /// Returns the wrapped handler's id.
    #[must_use]
    pub fn id(&self) -> Ustr {
        self.0.id()
    }
}

impl Debug for ShareableMessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ShareableMessageHandler))
            .field("id", &self.0.id())
            .finish()
    }
}

impl From<Rc<dyn MessageHandler>> for ShareableMessageHandler {
    fn from(value: Rc<dyn MessageHandler>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, cell::Cell, rc::Rc};

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_typed_handler_invokes_callback() {
        let seen = Rc::new(Cell::new(0_i32));
        let seen_clone = seen.clone();
        let handler = TypedMessageHandler::<i32, _>::from(move |v: &i32| seen_clone.set(*v));
        let payload: &dyn Any = &7_i32;
        handler.handle(payload);
        assert_eq!(seen.get(), 7);
    }

    #[rstest]
    fn test_shareable_handler_identity_eq() {
        let a = ShareableMessageHandler::from(Rc::new(TypedMessageHandler::<i32, _>::new(
            Some("h1"),
            |_: &i32| {},
        )) as Rc<dyn MessageHandler>);
        let b = ShareableMessageHandler::from(Rc::new(TypedMessageHandler::<i32, _>::new(
            Some("h1"),
            |_: &i32| {},
        )) as Rc<dyn MessageHandler>);
        assert_eq!(a.id(), b.id());
    }
}
