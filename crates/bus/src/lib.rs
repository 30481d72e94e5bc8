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

//! The in-process message bus that forms the communication backbone of the CAD application.
//!
//! Every module (storage, resources, geometry, viewport, shell, desktop integration, the OCCT
//! worker bridge) is strictly isolated and interacts only by publishing events, subscribing to
//! patterns, and issuing request/response exchanges through this bus. No module imports another;
//! the bus is the sole coupling point.
//!
//! # Components
//!
//! - [`pattern`]: compiles subscription patterns into matchers and caches them.
//! - [`bus`]: subscriber registry, priority queues, backpressure, dispatch, request/reply.
//! - [`lifecycle`]: tracks module instances through their state machine and health.
//! - [`loader`]: registers module factories and coordinates ordered load/unload.
//!
//! # Feature flags
//!
//! - `tracing-bridge`: bridges `log` records emitted on the hot path through a `tracing`
//!   subscriber, for deployments that standardise on structured tracing output.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod message;
pub mod pattern;
pub mod queue;
pub mod stats;
pub mod stubs;
pub mod subscription;
pub mod testing;

// Re-exports
pub use crate::{
    bus::{Bus, ScopedBusHandle, UnsubscribeHandle},
    config::{BusConfig, DropPolicy},
    error::{BusError, RequestError},
    handler::{MessageHandler, ShareableMessageHandler, TypedMessageHandler},
    lifecycle::{LifecycleManager, Module, ModuleStatus},
    loader::ModuleLoader,
    message::{EmitOptions, Message, Priority},
    pattern::PatternMatcher,
};
