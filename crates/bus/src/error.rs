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

//! Error taxonomy for the message bus and its collaborators.

use thiserror::Error;

/// Synchronous failures surfaced at the `subscribe`/`emit`/`request` call boundary, and by the
/// lifecycle manager and module loader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("event name must be non-empty and at most {max} characters, was {len}")]
    InvalidEventName { len: usize, max: usize },

    #[error("pattern must be non-empty and at most {max} characters, was {len}")]
    InvalidPattern { len: usize, max: usize },

    #[error("listener quota exceeded for pattern `{pattern}`: {count} >= {max}")]
    ListenerQuotaExceeded {
        pattern: String,
        count: usize,
        max: usize,
    },

    #[error("payload for event `{event}` exceeds max_data_size ({size} > {max})")]
    PayloadTooLarge {
        event: String,
        size: usize,
        max: usize,
    },

    #[error("pending request table is full ({count} >= {max})")]
    PendingRequestQuotaExceeded { count: usize, max: usize },

    #[error("module `{0}` is already registered")]
    DuplicateModule(String),

    #[error("module `{0}` is already loaded")]
    DuplicateLoad(String),

    #[error("no factory registered for module type `{0}`")]
    UnknownModuleType(String),

    #[error("module `{name}` failed to construct: {reason}")]
    ModuleConstructionFailed { name: String, reason: String },

    #[error("module `{0}` is not loaded")]
    ModuleNotLoaded(String),

    #[error("module name must be non-empty")]
    InvalidModuleName,

    #[error("hot reload is disabled")]
    HotReloadDisabled,

    #[error("bus has been shut down")]
    Destroyed,
}

/// The failure modes of a [`crate::bus::Bus::request`] future.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request for `{event}` timed out after {timeout_ms}ms")]
    Timeout { event: String, timeout_ms: u64 },

    #[error("request failed: {0}")]
    Failed(String),

    #[error("bus was shut down before the request completed")]
    Destroyed,
}
