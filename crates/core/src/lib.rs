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

//! Foundational, dependency-light types shared by the CAD message bus.
//!
//! This crate supplies the building blocks the bus crate is built on top of:
//!
//! - A monotonic, strictly-increasing clock (wall-clock or static/simulated).
//! - A 128-bit [`UUID4`] identifier used for message ids, request ids, and subscription ids.
//! - Correctness-check helpers (`design by contract` style validation) shared across the
//!   registration and emission hot paths.
//!
//! Kept deliberately small: nothing here knows about patterns, subscriptions, or modules.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod correctness;
pub mod nanos;
pub mod time;
pub mod uuid;

// Re-exports
pub use crate::{nanos::UnixNanos, time::AtomicTime, uuid::UUID4};
