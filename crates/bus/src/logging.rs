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

//! Ambient logging.
//!
//! The bus logs through the `log` facade directly at call sites (`log::warn!`, `log::debug!`,
//! `log::trace!`). This module only wires up a subscriber when the host application wants one:
//! a plain `env_logger`-style filter driven by `RUST_LOG`, or, behind the `tracing-bridge`
//! feature, a `tracing_subscriber::fmt` subscriber that also receives `log` records via
//! `tracing_log`-style bridging.

#[cfg(feature = "tracing-bridge")]
use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber::fmt` subscriber filtered by `RUST_LOG`, and bridges `log`
/// macro call sites through it.
///
/// Intended for host applications that standardise on structured tracing output; library code
/// (including this crate's own hot path) keeps using the `log` facade regardless.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
#[cfg(feature = "tracing-bridge")]
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().map_err(|e| anyhow::anyhow!(e))
}
