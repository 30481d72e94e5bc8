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

//! Common test-related helper functions.

use std::{
    future::Future,
    thread,
    time::{Duration, Instant},
};

/// Repeatedly evaluates a condition with a delay until it becomes true or a timeout occurs.
///
/// # Panics
///
/// Panics if the timeout duration is exceeded without the condition being met.
pub fn wait_until<F>(mut condition: F, timeout: Duration)
where
    F: FnMut() -> bool,
{
    let start_time = Instant::now();

    loop {
        if condition() {
            break;
        }

        assert!(start_time.elapsed() <= timeout, "timeout waiting for condition");

        thread::sleep(Duration::from_millis(10));
    }
}

/// Async counterpart to [`wait_until`], for conditions that must themselves be awaited.
///
/// # Panics
///
/// Panics if the timeout duration is exceeded without the condition being met.
pub async fn wait_until_async<F, Fut>(mut condition: F, timeout: Duration)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start_time = Instant::now();

    loop {
        if condition().await {
            break;
        }

        assert!(start_time.elapsed() <= timeout, "timeout waiting for condition");

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
