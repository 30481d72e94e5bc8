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

//! Event names and payload shapes for the contract between the core and its collaborators.

use serde::Serialize;

pub const SYSTEM_READY: &str = "system.ready";
pub const SYSTEM_SHUTDOWN: &str = "system.shutdown";
pub const SYSTEM_ERROR: &str = "system.error";
pub const SYSTEM_METRICS_REQUEST: &str = "system.metrics.request";
pub const LIFECYCLE_MODULE_REGISTERED: &str = "lifecycle.moduleRegistered";
pub const LIFECYCLE_MODULE_UNHEALTHY: &str = "lifecycle.moduleUnhealthy";
pub const LIFECYCLE_STATUS: &str = "lifecycle.status";
pub const MODULE_LOADED: &str = "module.loaded";
pub const MODULE_UNLOADED: &str = "module.unloaded";
pub const MODULE_LOAD_ERROR: &str = "module.loadError";
pub const MODULE_LOAD: &str = "module.load";
pub const MODULE_UNLOAD: &str = "module.unload";
pub const MODULE_LIST: &str = "module.list";

/// Payload of `system.ready`, emitted once after boot.
#[derive(Clone, Debug, Serialize)]
pub struct SystemReady {
    pub timestamp: u64,
    pub modules: Vec<String>,
    pub mode: String,
}

/// Payload of `system.error`, emitted for any internal fault.
#[derive(Clone, Debug, Serialize)]
pub struct SystemError {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: Option<String>,
    pub size: Option<usize>,
    pub pattern: Option<String>,
    #[serde(rename = "originalEvent")]
    pub original_event: Option<String>,
    pub error: String,
    pub stack: Option<String>,
}

impl SystemError {
    #[must_use]
    pub fn handler_fault(original_event: &str, error: String) -> Self {
        Self {
            kind: "handlerFault".to_owned(),
            event: None,
            size: None,
            pattern: None,
            original_event: Some(original_event.to_owned()),
            error,
            stack: None,
        }
    }

    #[must_use]
    pub fn data_size(event: &str, size: usize) -> Self {
        Self {
            kind: "dataSize".to_owned(),
            event: Some(event.to_owned()),
            size: Some(size),
            pattern: None,
            original_event: None,
            error: "payload exceeded max_data_size".to_owned(),
            stack: None,
        }
    }

    #[must_use]
    pub fn listener_quota(pattern: &str, error: String) -> Self {
        Self {
            kind: "listenerQuota".to_owned(),
            event: None,
            size: None,
            pattern: Some(pattern.to_owned()),
            original_event: None,
            error,
            stack: None,
        }
    }
}

/// Payload of `system.metrics.request`, emitted per reply when metrics are enabled.
#[derive(Clone, Debug, Serialize)]
pub struct SystemMetricsRequest {
    pub event: String,
    #[serde(rename = "responseTime")]
    pub response_time_ms: f64,
    pub success: bool,
}

/// Payload of `lifecycle.moduleRegistered`.
#[derive(Clone, Debug, Serialize)]
pub struct LifecycleModuleRegistered {
    pub name: String,
}

/// Payload of `lifecycle.moduleUnhealthy`.
#[derive(Clone, Debug, Serialize)]
pub struct LifecycleModuleUnhealthy {
    pub name: String,
    pub reason: String,
}

/// Payload of `module.loaded`.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleLoaded {
    pub name: String,
    pub version: String,
}

/// Payload of `module.unloaded`.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleUnloaded {
    pub name: String,
}

/// Payload of `module.loadError`.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleLoadError {
    pub name: String,
    pub error: String,
}
