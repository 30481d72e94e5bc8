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

//! Tracks every registered module through its state machine, runs health checks, and
//! coordinates restarts and orderly shutdown.
//!
//! `Module` hooks are synchronous: the only genuinely asynchronous step in this component is the
//! restart-delay wait inside the health-check loop (`tokio::time::sleep`, awaited inline and
//! sequentially, never spawned). That keeps `Module` object-safe and avoids pulling in
//! `async-trait` for a crate whose instances never need to suspend mid-hook.

use std::{cell::RefCell, rc::Rc, time::Duration};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    bus::Bus,
    error::BusError,
    events::{self, LifecycleModuleRegistered, LifecycleModuleUnhealthy},
    message::{EmitOptions, Priority},
};

/// Behaviour a module instance may optionally implement; the lifecycle manager tolerates the
/// absence of any hook (default no-op/healthy implementations are provided).
pub trait Module {
    /// Starts the module. Called once, after registration.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the module failed to start.
    fn start(&self) -> Result<(), String> {
        Ok(())
    }

    /// Stops the module. Tolerant of errors: logged but never fatal to shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the module failed to stop cleanly.
    fn stop(&self) -> Result<(), String> {
        Ok(())
    }

    /// Runs a single health check. `false` or an error marks the module `unhealthy`.
    ///
    /// # Errors
    ///
    /// Returns an error describing the health check failure.
    fn health_check(&self) -> Result<bool, String> {
        Ok(true)
    }

    /// Whether an `unhealthy` verdict should trigger an automatic restart attempt.
    fn auto_restart(&self) -> bool {
        false
    }
}

/// The state-machine status of a registered module.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    #[default]
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
    Failed,
}

struct ModuleRecord {
    instance: Rc<dyn Module>,
    status: ModuleStatus,
    unhealthy: bool,
    started_at: Option<u64>,
    last_health_check: Option<u64>,
    error_history: Vec<String>,
    restart_attempts: u32,
}

/// Per-module status as reported by [`LifecycleManager::system_status`].
#[derive(Clone, Debug, Serialize)]
pub struct ModuleStatusReport {
    pub status: ModuleStatus,
    #[serde(rename = "healthStatus")]
    pub health_status: &'static str,
    #[serde(rename = "startedAt")]
    pub started_at: Option<u64>,
    #[serde(rename = "lastHealthCheck")]
    pub last_health_check: Option<u64>,
    #[serde(rename = "errorCount")]
    pub error_count: usize,
}

/// System-wide status snapshot returned by `lifecycle.status`.
#[derive(Clone, Debug, Serialize)]
pub struct SystemStatus {
    #[serde(rename = "moduleCount")]
    pub module_count: usize,
    #[serde(rename = "healthyModules")]
    pub healthy_modules: usize,
    pub modules: IndexMap<String, ModuleStatusReport>,
}

/// Owns the state machine of every registered module.
#[derive(Debug)]
pub struct LifecycleManager {
    bus: Rc<Bus>,
    modules: RefCell<IndexMap<String, ModuleRecordDebug>>,
    registration_order: RefCell<Vec<String>>,
    max_restart_attempts: u32,
    restart_delay_ms: u64,
    is_shutting_down: std::cell::Cell<bool>,
}

/// `ModuleRecord` wraps an `Rc<dyn Module>`, which isn't `Debug`; this newtype supplies a
/// name-only `Debug` impl so `LifecycleManager` itself can derive `Debug` (required by this
/// crate's `missing_debug_implementations` lint) without printing handler internals.
struct ModuleRecordDebug(ModuleRecord);

impl std::fmt::Debug for ModuleRecordDebug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("status", &self.0.status)
            .field("unhealthy", &self.0.unhealthy)
            .finish()
    }
}

impl LifecycleManager {
    /// Creates a new lifecycle manager bound to `bus`, with bounded restarts of
    /// `max_restart_attempts` spaced `restart_delay_ms` apart.
    ///
    /// Returned as `Rc<Self>` (rather than `Self`) because [`LifecycleManager::register`] needs
    /// to hand a cloned `Rc` into a spawned restart task when a module's initial `start` fails.
    #[must_use]
    pub fn new(bus: Rc<Bus>, max_restart_attempts: u32, restart_delay_ms: u64) -> Rc<Self> {
        Rc::new(Self {
            bus,
            modules: RefCell::new(IndexMap::new()),
            registration_order: RefCell::new(Vec::new()),
            max_restart_attempts,
            restart_delay_ms,
            is_shutting_down: std::cell::Cell::new(false),
        })
    }

    /// Registers `instance` under `name` and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::DuplicateModule`] if `name` is already registered.
    pub fn register(self: &Rc<Self>, name: &str, instance: Rc<dyn Module>) -> Result<(), BusError> {
        if self.modules.borrow().contains_key(name) {
            return Err(BusError::DuplicateModule(name.to_owned()));
        }

        self.modules.borrow_mut().insert(
            name.to_owned(),
            ModuleRecordDebug(ModuleRecord {
                instance,
                status: ModuleStatus::Initialized,
                unhealthy: false,
                started_at: None,
                last_health_check: None,
                error_history: Vec::new(),
                restart_attempts: 0,
            }),
        );
        self.registration_order.borrow_mut().push(name.to_owned());

        let payload = serde_json::to_value(LifecycleModuleRegistered { name: name.to_owned() })
            .unwrap_or(Value::Null);
        let _ = self.bus.emit(events::LIFECYCLE_MODULE_REGISTERED, payload, EmitOptions::default());

        self.start(name);
        Ok(())
    }

    /// Starts (or restarts) the named module's `start` hook, transitioning `starting → running`
    /// on success or `error`/`failed` on failure.
    pub fn start(self: &Rc<Self>, name: &str) {
        let instance = {
            let mut modules = self.modules.borrow_mut();
            let Some(record) = modules.get_mut(name) else {
                return;
            };
            record.0.status = ModuleStatus::Starting;
            record.0.instance.clone()
        };

        match instance.start() {
            Ok(()) => {
                let mut modules = self.modules.borrow_mut();
                if let Some(record) = modules.get_mut(name) {
                    record.0.status = ModuleStatus::Running;
                    record.0.started_at = Some(self.bus.now_ms());
                }
            }
            Err(error) => self.on_start_failure(name, error),
        }
    }

    fn on_start_failure(self: &Rc<Self>, name: &str, error: String) {
        let should_retry = {
            let mut modules = self.modules.borrow_mut();
            let Some(record) = modules.get_mut(name) else {
                return;
            };
            record.0.error_history.push(error);
            record.0.restart_attempts += 1;
            let retry = record.0.restart_attempts < self.max_restart_attempts;
            record.0.status = if retry { ModuleStatus::Error } else { ModuleStatus::Failed };
            retry
        };

        if should_retry {
            log::warn!("module `{name}` failed to start, will retry after {}ms", self.restart_delay_ms);
            let manager = self.clone();
            let name = name.to_owned();
            tokio::task::spawn_local(async move {
                manager.schedule_restart(&name).await;
            });
        } else {
            log::error!("module `{name}` failed to start and exhausted its restart attempts");
        }
    }

    /// Waits `restart_delay_ms` then retries [`LifecycleManager::start`] for `name`, if the
    /// module is still within its restart budget.
    pub async fn schedule_restart(&self, name: &str) {
        tokio::time::sleep(Duration::from_millis(self.restart_delay_ms)).await;
        let within_budget = self
            .modules
            .borrow()
            .get(name)
            .is_some_and(|record| record.0.restart_attempts < self.max_restart_attempts);
        if within_budget {
            self.start(name);
        }
    }

    /// Stops the named module via its `stop` hook, tolerating hook failure.
    pub fn stop(&self, name: &str) {
        let instance = {
            let mut modules = self.modules.borrow_mut();
            let Some(record) = modules.get_mut(name) else {
                return;
            };
            record.0.status = ModuleStatus::Stopping;
            record.0.instance.clone()
        };

        if let Err(error) = instance.stop() {
            log::warn!("module `{name}` failed to stop cleanly: {error}");
        }

        if let Some(record) = self.modules.borrow_mut().get_mut(name) {
            record.0.status = ModuleStatus::Stopped;
        }
    }

    /// Runs one round of health checks across every `running` module.
    ///
    /// Returns the names of modules that should have a restart scheduled by the caller (the
    /// caller drives [`LifecycleManager::schedule_restart`] so this method itself stays
    /// synchronous and reentrant-safe).
    pub fn health_check_round(&self) -> Vec<String> {
        let candidates: Vec<(String, Rc<dyn Module>)> = self
            .modules
            .borrow()
            .iter()
            .filter(|(_, record)| record.0.status == ModuleStatus::Running)
            .map(|(name, record)| (name.clone(), record.0.instance.clone()))
            .collect();

        let now_ms = self.bus.now_ms();
        let mut to_restart = Vec::new();

        for (name, instance) in candidates {
            let healthy = match instance.health_check() {
                Ok(result) => result,
                Err(error) => {
                    if let Some(record) = self.modules.borrow_mut().get_mut(&name) {
                        record.0.error_history.push(error);
                    }
                    false
                }
            };

            if let Some(record) = self.modules.borrow_mut().get_mut(&name) {
                record.0.last_health_check = Some(now_ms);
                record.0.unhealthy = !healthy;
            }

            if !healthy {
                let payload = serde_json::to_value(LifecycleModuleUnhealthy {
                    name: name.clone(),
                    reason: "health_check returned false".to_owned(),
                })
                .unwrap_or(Value::Null);
                let _ = self.bus.emit(events::LIFECYCLE_MODULE_UNHEALTHY, payload, EmitOptions::default());

                if instance.auto_restart() {
                    to_restart.push(name);
                }
            }
        }

        to_restart
    }

    /// Runs [`LifecycleManager::health_check_round`] every `interval_ms`, scheduling restarts for
    /// whatever it returns, until [`LifecycleManager::shutdown`] has been called. Intended to be
    /// spawned once as a long-lived task by the host application.
    pub async fn health_check_loop(&self, interval_ms: u64) {
        while !self.is_shutting_down.get() {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            if self.is_shutting_down.get() {
                break;
            }
            for name in self.health_check_round() {
                self.schedule_restart(&name).await;
            }
        }
    }

    /// Stops every module in reverse registration order, then emits `system.shutdown`.
    pub fn shutdown(&self) {
        self.is_shutting_down.set(true);
        for name in self.registration_order.borrow().iter().rev() {
            self.stop(name);
        }
        let _ = self.bus.emit(events::SYSTEM_SHUTDOWN, Value::Null, EmitOptions::default());
    }

    /// Returns whether [`LifecycleManager::shutdown`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.get()
    }

    /// Returns the current status of every registered module.
    #[must_use]
    pub fn system_status(&self) -> SystemStatus {
        let modules = self.modules.borrow();
        let healthy_modules = modules.values().filter(|record| !record.0.unhealthy).count();
        let report = modules
            .iter()
            .map(|(name, record)| {
                (
                    name.clone(),
                    ModuleStatusReport {
                        status: record.0.status,
                        health_status: if record.0.unhealthy { "unhealthy" } else { "healthy" },
                        started_at: record.0.started_at,
                        last_health_check: record.0.last_health_check,
                        error_count: record.0.error_history.len(),
                    },
                )
            })
            .collect();

        SystemStatus {
            module_count: modules.len(),
            healthy_modules,
            modules: report,
        }
    }

    /// Returns the status of a single module, if registered.
    #[must_use]
    pub fn module_status(&self, name: &str) -> Option<ModuleStatus> {
        self.modules.borrow().get(name).map(|record| record.0.status)
    }

    /// Subscribes this manager to `lifecycle.status` requests and `module.*` events emitted by
    /// the module loader, so that a loaded module is automatically registered and an unloaded one
    /// automatically stopped.
    ///
    /// Kept as a plain method rather than wired in `new` so a host application can choose whether
    /// the manager should observe the bus at all (useful in tests that drive it directly).
    pub fn attach_to_bus(self: &Rc<Self>) -> Result<(), BusError> {
        let manager = self.clone();
        let handler = crate::handler::TypedMessageHandler::<crate::message::Message, _>::from(move |message: &crate::message::Message| {
            if let Some(request_id) = message.request_id {
                let status = manager.system_status();
                let payload = serde_json::to_value(&status).unwrap_or(Value::Null);
                manager.bus.reply(request_id, true, Some(payload), None);
            }
        });
        self.bus.subscribe(
            events::LIFECYCLE_STATUS,
            crate::handler::ShareableMessageHandler::from(Rc::new(handler) as Rc<dyn crate::handler::MessageHandler>),
            Priority::Normal,
            false,
        )?;
        Ok(())
    }
}
