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

//! Turns a registry of module-type factories into live instances wired to scoped bus handles, in
//! a defined and reversible order.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    bus::{Bus, ScopedBusHandle},
    error::BusError,
    events::{self, ModuleLoadError, ModuleLoaded, ModuleUnloaded, SystemReady},
    lifecycle::{LifecycleManager, Module},
    message::EmitOptions,
};

/// Constructs a module instance given a scoped bus handle and an optional path/config hint.
///
/// A `Box<dyn Fn>` rather than a trait: factories are typically closures capturing a
/// constructor, and there is exactly one operation, so a trait would add a layer of indirection
/// with no behaviour to vary beyond the call itself.
pub type ModuleFactory = Box<dyn Fn(ScopedBusHandle, Option<&str>) -> Result<Rc<dyn Module>, String>>;

struct LoadedModule {
    instance: Rc<dyn Module>,
    version: String,
    loaded_at: u64,
}

/// Registers module-type factories and coordinates instantiating, tearing down, and reloading
/// module instances, delegating their state tracking to a [`LifecycleManager`].
pub struct ModuleLoader {
    bus: Rc<Bus>,
    lifecycle: Rc<LifecycleManager>,
    factories: RefCell<IndexMap<String, ModuleFactory>>,
    loaded: RefCell<IndexMap<String, LoadedModule>>,
    load_order: RefCell<Vec<String>>,
    hot_reload_enabled: bool,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("factories", &self.factories.borrow().keys().collect::<Vec<_>>())
            .field("load_order", &self.load_order.borrow())
            .field("hot_reload_enabled", &self.hot_reload_enabled)
            .finish()
    }
}

/// Outcome of [`ModuleLoader::load_many`].
#[derive(Debug, Default, Serialize)]
pub struct LoadManyReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// One row of [`ModuleLoader::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ModuleListEntry {
    pub name: String,
    pub status: &'static str,
    #[serde(rename = "loadedAt")]
    pub loaded_at: u64,
    pub version: String,
}

impl ModuleLoader {
    /// Creates a new loader bound to `bus` and `lifecycle`.
    #[must_use]
    pub fn new(bus: Rc<Bus>, lifecycle: Rc<LifecycleManager>, hot_reload_enabled: bool) -> Self {
        Self {
            bus,
            lifecycle,
            factories: RefCell::new(IndexMap::new()),
            loaded: RefCell::new(IndexMap::new()),
            load_order: RefCell::new(Vec::new()),
            hot_reload_enabled,
        }
    }

    /// Registers a factory for module type `name`.
    pub fn register_type(&self, name: &str, factory: ModuleFactory) {
        self.factories.borrow_mut().insert(name.to_owned(), factory);
    }

    /// Instantiates module `name` (which must have a registered factory), wires it to a scoped
    /// bus handle, registers it with the lifecycle manager, and records it as loaded.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::DuplicateLoad`] if already loaded, [`BusError::UnknownModuleType`] if
    /// no factory is registered for `name`, and propagates any error the factory or the
    /// lifecycle manager returns.
    pub fn load(&self, name: &str, path: Option<&str>) -> Result<(), BusError> {
        if self.loaded.borrow().contains_key(name) {
            return Err(BusError::DuplicateLoad(name.to_owned()));
        }

        let result = self.try_load(name, path);
        if let Err(ref error) = result {
            let payload = serde_json::to_value(ModuleLoadError {
                name: name.to_owned(),
                error: error.to_string(),
            })
            .unwrap_or(Value::Null);
            let _ = self.bus.emit(events::MODULE_LOAD_ERROR, payload, EmitOptions::default());
        }
        result
    }

    fn try_load(&self, name: &str, path: Option<&str>) -> Result<(), BusError> {
        let factories = self.factories.borrow();
        let factory = factories.get(name).ok_or_else(|| BusError::UnknownModuleType(name.to_owned()))?;
        let scoped = self.bus.scoped_handle(name)?;
        let instance = factory(scoped, path)
            .map_err(|reason| BusError::ModuleConstructionFailed { name: name.to_owned(), reason })?;
        drop(factories);

        self.lifecycle.register(name, instance.clone())?;

        self.loaded.borrow_mut().insert(
            name.to_owned(),
            LoadedModule {
                instance,
                version: "0.0.0".to_owned(),
                loaded_at: self.bus.now_ms(),
            },
        );
        self.load_order.borrow_mut().push(name.to_owned());

        let payload = serde_json::to_value(ModuleLoaded {
            name: name.to_owned(),
            version: "0.0.0".to_owned(),
        })
        .unwrap_or(Value::Null);
        let _ = self.bus.emit(events::MODULE_LOADED, payload, EmitOptions::default());

        Ok(())
    }

    /// Unregisters `name` from the lifecycle manager and removes it from the registry and
    /// `load_order`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ModuleNotLoaded`] if `name` is not currently loaded.
    pub fn unload(&self, name: &str) -> Result<(), BusError> {
        if !self.loaded.borrow().contains_key(name) {
            return Err(BusError::ModuleNotLoaded(name.to_owned()));
        }

        self.lifecycle.stop(name);
        self.loaded.borrow_mut().shift_remove(name);
        self.load_order.borrow_mut().retain(|loaded| loaded != name);

        let payload = serde_json::to_value(ModuleUnloaded { name: name.to_owned() }).unwrap_or(Value::Null);
        let _ = self.bus.emit(events::MODULE_UNLOADED, payload, EmitOptions::default());
        Ok(())
    }

    /// `unload` then `load`, only when hot reload is enabled at construction.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::HotReloadDisabled`] if hot reload was not enabled, otherwise
    /// propagates errors from `unload`/`load`.
    pub fn reload(&self, name: &str, path: Option<&str>) -> Result<(), BusError> {
        if !self.hot_reload_enabled {
            return Err(BusError::HotReloadDisabled);
        }
        self.unload(name)?;
        self.load(name, path)
    }

    /// Loads every name in `names`, best-effort and sequential: a failure does not stop the
    /// rest. This is the batch-boot entry point, so once every name has been attempted it emits
    /// `system.ready` once, carrying the modules that ended up loaded.
    #[must_use]
    pub fn load_many(&self, names: &[&str]) -> LoadManyReport {
        let mut report = LoadManyReport::default();
        for name in names {
            match self.load(name, None) {
                Ok(()) => report.loaded.push((*name).to_owned()),
                Err(error) => report.failed.push(((*name).to_owned(), error.to_string())),
            }
        }

        let config = self.bus.config();
        let mode = if config.enable_priority_queue && config.adaptive_processing {
            "production"
        } else {
            "default"
        };
        let payload = serde_json::to_value(SystemReady {
            timestamp: self.bus.now_ms(),
            modules: self.load_order(),
            mode: mode.to_owned(),
        })
        .unwrap_or(Value::Null);
        let _ = self.bus.emit(events::SYSTEM_READY, payload, EmitOptions::default());

        report
    }

    /// Unloads every loaded module in reverse `load_order`, swallowing per-module errors.
    pub fn cleanup(&self) {
        let order: Vec<String> = self.load_order.borrow().iter().rev().cloned().collect();
        for name in order {
            if let Err(error) = self.unload(&name) {
                log::warn!("error unloading module `{name}` during cleanup: {error}");
            }
        }
    }

    /// Lists every currently loaded module.
    #[must_use]
    pub fn list(&self) -> Vec<ModuleListEntry> {
        self.loaded
            .borrow()
            .iter()
            .map(|(name, loaded)| ModuleListEntry {
                name: name.clone(),
                status: self
                    .lifecycle
                    .module_status(name)
                    .map_or("unknown", status_label),
                loaded_at: loaded.loaded_at,
                version: loaded.version.clone(),
            })
            .collect()
    }

    /// Returns the load order (oldest first) of currently loaded modules.
    #[must_use]
    pub fn load_order(&self) -> Vec<String> {
        self.load_order.borrow().clone()
    }

    /// Subscribes this loader to `module.load`, `module.unload`, and `module.list` requests.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ListenerQuotaExceeded`] if any of the three subscriptions would
    /// exceed `max_listeners_per_event` (only possible if this is called more than once per bus).
    pub fn attach_to_bus(self: &Rc<Self>) -> Result<(), BusError> {
        use crate::{
            handler::{MessageHandler, ShareableMessageHandler, TypedMessageHandler},
            message::{Message, Priority},
        };

        let loader = self.clone();
        let load_handler = TypedMessageHandler::<Message, _>::from(move |message: &Message| {
            let Some(request_id) = message.request_id else { return };
            let name = message.data["name"].as_str().unwrap_or_default();
            match loader.load(name, None) {
                Ok(()) => loader.bus.reply(request_id, true, Some(serde_json::json!({"name": name, "loaded": true})), None),
                Err(error) => loader.bus.reply(request_id, false, None, Some(error.to_string())),
            }
        });
        self.bus.subscribe(
            events::MODULE_LOAD,
            ShareableMessageHandler::from(Rc::new(load_handler) as Rc<dyn MessageHandler>),
            Priority::Normal,
            false,
        )?;

        let loader = self.clone();
        let unload_handler = TypedMessageHandler::<Message, _>::from(move |message: &Message| {
            let Some(request_id) = message.request_id else { return };
            let name = message.data["name"].as_str().unwrap_or_default();
            match loader.unload(name) {
                Ok(()) => {
                    loader.bus.reply(request_id, true, Some(serde_json::json!({"name": name, "unloaded": true})), None);
                }
                Err(error) => loader.bus.reply(request_id, false, None, Some(error.to_string())),
            }
        });
        self.bus.subscribe(
            events::MODULE_UNLOAD,
            ShareableMessageHandler::from(Rc::new(unload_handler) as Rc<dyn MessageHandler>),
            Priority::Normal,
            false,
        )?;

        let loader = self.clone();
        let list_handler = TypedMessageHandler::<Message, _>::from(move |message: &Message| {
            let Some(request_id) = message.request_id else { return };
            let payload = serde_json::to_value(loader.list()).unwrap_or(Value::Null);
            loader.bus.reply(request_id, true, Some(payload), None);
        });
        self.bus.subscribe(
            events::MODULE_LIST,
            ShareableMessageHandler::from(Rc::new(list_handler) as Rc<dyn MessageHandler>),
            Priority::Normal,
            false,
        )?;

        Ok(())
    }
}

fn status_label(status: crate::lifecycle::ModuleStatus) -> &'static str {
    use crate::lifecycle::ModuleStatus as S;
    match status {
        S::Initialized => "initialized",
        S::Starting => "starting",
        S::Running => "running",
        S::Stopping => "stopping",
        S::Stopped => "stopped",
        S::Error => "error",
        S::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::config::BusConfig;

    struct NoopModule;
    impl Module for NoopModule {}

    fn factory() -> ModuleFactory {
        Box::new(|_scoped, _path| Ok(Rc::new(NoopModule) as Rc<dyn Module>))
    }

    fn loader() -> (Rc<Bus>, ModuleLoader) {
        let bus = Bus::new(BusConfig::default());
        let lifecycle = LifecycleManager::new(bus.clone(), 3, 10);
        (bus.clone(), ModuleLoader::new(bus, lifecycle, true))
    }

    #[rstest]
    fn test_load_records_load_order() {
        let (_bus, loader) = loader();
        loader.register_type("geometry", factory());
        loader.load("geometry", None).unwrap();
        assert_eq!(loader.load_order(), vec!["geometry".to_owned()]);
    }

    #[rstest]
    fn test_duplicate_load_is_rejected() {
        let (_bus, loader) = loader();
        loader.register_type("geometry", factory());
        loader.load("geometry", None).unwrap();
        assert!(matches!(loader.load("geometry", None), Err(BusError::DuplicateLoad(_))));
    }

    #[rstest]
    fn test_unknown_module_type_is_rejected() {
        let (_bus, loader) = loader();
        assert!(matches!(loader.load("ghost", None), Err(BusError::UnknownModuleType(_))));
    }

    #[rstest]
    fn test_unload_removes_from_registry() {
        let (_bus, loader) = loader();
        loader.register_type("geometry", factory());
        loader.load("geometry", None).unwrap();
        loader.unload("geometry").unwrap();
        assert!(loader.load_order().is_empty());
        assert!(loader.list().is_empty());
    }

    #[rstest]
    fn test_reload_disabled_is_rejected() {
        let bus = Bus::new(BusConfig::default());
        let lifecycle = LifecycleManager::new(bus.clone(), 3, 10);
        let loader = ModuleLoader::new(bus, lifecycle, false);
        loader.register_type("geometry", factory());
        loader.load("geometry", None).unwrap();
        assert!(matches!(loader.reload("geometry", None), Err(BusError::HotReloadDisabled)));
    }

    #[rstest]
    fn test_cleanup_unloads_in_reverse_order() {
        let (_bus, loader) = loader();
        loader.register_type("storage", factory());
        loader.register_type("geometry", factory());
        loader.load("storage", None).unwrap();
        loader.load("geometry", None).unwrap();
        loader.cleanup();
        assert!(loader.load_order().is_empty());
    }

    #[rstest]
    fn test_load_many_is_best_effort() {
        let (_bus, loader) = loader();
        loader.register_type("geometry", factory());
        let report = loader.load_many(&["geometry", "ghost"]);
        assert_eq!(report.loaded, vec!["geometry".to_owned()]);
        assert_eq!(report.failed.len(), 1);
    }

    #[rstest]
    fn test_load_many_emits_system_ready() {
        let (bus, loader) = loader();
        let saved = crate::stubs::get_message_saving_handler(None);
        bus.subscribe(events::SYSTEM_READY, saved.clone(), crate::message::Priority::Normal, false).unwrap();

        loader.register_type("geometry", factory());
        loader.load_many(&["geometry"]);

        let messages = crate::stubs::get_saved_messages(&saved);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data["modules"], serde_json::json!(["geometry"]));
    }

    #[tokio::test]
    async fn test_attach_to_bus_serves_module_list_request() {
        let bus = Bus::new(BusConfig::default());
        let lifecycle = LifecycleManager::new(bus.clone(), 3, 10);
        let loader = Rc::new(ModuleLoader::new(bus.clone(), lifecycle, true));
        loader.register_type("geometry", factory());
        loader.load("geometry", None).unwrap();
        loader.attach_to_bus().unwrap();

        let result = bus.request(events::MODULE_LIST, Value::Null, None).await.unwrap();
        let entries = result.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["name"], "geometry");
    }

    #[tokio::test]
    async fn test_attach_to_bus_serves_module_load_request() {
        let bus = Bus::new(BusConfig::default());
        let lifecycle = LifecycleManager::new(bus.clone(), 3, 10);
        let loader = Rc::new(ModuleLoader::new(bus.clone(), lifecycle, true));
        loader.register_type("geometry", factory());
        loader.attach_to_bus().unwrap();

        let result = bus
            .request(events::MODULE_LOAD, serde_json::json!({"name": "geometry"}), None)
            .await
            .unwrap();
        assert_eq!(result["loaded"], true);
        assert_eq!(loader.load_order(), vec!["geometry".to_owned()]);
    }
}
