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

//! The message bus core: subscriber registry, priority queues, backpressure, request/reply
//! correlation, and statistics.
//!
//! `Bus` is single-threaded and cooperative: every method takes `&self` (fields use interior
//! mutability) so a `Bus` is shared as `Rc<Bus>` rather than `Rc<RefCell<Bus>>`, which would
//! force every caller to juggle an outer borrow around calls that may themselves re-enter the
//! bus (a handler that emits from inside `deliver`). `subscribe` takes `self: &Rc<Self>`
//! specifically so the returned [`UnsubscribeHandle`] can hold a [`Weak`] back-reference and be
//! invoked independently of the `Bus` value that created it, long after the call that produced it
//! has returned.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use ahash::AHashMap;
use cadbus_core::UUID4;
use indexmap::IndexMap;
use serde_json::Value;
use ustr::Ustr;

use crate::{
    config::BusConfig,
    error::{BusError, RequestError},
    events::{self, SystemError, SystemMetricsRequest},
    handler::ShareableMessageHandler,
    message::{EmitOptions, Message, Priority},
    pattern::{self, PatternMatcher},
    queue::{EnqueueOutcome, PriorityQueues},
    stats::{SnapshotInputs, Stats, StatsSnapshot},
    subscription::Subscription,
};

/// Maximum length of an event name, in bytes. Shares [`pattern::MAX_PATTERN_LEN`]: an event
/// name is itself a valid (star-free) pattern.
const MAX_EVENT_LEN: usize = pattern::MAX_PATTERN_LEN;

/// A handler execution slower than this is logged as a slow handler.
const SLOW_HANDLER_NANOS: u64 = 50_000_000;

/// Outcome delivered to a `request` future when its pending entry is resolved other than by a
/// successful reply.
#[derive(Debug, Clone)]
enum PendingOutcome {
    Failed(String),
    Destroyed,
}

type PendingReply = Result<Value, PendingOutcome>;

struct PendingRequest {
    sender: tokio::sync::oneshot::Sender<PendingReply>,
    event: String,
    start: Instant,
}

/// The message bus.
pub struct Bus {
    config: BusConfig,
    subscriptions: RefCell<IndexMap<Ustr, Vec<Rc<Subscription>>>>,
    pattern_matcher: PatternMatcher,
    queues: PriorityQueues,
    pending: RefCell<AHashMap<UUID4, PendingRequest>>,
    stats: Stats,
    is_processing: Cell<bool>,
    is_shutdown: Cell<bool>,
    next_seq: Cell<u64>,
    start: Instant,
    /// Messages emitted by a handler while already inside `deliver` (immediate-dispatch mode
    /// has no queue to land in), held back until the outer `deliver` call returns so a nested
    /// `emit` never recurses into `deliver` mid-iteration.
    deferred: RefCell<VecDeque<Message>>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.config)
            .field("listeners", &self.total_listener_count())
            .field("pending", &self.pending.borrow().len())
            .field("queued", &self.queues.total_len())
            .field("shutdown", &self.is_shutdown.get())
            .finish()
    }
}

impl Bus {
    /// Creates a new bus with the given configuration.
    #[must_use]
    pub fn new(config: BusConfig) -> Rc<Self> {
        Rc::new(Self {
            pattern_matcher: PatternMatcher::new(config.pattern_cache_capacity),
            queues: PriorityQueues::new(
                config.max_queue_size,
                config.drop_policy,
                config.enable_backpressure,
                config.backpressure_threshold,
            ),
            subscriptions: RefCell::new(IndexMap::new()),
            pending: RefCell::new(AHashMap::new()),
            stats: Stats::new(),
            is_processing: Cell::new(false),
            is_shutdown: Cell::new(false),
            next_seq: Cell::new(0),
            start: Instant::now(),
            deferred: RefCell::new(VecDeque::new()),
            config,
        })
    }

    /// Creates a new bus with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Rc<Self> {
        Self::new(BusConfig::default())
    }

    /// Milliseconds elapsed since this bus was constructed. Used to stamp messages and
    /// subscriptions; monotonic, not wall-clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    // ---------------------------------------------------------------------------------------
    // Subscription
    // ---------------------------------------------------------------------------------------

    /// Subscribes `handler` to `pattern` at the given `priority`. If `once` is set the
    /// subscription is removed immediately after its first matched delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidPattern`] if `pattern` is empty or too long, and
    /// [`BusError::ListenerQuotaExceeded`] if the pattern already carries
    /// `max_listeners_per_event` subscriptions.
    pub fn subscribe(
        self: &Rc<Self>,
        pattern: &str,
        handler: ShareableMessageHandler,
        priority: Priority,
        once: bool,
    ) -> Result<UnsubscribeHandle, BusError> {
        if self.is_shutdown.get() {
            return Err(BusError::Destroyed);
        }
        pattern::validate_pattern(pattern)?;
        let pattern_key = Ustr::from(pattern);
        let handler_id = handler.id();

        {
            let subs = self.subscriptions.borrow();
            if let Some(existing) = subs.get(&pattern_key) {
                if self.config.enable_duplicate_handler_check
                    && existing.iter().any(|s| s.same_key(&pattern_key, &handler_id))
                {
                    log::warn!("duplicate subscription for handler `{handler_id}` on pattern `{pattern}`");
                    return Ok(UnsubscribeHandle::noop());
                }
                if existing.len() >= self.config.max_listeners_per_event {
                    let count = existing.len();
                    let max = self.config.max_listeners_per_event;
                    drop(subs);
                    self.emit_system_error(SystemError::listener_quota(
                        pattern,
                        format!("max_listeners_per_event ({max}) exceeded"),
                    ));
                    return Err(BusError::ListenerQuotaExceeded {
                        pattern: pattern.to_owned(),
                        count,
                        max,
                    });
                }
            }
        }

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let subscription = Subscription::new(pattern_key, handler, priority, once, self.now_ms(), seq);
        let subscription_id = subscription.id;

        let total_listeners = {
            let mut subs = self.subscriptions.borrow_mut();
            subs.entry(pattern_key).or_default().push(Rc::new(subscription));
            subs.values().map(Vec::len).sum()
        };
        self.stats.record_listener_count(total_listeners);

        Ok(UnsubscribeHandle {
            bus: Rc::downgrade(self),
            pattern: pattern_key,
            subscription_id,
        })
    }

    /// Shorthand for [`Bus::subscribe`] with `once = true`.
    ///
    /// # Errors
    ///
    /// Same as [`Bus::subscribe`].
    pub fn subscribe_once(
        self: &Rc<Self>,
        pattern: &str,
        handler: ShareableMessageHandler,
        priority: Priority,
    ) -> Result<UnsubscribeHandle, BusError> {
        self.subscribe(pattern, handler, priority, true)
    }

    /// Removes the subscription matching `handler_id` on `pattern`. No-op if absent.
    pub fn unsubscribe(&self, pattern: &str, handler_id: Ustr) {
        let pattern_key = Ustr::from(pattern);
        let mut subs = self.subscriptions.borrow_mut();
        if let Some(entry) = subs.get_mut(&pattern_key) {
            entry.retain(|s| s.handler_id != handler_id);
            if entry.is_empty() {
                subs.shift_remove(&pattern_key);
            }
        }
    }

    fn remove_subscription_by_id(&self, pattern: Ustr, subscription_id: Ustr) {
        let mut subs = self.subscriptions.borrow_mut();
        if let Some(entry) = subs.get_mut(&pattern) {
            entry.retain(|s| s.id != subscription_id);
            if entry.is_empty() {
                subs.shift_remove(&pattern);
            }
        }
    }

    /// Returns whether a subscription for `handler_id` exists on `pattern`.
    #[must_use]
    pub fn is_subscribed(&self, pattern: &str, handler_id: Ustr) -> bool {
        self.subscriptions
            .borrow()
            .get(&Ustr::from(pattern))
            .is_some_and(|subs| subs.iter().any(|s| s.handler_id == handler_id))
    }

    /// Returns the number of subscriptions whose pattern matches `event`.
    #[must_use]
    pub fn subscriptions_count(&self, event: &str) -> usize {
        self.matching_subscriptions(event).len()
    }

    /// Returns the total number of subscriptions across every pattern.
    #[must_use]
    pub fn total_listener_count(&self) -> usize {
        self.subscriptions.borrow().values().map(Vec::len).sum()
    }

    /// Collects every subscription whose pattern matches `event`, stable-sorted by descending
    /// priority with ties broken by registration order.
    ///
    /// Returns `Rc` handles into the registry rather than owned copies: `Subscription`'s
    /// counters are `Cell`s, so a deep clone would let `deliver` record invocations on a
    /// throwaway copy instead of the entry actually sitting in `subscriptions`.
    fn matching_subscriptions(&self, event: &str) -> Vec<Rc<Subscription>> {
        let mut matches: Vec<Rc<Subscription>> = {
            let subs = self.subscriptions.borrow();
            subs.iter()
                .filter(|(pattern, _)| self.pattern_matcher.matches(event, pattern.as_str()))
                .flat_map(|(_, subs)| subs.iter().cloned())
                .collect()
        };
        matches.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.seq.cmp(&b.seq)));
        matches
    }

    // ---------------------------------------------------------------------------------------
    // Emit / dispatch
    // ---------------------------------------------------------------------------------------

    /// Publishes `data` under `event`. Returns the id of the resulting message.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidEventName`] for an empty or overlong event name, and
    /// [`BusError::PayloadTooLarge`] if the encoded payload exceeds `max_data_size`.
    pub fn emit(&self, event: &str, data: Value, options: EmitOptions) -> Result<UUID4, BusError> {
        if self.is_shutdown.get() {
            return Err(BusError::Destroyed);
        }
        if event.is_empty() || event.len() > MAX_EVENT_LEN {
            return Err(BusError::InvalidEventName {
                len: event.len(),
                max: MAX_EVENT_LEN,
            });
        }

        let message = Message::new(Ustr::from(event), data, self.now_ms(), options);
        let size = message.data_size();

        if size > self.config.max_data_size {
            self.stats.messages_dropped.set(self.stats.messages_dropped.get() + 1);
            self.emit_system_error(SystemError::data_size(event, size));
            return Err(BusError::PayloadTooLarge {
                event: event.to_owned(),
                size,
                max: self.config.max_data_size,
            });
        }
        if size > self.config.warn_data_size {
            self.stats.large_message_warnings.set(self.stats.large_message_warnings.get() + 1);
            log::warn!("message `{event}` payload size {size} exceeds warn_data_size");
        }

        self.stats.messages_sent.set(self.stats.messages_sent.get() + 1);
        let id = message.id;

        if self.config.enable_priority_queue {
            let drop_rate = ratio(self.stats.messages_dropped.get(), self.stats.messages_sent.get());
            self.queues.maybe_update_pressure(drop_rate);
            match self.queues.enqueue(message) {
                EnqueueOutcome::Enqueued => {
                    if !self.config.adaptive_processing {
                        self.drain();
                    }
                }
                EnqueueOutcome::DroppedByBackpressure | EnqueueOutcome::DroppedByQuota => {
                    self.stats.messages_dropped.set(self.stats.messages_dropped.get() + 1);
                }
            }
        } else if self.is_processing.get() {
            // Already inside an outer `deliver` on this same immediate-dispatch path (e.g. a
            // handler's own `emit` from inside a panic handler): defer rather than recurse.
            self.deferred.borrow_mut().push_back(message);
        } else {
            self.is_processing.set(true);
            self.deliver(&message);
            while let Some(next) = self.deferred.borrow_mut().pop_front() {
                self.deliver(&next);
            }
            self.is_processing.set(false);
        }

        if self.config.enable_logging {
            log::debug!("emitted `{event}` ({id})");
        }

        Ok(id)
    }

    /// Drains the priority queues to empty, delivering one message at a time. Guarded by
    /// `is_processing`, the same flag the immediate-dispatch branch of `emit` uses: a call made
    /// while a drain (or an immediate delivery) is already in progress is a no-op, which is what
    /// lets a handler's nested `emit` defer its delivery to later in the same pass instead of
    /// recursing.
    ///
    /// This is the reference (non-adaptive) drain variant; see [`Bus::drain_adaptive`] for the
    /// bounded-batch alternative used by the production preset.
    pub fn drain(&self) {
        if self.is_processing.get() {
            return;
        }
        self.is_processing.set(true);
        while let Some(message) = self.queues.pop_highest() {
            self.deliver(&message);
        }
        self.is_processing.set(false);
    }

    /// Adaptive-batch drain: processes messages in batches sized by `max(10, batch_size * (1 -
    /// pressure_level))`, bounded by a soft `max_processing_time_ms` budget per batch, yielding
    /// to the scheduler between batches (the yield is lengthened under higher pressure). Intended
    /// to be driven by the host application's own scheduler loop (e.g. spawned once per bus and
    /// left running) rather than called per-emission, since unlike [`Bus::drain`] it is async.
    pub async fn drain_adaptive(&self) {
        if self.is_processing.get() {
            return;
        }
        self.is_processing.set(true);

        while self.queues.total_len() > 0 {
            let pressure = self.queues.pressure_level();
            let batch_size = ((self.config.batch_size as f64) * (1.0 - pressure)).max(10.0) as usize;
            let deadline = Instant::now() + Duration::from_millis(self.config.max_processing_time_ms);

            let mut processed = 0;
            while processed < batch_size && Instant::now() < deadline {
                let Some(message) = self.queues.pop_highest() else {
                    break;
                };
                self.deliver(&message);
                processed += 1;
            }

            let yield_ms = 1 + (pressure * 4.0) as u64;
            tokio::time::sleep(Duration::from_millis(yield_ms)).await;
        }

        self.is_processing.set(false);
    }

    /// Dispatches one message to every matching subscription, in priority then registration
    /// order, containing any handler panic so the remaining subscribers still run.
    fn deliver(&self, message: &Message) {
        let subscriptions = self.matching_subscriptions(message.event.as_str());

        for subscription in &subscriptions {
            let start = Instant::now();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                subscription.handler.0.handle(message as &dyn std::any::Any);
            }));
            let exec_nanos = start.elapsed().as_nanos() as u64;
            subscription.record_invocation(exec_nanos);

            if exec_nanos > SLOW_HANDLER_NANOS && self.config.enable_logging {
                log::warn!(
                    "slow handler `{}` took {:.1}ms handling `{}`",
                    subscription.handler_id,
                    exec_nanos as f64 / 1_000_000.0,
                    message.event
                );
            }

            if let Err(panic) = outcome {
                self.stats.errors_caught.set(self.stats.errors_caught.get() + 1);
                if message.event.as_str() != events::SYSTEM_ERROR {
                    self.emit_system_error(SystemError::handler_fault(
                        message.event.as_str(),
                        panic_message(&panic),
                    ));
                }
            }

            if subscription.once {
                self.remove_subscription_by_id(subscription.pattern, subscription.id);
            }
        }

        self.stats.messages_received.set(self.stats.messages_received.get() + 1);
    }

    fn emit_system_error(&self, error: SystemError) {
        let payload = serde_json::to_value(&error).unwrap_or(Value::Null);
        let _ = self.emit(
            events::SYSTEM_ERROR,
            payload,
            EmitOptions {
                priority: Some(Priority::High),
                ..Default::default()
            },
        );
    }

    // ---------------------------------------------------------------------------------------
    // Request / reply
    // ---------------------------------------------------------------------------------------

    /// Emits `event` carrying a fresh `request_id` at high priority, and awaits the correlated
    /// [`Bus::reply`], racing it against `timeout_ms` (clamped to `max_timeout_ms`, defaulting to
    /// `default_timeout_ms`).
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Timeout`] if no reply arrives in time, [`RequestError::Failed`] if
    /// the pending-request table is full or the reply carried `success: false`, and
    /// [`RequestError::Destroyed`] if the bus is shut down before a reply arrives.
    pub async fn request(
        &self,
        event: &str,
        data: Value,
        timeout_ms: Option<u64>,
    ) -> Result<Value, RequestError> {
        if self.is_shutdown.get() {
            return Err(RequestError::Destroyed);
        }

        {
            let pending = self.pending.borrow();
            if pending.len() >= self.config.max_pending_requests {
                let error = BusError::PendingRequestQuotaExceeded {
                    count: pending.len(),
                    max: self.config.max_pending_requests,
                };
                return Err(RequestError::Failed(error.to_string()));
            }
        }

        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms).min(self.config.max_timeout_ms);
        let request_id = UUID4::new();
        let (sender, receiver) = tokio::sync::oneshot::channel();

        {
            let mut pending = self.pending.borrow_mut();
            pending.insert(
                request_id,
                PendingRequest {
                    sender,
                    event: event.to_owned(),
                    start: Instant::now(),
                },
            );
            self.stats.record_pending_count(pending.len());
        }
        self.stats.requests_sent.set(self.stats.requests_sent.get() + 1);

        if let Err(error) = self.emit(
            event,
            data,
            EmitOptions {
                priority: Some(Priority::High),
                request_id: Some(request_id),
                ..Default::default()
            },
        ) {
            self.pending.borrow_mut().remove(&request_id);
            return Err(RequestError::Failed(error.to_string()));
        }

        tokio::select! {
            result = receiver => match result {
                Ok(Ok(value)) => {
                    self.stats.requests_completed.set(self.stats.requests_completed.get() + 1);
                    Ok(value)
                }
                Ok(Err(PendingOutcome::Failed(message))) => {
                    self.stats.requests_failed.set(self.stats.requests_failed.get() + 1);
                    Err(RequestError::Failed(message))
                }
                Ok(Err(PendingOutcome::Destroyed)) | Err(_) => {
                    self.stats.requests_failed.set(self.stats.requests_failed.get() + 1);
                    Err(RequestError::Destroyed)
                }
            },
            () = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                self.pending.borrow_mut().remove(&request_id);
                self.stats.requests_timed_out.set(self.stats.requests_timed_out.get() + 1);
                Err(RequestError::Timeout { event: event.to_owned(), timeout_ms })
            }
        }
    }

    /// Resolves or rejects the pending request identified by `request_id`. No-ops, with a
    /// warning, for an unknown or already-resolved `request_id`.
    pub fn reply(&self, request_id: UUID4, success: bool, result: Option<Value>, error: Option<String>) {
        let Some(pending) = self.pending.borrow_mut().remove(&request_id) else {
            log::warn!("reply for unknown request_id `{request_id}`");
            return;
        };

        let response_time_ms = pending.start.elapsed().as_secs_f64() * 1000.0;
        let outcome = if success {
            Ok(result.unwrap_or(Value::Null))
        } else {
            Err(PendingOutcome::Failed(error.unwrap_or_else(|| "Request failed".to_owned())))
        };
        let success = outcome.is_ok();
        let _ = pending.sender.send(outcome);

        if self.config.enable_metrics {
            let metrics = SystemMetricsRequest {
                event: pending.event,
                response_time_ms,
                success,
            };
            let payload = serde_json::to_value(&metrics).unwrap_or(Value::Null);
            let _ = self.emit(
                events::SYSTEM_METRICS_REQUEST,
                payload,
                EmitOptions {
                    priority: Some(Priority::Low),
                    ..Default::default()
                },
            );
        }
    }

    /// Returns the number of in-flight (unresolved) requests.
    #[must_use]
    pub fn pending_request_count(&self) -> usize {
        self.pending.borrow().len()
    }

    // ---------------------------------------------------------------------------------------
    // Statistics / shutdown / scoping
    // ---------------------------------------------------------------------------------------

    /// Returns a (possibly cached, up to 100ms old) snapshot of counters, derived rates, and
    /// the health score.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(SnapshotInputs {
            total_queued: self.queues.total_len(),
            pending_requests: self.pending.borrow().len(),
            pressure_level: self.queues.pressure_level(),
            max_queue_size: self.config.max_queue_size,
            max_pending_requests: self.config.max_pending_requests,
            uptime: self.start.elapsed(),
        })
    }

    /// Returns this bus's configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Rejects every pending request with a terminal error, then clears the queues, the
    /// subscription registry, and the pattern cache. Subsequent operations on this bus return
    /// [`BusError::Destroyed`] / [`RequestError::Destroyed`] rather than panicking, but the bus
    /// should not otherwise be reused.
    pub fn shutdown(&self) {
        self.is_shutdown.set(true);
        self.is_processing.set(false);

        for (_, pending) in self.pending.borrow_mut().drain() {
            let _ = pending.sender.send(Err(PendingOutcome::Destroyed));
        }

        self.queues.clear();
        self.subscriptions.borrow_mut().clear();
        self.pattern_matcher.clear_cache();
    }

    /// Returns whether [`Bus::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.get()
    }

    /// Creates a [`ScopedBusHandle`] that tags every `emit` issued through it with
    /// `source = module_name`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidModuleName`] if `module_name` is empty.
    pub fn scoped_handle(self: &Rc<Self>, module_name: &str) -> Result<ScopedBusHandle, BusError> {
        if module_name.is_empty() {
            return Err(BusError::InvalidModuleName);
        }
        Ok(ScopedBusHandle {
            bus: self.clone(),
            module_name: module_name.to_owned(),
        })
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

/// An independently-callable handle returned by `subscribe`, usable to remove that one
/// subscription at any later point regardless of the bus's own lifetime.
#[derive(Clone, Debug)]
pub struct UnsubscribeHandle {
    bus: Weak<Bus>,
    pattern: Ustr,
    subscription_id: Ustr,
}

impl UnsubscribeHandle {
    fn noop() -> Self {
        Self {
            bus: Weak::new(),
            pattern: Ustr::from(""),
            subscription_id: Ustr::from(""),
        }
    }

    /// Removes the subscription this handle was issued for. A second call, or a call after the
    /// bus has been dropped or shut down, is a harmless no-op.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove_subscription_by_id(self.pattern, self.subscription_id);
        }
    }
}

/// A façade over a [`Bus`] that tags every `emit` issued through it with a fixed `source` module
/// name. Returned by [`Bus::scoped_handle`]; this is the handle a loaded module actually holds.
#[derive(Clone, Debug)]
pub struct ScopedBusHandle {
    bus: Rc<Bus>,
    module_name: String,
}

impl ScopedBusHandle {
    /// The module name this handle tags emissions with.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// As [`Bus::emit`], with `options.source` overridden to this handle's module name.
    ///
    /// # Errors
    ///
    /// Same as [`Bus::emit`].
    pub fn emit(&self, event: &str, data: Value, mut options: EmitOptions) -> Result<UUID4, BusError> {
        options.source = Some(self.module_name.clone());
        self.bus.emit(event, data, options)
    }

    /// As [`Bus::subscribe`].
    ///
    /// # Errors
    ///
    /// Same as [`Bus::subscribe`].
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: ShareableMessageHandler,
        priority: Priority,
        once: bool,
    ) -> Result<UnsubscribeHandle, BusError> {
        self.bus.subscribe(pattern, handler, priority, once)
    }

    /// As [`Bus::request`].
    ///
    /// # Errors
    ///
    /// Same as [`Bus::request`].
    pub async fn request(&self, event: &str, data: Value, timeout_ms: Option<u64>) -> Result<Value, RequestError> {
        self.bus.request(event, data, timeout_ms).await
    }

    /// As [`Bus::reply`].
    pub fn reply(&self, request_id: UUID4, success: bool, result: Option<Value>, error: Option<String>) {
        self.bus.reply(request_id, success, result, error);
    }

    /// As [`Bus::unsubscribe`].
    pub fn unsubscribe(&self, pattern: &str, handler_id: Ustr) {
        self.bus.unsubscribe(pattern, handler_id);
    }

    /// Returns the underlying bus, e.g. for `stats()` or `shutdown()`.
    #[must_use]
    pub fn bus(&self) -> &Rc<Bus> {
        &self.bus
    }
}
