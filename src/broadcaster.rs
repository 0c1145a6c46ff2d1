use crate::{
    count_observer::CountSink,
    delivery::DeliveryHandler,
    error::{EmitError, SubscriberError},
    subscription::{Subscription, SubscriptionContext},
};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tokio::runtime::Handle;
use tracing::warn;

/// What a subscriber callback reports back to the emitting broadcaster.
///
/// This is the crate's rendering of a callback whose result may be either
/// immediate or deferred: `Done` and `Failed` settle synchronously, while
/// `Deferred` hands back a future whose eventual failure the safe emit
/// variants route to the caller-supplied error handler, possibly after the
/// emit call itself has already returned.
pub enum Outcome {
    /// The callback completed.
    Done,
    /// The callback failed synchronously.
    Failed(SubscriberError),
    /// The callback started deferred work that may still fail.
    Deferred(Pin<Box<dyn Future<Output = Result<(), SubscriberError>> + Send>>),
}

impl Outcome {
    /// Shorthand for a synchronous failure.
    pub fn failed<E: Into<SubscriberError>>(error: E) -> Self {
        Outcome::Failed(error.into())
    }

    /// Wraps deferred fallible work started by the callback.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), SubscriberError>> + Send + 'static,
    {
        Outcome::Deferred(Box::pin(future))
    }
}

type Callback<T> = Arc<dyn Fn(&T) -> Outcome + Send + Sync>;

/// A lifecycle hook, invoked with the per-subscription context at subscribe
/// or cancel time.
pub type Hook = Arc<dyn Fn(&mut SubscriptionContext) + Send + Sync>;

type ErrorSink = Arc<dyn Fn(EmitError) + Send + Sync>;

/// Construction-time configuration of a [`Broadcaster`]. Immutable once the
/// broadcaster exists.
#[derive(Clone, Default)]
pub struct BroadcasterConfig {
    max: usize,
    on_subscribe: Option<Hook>,
    on_cancel: Option<Hook>,
}

impl BroadcasterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps how many subscribers are included in a single emission's
    /// snapshot. `0` (the default) means unlimited. The cap never limits how
    /// many subscribers may register: registrations beyond it become
    /// eligible as earlier subscribers cancel.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    /// Invoked synchronously for every new subscription; may populate the
    /// subscription's auxiliary context.
    pub fn on_subscribe<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut SubscriptionContext) + Send + Sync + 'static,
    {
        self.on_subscribe = Some(Arc::new(hook));
        self
    }

    /// Invoked once per removed registration, with the same context the
    /// subscribe hook saw.
    pub fn on_cancel<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut SubscriptionContext) + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(hook));
        self
    }
}

/// Per-call subscribe options.
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    name: Option<String>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a diagnostic label to the subscription. The label has no
    /// effect on delivery or ordering.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// One live registration, owned exclusively by the registry. The issued
/// [`Subscription`] references it by `id` only and shares the `live` flag.
struct SubscriberRecord<T> {
    id: u64,
    callback: Callback<T>,
    live: Arc<AtomicBool>,
    ctx: SubscriptionContext,
}

struct Registry<T> {
    next_id: u64,
    records: Vec<SubscriberRecord<T>>,
    count_sink: Option<CountSink>,
}

struct Shared<T> {
    config: BroadcasterConfig,
    registry: Mutex<Registry<T>>,
}

impl<T> Shared<T> {
    fn registry(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes exactly one record by identity, then runs `on_cancel` and
    /// publishes the count change outside the lock. Removing the same record
    /// twice is a logic error; idempotence lives in the `Subscription` flag.
    fn remove_record(&self, id: u64) {
        let (mut record, previous, sink) = {
            let mut reg = self.registry();
            let pos = reg.records.iter().position(|r| r.id == id);
            debug_assert!(pos.is_some(), "subscriber record removed twice");
            let Some(pos) = pos else { return };
            let previous = reg.records.len();
            (reg.records.remove(pos), previous, reg.count_sink.clone())
        };
        if let Some(hook) = &self.config.on_cancel {
            hook(&mut record.ctx);
        }
        if let Some(sink) = sink {
            sink.publish(previous, previous - 1);
        }
    }
}

/// The subscriber registry plus the four emit operations.
///
/// A `Broadcaster` fans a value out to every registered callback. Delivery
/// always works against a snapshot of the registry taken at the start of the
/// emit call: subscribers added afterwards do not see that emission, and a
/// subscriber cancelled afterwards still does. The handle is cheap to clone;
/// clones share one registry.
pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new(BroadcasterConfig::default())
    }
}

impl<T: 'static> Broadcaster<T> {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(Registry {
                    next_id: 0,
                    records: Vec::new(),
                    count_sink: None,
                }),
            }),
        }
    }

    /// Registers an infallible callback. Equivalent to
    /// [`subscribe_with`](Self::subscribe_with) with default options and a
    /// callback that always reports [`Outcome::Done`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with(SubscribeOptions::default(), move |value| {
            callback(value);
            Outcome::Done
        })
    }

    /// Registers a callback at the end of the registry (insertion order is
    /// notification order) and returns the handle that cancels exactly this
    /// registration. The `on_subscribe` hook, if configured, runs
    /// synchronously against the new subscription's context before this
    /// returns. The same callback may be subscribed any number of times;
    /// every call produces an independent subscription.
    pub fn subscribe_with<F>(&self, options: SubscribeOptions, callback: F) -> Subscription
    where
        F: Fn(&T) -> Outcome + Send + Sync + 'static,
    {
        let mut ctx = SubscriptionContext::new(options.name);
        if let Some(hook) = &self.shared.config.on_subscribe {
            hook(&mut ctx);
        }
        let name = ctx.name().map(str::to_string);
        let live = Arc::new(AtomicBool::new(true));

        let (id, previous, sink) = {
            let mut reg = self.shared.registry();
            let id = reg.next_id;
            reg.next_id += 1;
            let previous = reg.records.len();
            reg.records.push(SubscriberRecord {
                id,
                callback: Arc::new(callback),
                live: Arc::clone(&live),
                ctx,
            });
            (id, previous, reg.count_sink.clone())
        };
        if let Some(sink) = sink {
            sink.publish(previous, previous + 1);
        }

        let weak = Arc::downgrade(&self.shared);
        let revoke: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.remove_record(id);
            }
        });
        Subscription::new(name, live, revoke)
    }

    /// The current live-subscriber count. A direct read of the registry, not
    /// a snapshot.
    pub fn count(&self) -> usize {
        self.shared.registry().records.len()
    }

    /// Removes every live registration, flipping each outstanding
    /// [`Subscription`] to cancelled and running `on_cancel` per record.
    /// Publishes a single bulk count change. Returns the number of removed
    /// registrations; on an empty registry this is a no-op returning 0 that
    /// never invokes hooks.
    pub fn cancel_all(&self) -> usize {
        let (records, sink) = {
            let mut reg = self.shared.registry();
            let records = std::mem::take(&mut reg.records);
            for record in &records {
                record.live.store(false, Ordering::SeqCst);
            }
            (records, reg.count_sink.clone())
        };
        if records.is_empty() {
            return 0;
        }
        let cancelled = records.len();
        for mut record in records {
            if let Some(hook) = &self.shared.config.on_cancel {
                hook(&mut record.ctx);
            }
        }
        if let Some(sink) = sink {
            sink.publish(cancelled, 0);
        }
        cancelled
    }

    /// A read/subscribe-only view of this broadcaster. See
    /// [`ConsumerView`](crate::consumer::ConsumerView).
    pub fn consumer(&self) -> crate::consumer::ConsumerView<T> {
        crate::consumer::ConsumerView::new(self)
    }

    pub(crate) fn install_count_sink(&self, sink: CountSink) {
        self.shared.registry().count_sink = Some(sink);
    }

    /// Copies out the first `min(max, len)` records (all of them if `max` is
    /// 0), in registration order, before any callback runs.
    fn snapshot(&self) -> Vec<(Callback<T>, Option<String>)> {
        let reg = self.shared.registry();
        let cap = match self.shared.config.max {
            0 => reg.records.len(),
            max => reg.records.len().min(max),
        };
        reg.records[..cap]
            .iter()
            .map(|r| (Arc::clone(&r.callback), r.ctx.name().map(str::to_string)))
            .collect()
    }

    /// Synchronous delivery, unsafe variant: every snapshot callback runs in
    /// registration order before this returns, and the first failure is
    /// returned to the caller, aborting delivery to the rest of the
    /// snapshot. A deferred outcome is detached onto the current runtime (or
    /// dropped, with a warning, when there is none). Returns the snapshot
    /// size on full delivery.
    pub fn emit_sync(&self, value: &T) -> Result<usize, EmitError> {
        let snapshot = self.snapshot();
        let delivered = snapshot.len();
        for (callback, name) in snapshot {
            match callback(value) {
                Outcome::Done => (),
                Outcome::Failed(source) => return Err(EmitError::Subscriber { name, source }),
                Outcome::Deferred(fut) => match Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(error) = fut.await {
                                warn!(subscriber = name.as_deref(), %error,
                                    "deferred subscriber outcome failed");
                            }
                        });
                    }
                    Err(_) => {
                        warn!(subscriber = name.as_deref(),
                            "dropping deferred subscriber outcome: no tokio runtime");
                    }
                },
            }
        }
        Ok(delivered)
    }

    /// Synchronous delivery with per-subscriber isolation: a failing
    /// callback is reported to `on_error` and delivery continues with the
    /// rest of the snapshot. Deferred outcomes are driven on the current
    /// runtime and their eventual failure reaches `on_error` after this call
    /// has returned. Returns the snapshot size.
    pub fn emit_sync_safe<H>(&self, value: &T, on_error: H) -> usize
    where
        H: Fn(EmitError) + Send + Sync + 'static,
    {
        let on_error: ErrorSink = Arc::new(on_error);
        let snapshot = self.snapshot();
        let delivered = snapshot.len();
        for (callback, name) in snapshot {
            match callback(value) {
                Outcome::Done => (),
                Outcome::Failed(source) => on_error(EmitError::Subscriber { name, source }),
                Outcome::Deferred(fut) => match Handle::try_current() {
                    Ok(handle) => {
                        let on_error = Arc::clone(&on_error);
                        handle.spawn(async move {
                            if let Err(source) = fut.await {
                                on_error(EmitError::Subscriber { name, source });
                            }
                        });
                    }
                    Err(_) => on_error(EmitError::NoRuntime),
                },
            }
        }
        delivered
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    /// Deferred delivery, unsafe variant: snapshots the registry, then
    /// spawns one task per snapshot entry, in snapshot order, each invoking
    /// its callback with the shared value. Subscriber failures surface to
    /// the caller through [`DeliveryHandler::wait`]. `len()` of the returned
    /// handler is the snapshot size.
    pub fn emit(&self, value: T) -> DeliveryHandler {
        let snapshot = self.snapshot();
        let value = Arc::new(value);
        let tasks = snapshot
            .into_iter()
            .map(|(callback, name)| {
                let value = Arc::clone(&value);
                tokio::spawn(async move {
                    match callback(&value) {
                        Outcome::Done => Ok(()),
                        Outcome::Failed(source) => Err(EmitError::Subscriber { name, source }),
                        Outcome::Deferred(fut) => fut
                            .await
                            .map_err(|source| EmitError::Subscriber { name, source }),
                    }
                })
            })
            .collect();
        DeliveryHandler::new(tasks)
    }

    /// Deferred delivery with per-subscriber isolation: identical scheduling
    /// to [`emit`](Self::emit), but every failure, synchronous or from a
    /// deferred outcome, goes to `on_error` and never affects the other
    /// deliveries. `wait` on the returned handler then only reports task
    /// scheduling problems.
    pub fn emit_safe<H>(&self, value: T, on_error: H) -> DeliveryHandler
    where
        H: Fn(EmitError) + Send + Sync + 'static,
    {
        let on_error: ErrorSink = Arc::new(on_error);
        let snapshot = self.snapshot();
        let value = Arc::new(value);
        let tasks = snapshot
            .into_iter()
            .map(|(callback, name)| {
                let value = Arc::clone(&value);
                let on_error = Arc::clone(&on_error);
                tokio::spawn(async move {
                    let result = match callback(&value) {
                        Outcome::Done => Ok(()),
                        Outcome::Failed(source) => Err(EmitError::Subscriber { name, source }),
                        Outcome::Deferred(fut) => fut
                            .await
                            .map_err(|source| EmitError::Subscriber { name, source }),
                    };
                    if let Err(error) = result {
                        on_error(error);
                    }
                    Ok(())
                })
            })
            .collect();
        DeliveryHandler::new(tasks)
    }
}
