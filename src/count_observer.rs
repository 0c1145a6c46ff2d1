use crate::{
    broadcaster::{Broadcaster, BroadcasterConfig, Outcome, SubscribeOptions},
    delivery::DeliveryHandler,
    error::EmitError,
    subscription::Subscription,
};
use tokio::runtime::Handle;
use tracing::warn;

/// A net change of a broadcaster's live-subscriber count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountChange {
    /// The count before the change.
    pub previous: usize,
    /// The count after the change.
    pub current: usize,
}

/// Installed into a wrapped registry by [`CountObserver`], so that count
/// changes arriving through outstanding [`Subscription`] handles are
/// observed too, not only those going through the observer itself.
#[derive(Clone)]
pub(crate) struct CountSink {
    changes: Broadcaster<CountChange>,
    sync: bool,
}

impl CountSink {
    pub(crate) fn publish(&self, previous: usize, current: usize) {
        let change = CountChange { previous, current };
        if self.sync {
            // A failing count subscriber must never break the registry
            // operation that triggered the event.
            self.changes.emit_sync_safe(&change, |error| {
                warn!(%error, "count-change subscriber failed");
            });
        } else {
            match Handle::try_current() {
                Ok(_) => {
                    let _ = self.changes.emit(change);
                }
                Err(_) => {
                    warn!(?change, "dropping deferred count-change: no tokio runtime");
                }
            }
        }
    }
}

/// Decorates a [`Broadcaster`] with a second broadcast stream of
/// [`CountChange`] events: one per subscribe, one per individual cancel, and
/// exactly one bulk event per non-empty `cancel_all`. The `sync` flag fixed
/// at construction selects synchronous or deferred publication.
pub struct CountObserver<T> {
    inner: Broadcaster<T>,
    changes: Broadcaster<CountChange>,
}

impl<T: 'static> CountObserver<T> {
    pub fn new(config: BroadcasterConfig, sync: bool) -> Self {
        let changes = Broadcaster::default();
        let inner = Broadcaster::new(config);
        inner.install_count_sink(CountSink {
            changes: changes.clone(),
            sync,
        });
        Self { inner, changes }
    }

    /// The nested broadcaster carrying the count-change events.
    pub fn changes(&self) -> &Broadcaster<CountChange> {
        &self.changes
    }

    /// The wrapped broadcaster. Its registry logic is untouched; every
    /// mutation path publishes through [`changes`](Self::changes).
    pub fn broadcaster(&self) -> &Broadcaster<T> {
        &self.inner
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }

    pub fn subscribe_with<F>(&self, options: SubscribeOptions, callback: F) -> Subscription
    where
        F: Fn(&T) -> Outcome + Send + Sync + 'static,
    {
        self.inner.subscribe_with(options, callback)
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }

    pub fn cancel_all(&self) -> usize {
        self.inner.cancel_all()
    }

    pub fn emit_sync(&self, value: &T) -> Result<usize, EmitError> {
        self.inner.emit_sync(value)
    }

    pub fn emit_sync_safe<H>(&self, value: &T, on_error: H) -> usize
    where
        H: Fn(EmitError) + Send + Sync + 'static,
    {
        self.inner.emit_sync_safe(value, on_error)
    }
}

impl<T: Send + Sync + 'static> CountObserver<T> {
    pub fn emit(&self, value: T) -> DeliveryHandler {
        self.inner.emit(value)
    }

    pub fn emit_safe<H>(&self, value: T, on_error: H) -> DeliveryHandler
    where
        H: Fn(EmitError) + Send + Sync + 'static,
    {
        self.inner.emit_safe(value, on_error)
    }
}
