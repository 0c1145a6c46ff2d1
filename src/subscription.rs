use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// The per-subscription state threaded between the `on_subscribe` and
/// `on_cancel` hooks of a [`Broadcaster`](crate::broadcaster::Broadcaster).
///
/// Each registration owns exactly one context. The subscribe-time hook may
/// stash auxiliary state in it (a timer handle, a counter, ...) and the
/// cancel-time hook gets the same context back, which keeps lifecycle state
/// local to the subscription instead of in a shared side table.
pub struct SubscriptionContext {
    name: Option<String>,
    aux: Option<Box<dyn Any + Send>>,
}

impl SubscriptionContext {
    pub(crate) fn new(name: Option<String>) -> Self {
        Self { name, aux: None }
    }

    /// The diagnostic label given at subscribe time, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Stores an auxiliary value on this subscription, replacing any
    /// previous one.
    pub fn set_aux<V: Any + Send>(&mut self, value: V) {
        self.aux = Some(Box::new(value));
    }

    /// Borrows the auxiliary value if one of type `V` is present.
    pub fn aux<V: Any>(&self) -> Option<&V> {
        self.aux.as_deref().and_then(|aux| aux.downcast_ref())
    }

    /// Takes the auxiliary value out of the context. If the stored value is
    /// not of type `V` it is left in place and `None` is returned.
    pub fn take_aux<V: Any>(&mut self) -> Option<V> {
        match self.aux.take()?.downcast::<V>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.aux = Some(other);
                None
            }
        }
    }
}

/// The cancelable handle returned by every `subscribe` call.
///
/// Cancellation is one-shot: the first [`cancel`](Self::cancel) removes the
/// registration from the owning broadcaster and returns `true`, every later
/// call is a no-op returning `false`. The handle references its record by
/// identity only, so an outstanding `Subscription` never keeps a dropped
/// broadcaster alive.
pub struct Subscription {
    name: Option<String>,
    live: Arc<AtomicBool>,
    revoke: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new(
        name: Option<String>,
        live: Arc<AtomicBool>,
        revoke: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self { name, live, revoke }
    }

    /// Cancels this subscription. Returns `true` on the first call, `false`
    /// on every subsequent one (including after the owning broadcaster
    /// already removed the registration through `cancel_all`).
    ///
    /// Safe to call from inside a callback that is itself executing as part
    /// of an emission: delivery iterates over a snapshot, never over the
    /// live registry.
    pub fn cancel(&self) -> bool {
        if !self.live.swap(false, Ordering::SeqCst) {
            return false;
        }
        (self.revoke)();
        true
    }

    /// `true` until the subscription is cancelled, either through this
    /// handle or through `cancel_all` on the owning broadcaster.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// The diagnostic label given at subscribe time. Has no effect on
    /// delivery or ordering.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::{Broadcaster, BroadcasterConfig, Outcome, SubscribeOptions};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_is_idempotent() {
        let hub: Broadcaster<u32> = Broadcaster::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = hub.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_live());
        assert!(sub.cancel());
        assert!(!sub.is_live());
        assert!(!sub.cancel());
        assert!(!sub.cancel());

        hub.emit_sync(&1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_name_is_exposed() {
        let hub: Broadcaster<u32> = Broadcaster::default();
        let named = hub.subscribe_with(SubscribeOptions::named("diag"), |_| Outcome::Done);
        let anonymous = hub.subscribe(|_| {});

        assert_eq!(named.name(), Some("diag"));
        assert_eq!(anonymous.name(), None);
    }

    #[test]
    fn test_cancel_after_broadcaster_dropped() {
        let hub: Broadcaster<u32> = Broadcaster::new(BroadcasterConfig::new());
        let sub = hub.subscribe(|_| {});
        drop(hub);

        // The registration is gone with its broadcaster; the handle itself
        // still cancels exactly once.
        assert!(sub.cancel());
        assert!(!sub.cancel());
    }

    #[test]
    fn test_cancel_all_flips_live() {
        let hub: Broadcaster<u32> = Broadcaster::default();
        let sub = hub.subscribe(|_| {});

        assert!(sub.is_live());
        assert_eq!(hub.cancel_all(), 1);
        assert!(!sub.is_live());
        assert!(!sub.cancel());
    }

    #[test]
    fn test_context_aux_roundtrip() {
        let mut ctx = SubscriptionContext::new(Some("timer".to_string()));
        assert_eq!(ctx.name(), Some("timer"));
        assert!(ctx.aux::<u64>().is_none());

        ctx.set_aux(7u64);
        assert_eq!(ctx.aux::<u64>(), Some(&7));
        assert!(ctx.aux::<String>().is_none());

        // A mismatched take leaves the value in place.
        assert!(ctx.take_aux::<String>().is_none());
        assert_eq!(ctx.take_aux::<u64>(), Some(7));
        assert!(ctx.aux::<u64>().is_none());
    }
}
