use crate::{
    broadcaster::{Broadcaster, Outcome, SubscribeOptions},
    subscription::Subscription,
};

/// A read/subscribe-only facade over a [`Broadcaster`].
///
/// Hand a `ConsumerView` to components that should be able to listen but
/// never emit or mass-cancel. The restriction is structural: the wrapped
/// broadcaster is a private field and no method returns it, so there is no
/// way through this type's public surface to reach `emit*` or `cancel_all`.
pub struct ConsumerView<T> {
    inner: Broadcaster<T>,
}

impl<T> Clone for ConsumerView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> ConsumerView<T> {
    /// Wraps an existing broadcaster. Also reachable as
    /// [`Broadcaster::consumer`].
    pub fn new(broadcaster: &Broadcaster<T>) -> Self {
        Self {
            inner: broadcaster.clone(),
        }
    }

    /// See [`Broadcaster::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }

    /// See [`Broadcaster::subscribe_with`].
    pub fn subscribe_with<F>(&self, options: SubscribeOptions, callback: F) -> Subscription
    where
        F: Fn(&T) -> Outcome + Send + Sync + 'static,
    {
        self.inner.subscribe_with(options, callback)
    }

    /// See [`Broadcaster::count`].
    pub fn count(&self) -> usize {
        self.inner.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_view_subscribes_into_wrapped_broadcaster() {
        let hub: Broadcaster<u32> = Broadcaster::default();
        let view = hub.consumer();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = view.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(view.count(), 1);
        assert_eq!(hub.count(), 1);

        assert_eq!(hub.emit_sync(&1).unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(sub.cancel());
        assert_eq!(view.count(), 0);
    }

    #[test]
    fn test_view_clones_share_the_registry() {
        let hub: Broadcaster<u32> = Broadcaster::default();
        let view = ConsumerView::new(&hub);
        let other = view.clone();

        view.subscribe(|_| {});
        other.subscribe(|_| {});
        assert_eq!(hub.count(), 2);
        assert_eq!(other.count(), 2);
    }
}
