//! # Broadcast Hub
//!
//! `broadcast_hub` is a typed publish/subscribe primitive: a
//! [`Broadcaster`](broadcaster::Broadcaster) holds registered subscriber
//! callbacks and fans a value out to them, synchronously or on tokio tasks,
//! with per-subscriber error containment, cancellable subscriptions, a
//! snapshot-size cap, a count-change decorator and a subscribe-only
//! capability view.
//!
//! # Examples
//!
//! The example below registers two subscribers, broadcasts a value with
//! deferred delivery, and waits for both deliveries to complete:
//!
//! ```rust
//! use broadcast_hub::broadcaster::Broadcaster;
//! use std::sync::{
//!     atomic::{AtomicUsize, Ordering},
//!     Arc,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = Broadcaster::default();
//!
//!     let total = Arc::new(AtomicUsize::new(0));
//!     let first = Arc::clone(&total);
//!     let second = Arc::clone(&total);
//!     hub.subscribe(move |value: &usize| {
//!         first.fetch_add(*value, Ordering::SeqCst);
//!     });
//!     let sub = hub.subscribe(move |value: &usize| {
//!         second.fetch_add(*value, Ordering::SeqCst);
//!     });
//!
//!     // Both subscribers are in the snapshot; wait for delivery.
//!     let delivered = hub.emit(21).wait(None).await.unwrap();
//!     assert_eq!(delivered, 2);
//!     assert_eq!(total.load(Ordering::SeqCst), 42);
//!
//!     // Cancellation is one-shot and immediate for future emissions.
//!     assert!(sub.cancel());
//!     assert!(!sub.cancel());
//!     assert_eq!(hub.count(), 1);
//! }
//! ```
//! ## Modules
//! This crate is organized into the following modules:

/// Contains the main `Broadcaster` structure and its associated types.
///
/// This module defines the `Broadcaster`, the subscriber registry plus the
/// four emit operations. Delivery always runs against a snapshot of the
/// registry captured at the start of the emit call, which is what makes
/// subscribing or self-cancelling from inside a callback safe.
///
/// ### Key Types:
/// - `Broadcaster<T>`: the registry and emit operations.
/// - `BroadcasterConfig`: snapshot cap and lifecycle hooks.
/// - `Outcome`: what a callback reports back (done, failed, or deferred).
pub mod broadcaster;

/// Provides the `Subscription` handle and the per-subscription context.
///
/// A `Subscription` is the one-shot cancelable handle returned by every
/// subscribe call. The `SubscriptionContext` carries subscriber-specific
/// auxiliary state between the `on_subscribe` and `on_cancel` hooks.
pub mod subscription;

/// Provides the `DeliveryHandler` for tracking deferred emissions.
///
/// The `DeliveryHandler` owns the per-subscriber tasks spawned by one
/// deferred emission. Its `len` is the emission's snapshot size and its
/// `wait` is the completion point, surfacing whatever failed.
///
/// **Important Note:**
/// - Dropping the handler does not cancel the deliveries; they keep running
///   on the runtime. `wait` exists to observe completion, not to gate it.
pub mod delivery;

/// Contains the `CountObserver` decorator and the `CountChange` event.
///
/// Wrapping a broadcaster in a `CountObserver` adds a nested broadcast
/// stream that publishes `{previous, current}` on every net change of the
/// live-subscriber count, synchronously or deferred per construction flag.
pub mod count_observer;

/// Contains the `ConsumerView` capability restriction.
///
/// A `ConsumerView` exposes only `subscribe` and `count` of a wrapped
/// broadcaster, so external code handed the view can listen but never emit
/// or mass-cancel.
pub mod consumer;

/// Contains definitions related to error types and handling.
///
/// This module provides `EmitError`, covering subscriber-callback failures
/// surfaced by the unsafe emit variants or routed to the error handler by
/// the safe ones, plus the aggregate and timeout errors reported when
/// waiting on deferred deliveries.
pub mod error;
