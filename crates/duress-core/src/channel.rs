//! One-shot, re-armable broadcast channel
//!
//! A [`Subscription`] registers interest in the *next* event published on an
//! [`EventChannel`]. Publishing takes the pending set and clears it under the
//! lock, then resolves every taken subscription in registration order outside
//! of it. Subscriptions registered after that point wait for a later publish.
//!
//! ```rust
//! use duress_core::channel::EventChannel;
//!
//! # tokio_test::block_on(async {
//! let channel: EventChannel<u32, String> = EventChannel::new();
//! let first = channel.subscribe();
//! let second = channel.subscribe();
//!
//! assert_eq!(channel.publish_success(7), 2);
//! assert_eq!(first.await, Ok(7));
//! assert_eq!(second.await, Ok(7));
//! # });
//! ```

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;

struct Waiter<T, E> {
    id: u64,
    sender: oneshot::Sender<Result<T, E>>,
}

struct PendingSet<T, E> {
    next_id: u64,
    waiters: Vec<Waiter<T, E>>,
}

type Shared<T, E> = Mutex<PendingSet<T, E>>;

fn lock<T, E>(shared: &Shared<T, E>) -> MutexGuard<'_, PendingSet<T, E>> {
    // The pending set stays consistent even if a holder panicked
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out signal delivering one outcome to everything subscribed at publish time
///
/// Clones share the same pending set.
pub struct EventChannel<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> EventChannel<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Create a channel with no pending subscriptions
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(PendingSet {
                next_id: 0,
                waiters: Vec::new(),
            })),
        }
    }

    /// Register interest in the next published event
    pub fn subscribe(&self) -> Subscription<T, E> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = lock(&self.shared);
        let id = pending.next_id;
        pending.next_id += 1;
        pending.waiters.push(Waiter { id, sender });

        Subscription {
            id,
            receiver: Some(receiver),
            channel: Arc::downgrade(&self.shared),
        }
    }

    /// Resolve every pending subscription with `value`
    ///
    /// Returns the number of subscriptions that received it.
    pub fn publish_success(&self, value: T) -> usize {
        self.publish(Ok(value))
    }

    /// Resolve every pending subscription with `reason`
    ///
    /// Returns the number of subscriptions that received it.
    pub fn publish_failure(&self, reason: E) -> usize {
        self.publish(Err(reason))
    }

    fn publish(&self, outcome: Result<T, E>) -> usize {
        let waiters = mem::take(&mut lock(&self.shared).waiters);
        let snapshot = waiters.len();

        // A send fails only when a racing cancel already closed the receiver
        let delivered = waiters
            .into_iter()
            .filter(|waiter| !waiter.sender.is_closed())
            .map(|waiter| waiter.sender.send(outcome.clone()).is_ok())
            .filter(|sent| *sent)
            .count();

        trace!(snapshot, delivered, "Published event");
        delivered
    }

    /// Cancel a subscription so it never resolves
    ///
    /// Equivalent to [`Subscription::cancel`]; idempotent.
    pub fn cancel(&self, subscription: &mut Subscription<T, E>) {
        subscription.cancel();
    }

    /// Number of subscriptions waiting for the next event
    pub fn pending(&self) -> usize {
        lock(&self.shared).waiters.len()
    }
}

impl<T: Clone, E: Clone> Default for EventChannel<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for EventChannel<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Interest in the next event on an [`EventChannel`]
///
/// Resolves at most once. Dropping a subscription cancels it. A subscription
/// whose channel is dropped without publishing never resolves.
pub struct Subscription<T, E> {
    id: u64,
    receiver: Option<oneshot::Receiver<Result<T, E>>>,
    channel: Weak<Shared<T, E>>,
}

impl<T, E> Subscription<T, E> {
    /// Withdraw interest; the subscription will never resolve afterwards
    pub fn cancel(&mut self) {
        let Some(mut receiver) = self.receiver.take() else {
            return;
        };
        // Closing first makes a publish that already took the snapshot fail
        // its send instead of delivering.
        receiver.close();
        if let Some(channel) = self.channel.upgrade() {
            lock(&channel).waiters.retain(|waiter| waiter.id != self.id);
        }
    }

    /// Whether the subscription can still resolve
    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

impl<T, E> Future for Subscription<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(receiver) = this.receiver.as_mut() else {
            return Poll::Pending;
        };

        match Pin::new(receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.receiver = None;
                Poll::Ready(outcome)
            }
            // Channel dropped without publishing
            Poll::Ready(Err(_)) => {
                this.receiver = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T, E> std::fmt::Debug for Subscription<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
