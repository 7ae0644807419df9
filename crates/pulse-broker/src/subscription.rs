//! Caller-facing subscription handle.

use crate::broker::Shared;
use crate::subscriber::{Subscriber, SubscriberId, WorkerState};
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Handle controlling the lifecycle of one subscriber.
///
/// Dropping a subscription that was never unsubscribed deregisters it
/// without waiting for its queue to drain.
#[must_use = "dropping a Subscription deregisters its handler"]
pub struct Subscription<T = Bytes> {
    subscriber: Arc<Subscriber<T>>,
    broker: Weak<Shared<T>>,
    torn_down: AtomicBool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(subscriber: Arc<Subscriber<T>>, broker: Weak<Shared<T>>) -> Self {
        Self {
            subscriber,
            broker,
            torn_down: AtomicBool::new(false),
        }
    }

    /// Topic this subscription is registered under.
    #[must_use]
    pub fn topic(&self) -> &str {
        self.subscriber.topic()
    }

    /// Identifier of the underlying subscriber.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Current state of the subscriber's worker.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.subscriber.state()
    }

    /// Whether the subscriber still accepts deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscriber.is_active()
    }

    /// Stop deliveries and wait for the worker to drain and exit.
    ///
    /// Only the first call has an effect; concurrent or repeated calls return
    /// immediately. Messages already queued are still handled before this
    /// returns, and the handler is never invoked afterwards.
    pub async fn unsubscribe(&self) {
        if !self.begin_teardown() {
            return;
        }
        self.detach();
        self.subscriber.stopped().await;
        debug!(topic = %self.topic(), subscriber = self.id(), "Unsubscribed");
    }

    fn begin_teardown(&self) -> bool {
        self.torn_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn detach(&self) {
        self.subscriber.deactivate();
        if let Some(shared) = self.broker.upgrade() {
            shared.deregister(&self.subscriber);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.begin_teardown() {
            self.detach();
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("topic", &self.topic())
            .field("state", &self.state())
            .finish()
    }
}
