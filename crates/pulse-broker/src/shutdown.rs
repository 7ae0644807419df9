//! Shutdown coordination.
//!
//! [`InFlight`] counts deliveries that were enqueued but whose handler
//! invocation has not finished yet. `Broker::close` waits on it to know when
//! every outstanding delivery has drained.
//!
//! ## Rules
//! - One unit is acquired per accepted enqueue, under the subscriber's queue lock.
//! - One unit is released when that handler invocation returns, or when the
//!   worker unwinds and the delivery is abandoned.
//! - Waiters are woken by a broadcast when the count drops to zero.

use crate::metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// In-flight delivery counter with a drained signal.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    drained: Notify,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current number of unfinished deliveries.
    pub(crate) fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
        metrics::record_in_flight(1.0);
    }

    pub(crate) fn release(&self) {
        self.release_many(1);
    }

    pub(crate) fn release_many(&self, n: usize) {
        if n == 0 {
            return;
        }
        let previous = self.count.fetch_sub(n, Ordering::AcqRel);
        debug_assert!(previous >= n, "in-flight counter underflow");
        metrics::record_in_flight(-(n as f64));
        if previous == n {
            self.drained.notify_waiters();
        }
    }

    /// Resolves once the counter is observed at zero.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before the check so a release in between is not lost.
            notified.as_mut().enable();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}
