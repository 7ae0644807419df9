//! Subscriber worker.
//!
//! Every subscriber owns a private FIFO queue and one Tokio task that pops
//! messages in arrival order and awaits the handler for each of them.
//!
//! ## State machine
//! ```text
//!            enqueue                 queue empty && active
//!   ┌──────┐ ───────► ┌──────────┐ ─────────────────────► ┌──────┐
//!   │ Idle │          │ Draining │                        │ Idle │
//!   └──────┘ ◄─────── └──────────┘                        └──────┘
//!       │                  │ queue empty && !active
//!       │ deactivate       ▼
//!       └────────────► ┌─────────┐
//!                      │ Stopped │  (terminal)
//!                      └─────────┘
//! ```
//!
//! ## Rules
//! - `enqueue` is accepted only while active and never blocks.
//! - `deactivate` refuses new messages but lets queued ones drain.
//! - The handler is never invoked concurrently with itself.

use crate::handler::Handler;
use crate::message::Message;
use crate::metrics;
use crate::shutdown::InFlight;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tracing::{debug, trace, warn};

/// A unique subscriber identifier.
pub type SubscriberId = u64;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a subscriber worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for messages.
    Idle,
    /// Invoking the handler on queued messages.
    Draining,
    /// Worker has exited; the handler will not run again.
    Stopped,
}

struct Queue<T> {
    messages: VecDeque<Message<T>>,
    active: bool,
}

enum Next<T> {
    Deliver(Message<T>),
    Wait,
    Stop,
}

/// A registered handler with its delivery queue.
pub(crate) struct Subscriber<T> {
    id: SubscriberId,
    topic: Arc<str>,
    queue: Mutex<Queue<T>>,
    wake: Notify,
    state: watch::Sender<WorkerState>,
    in_flight: Arc<InFlight>,
}

impl<T> Subscriber<T>
where
    T: Send + Sync + 'static,
{
    /// Create a subscriber and start its worker on `runtime`.
    pub(crate) fn spawn<H>(
        topic: Arc<str>,
        handler: H,
        in_flight: Arc<InFlight>,
        runtime: &Handle,
    ) -> Arc<Self>
    where
        H: Handler<T>,
    {
        let (state, _) = watch::channel(WorkerState::Idle);
        let subscriber = Arc::new(Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            topic,
            queue: Mutex::new(Queue {
                messages: VecDeque::new(),
                active: true,
            }),
            wake: Notify::new(),
            state,
            in_flight,
        });

        // Owned by the task future, so it runs even if the task is never polled.
        let guard = WorkerGuard {
            subscriber: Arc::clone(&subscriber),
            delivering: false,
        };
        runtime.spawn(Self::run(guard, handler));
        trace!(topic = %subscriber.topic, subscriber = subscriber.id, "Worker started");
        subscriber
    }

    async fn run<H>(mut guard: WorkerGuard<T>, handler: H)
    where
        H: Handler<T>,
    {
        let this = Arc::clone(&guard.subscriber);

        loop {
            let next = {
                let mut queue = this.lock_queue();
                match queue.messages.pop_front() {
                    Some(message) => Next::Deliver(message),
                    None if queue.active => Next::Wait,
                    None => Next::Stop,
                }
            };

            match next {
                Next::Deliver(message) => {
                    this.set_state(WorkerState::Draining);
                    guard.delivering = true;
                    handler.handle(message).await;
                    guard.delivering = false;
                    this.in_flight.release();
                    metrics::record_delivery();
                }
                Next::Wait => {
                    this.set_state(WorkerState::Idle);
                    this.wake.notified().await;
                }
                Next::Stop => break,
            }
        }
    }
}

impl<T> Subscriber<T> {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.lock_queue().active
    }

    /// Append a message and wake the worker.
    ///
    /// Returns `false` without queuing if the subscriber has been deactivated.
    pub(crate) fn enqueue(&self, message: Message<T>) -> bool {
        {
            let mut queue = self.lock_queue();
            if !queue.active {
                return false;
            }
            self.in_flight.acquire();
            queue.messages.push_back(message);
        }
        self.wake.notify_one();
        true
    }

    /// Stop accepting messages. Already queued messages still drain.
    pub(crate) fn deactivate(&self) {
        let changed = {
            let mut queue = self.lock_queue();
            std::mem::replace(&mut queue.active, false)
        };
        if changed {
            trace!(topic = %self.topic, subscriber = self.id, "Subscriber deactivated");
        }
        // Stores a permit if the worker is between its check and its wait.
        self.wake.notify_one();
    }

    /// Resolves once the worker has reached [`WorkerState::Stopped`].
    pub(crate) async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state == WorkerState::Stopped).await;
    }

    fn set_state(&self, next: WorkerState) {
        self.state.send_if_modified(|state| {
            if *state == next || *state == WorkerState::Stopped {
                return false;
            }
            *state = next;
            true
        });
    }

    fn lock_queue(&self) -> MutexGuard<'_, Queue<T>> {
        // Handlers never run under this lock, so poisoning carries no torn state.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishes `Stopped` when the worker exits, including by unwinding.
struct WorkerGuard<T> {
    subscriber: Arc<Subscriber<T>>,
    delivering: bool,
}

impl<T> Drop for WorkerGuard<T> {
    fn drop(&mut self) {
        let sub = &self.subscriber;
        let stranded = {
            let mut queue = sub.lock_queue();
            queue.active = false;
            let stranded = queue.messages.len();
            queue.messages.clear();
            stranded
        };

        let abandoned = stranded + usize::from(self.delivering);
        if abandoned > 0 {
            warn!(
                topic = %sub.topic,
                subscriber = sub.id,
                abandoned,
                "Worker exited with undelivered messages"
            );
        }
        sub.in_flight.release_many(abandoned);
        sub.state.send_replace(WorkerState::Stopped);
        debug!(topic = %sub.topic, subscriber = sub.id, "Worker stopped");
    }
}
