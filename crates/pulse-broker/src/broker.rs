//! In-process topic broker.
//!
//! The broker owns the topic registry and fans published messages out to the
//! private queue of every subscriber registered under the topic.

use crate::config::BrokerConfig;
use crate::handler::Handler;
use crate::message::Message;
use crate::metrics;
use crate::shutdown::InFlight;
use crate::subscriber::Subscriber;
use crate::subscription::Subscription;
use crate::topic::{validate_topic_name, Topic};
use bytes::Bytes;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker has been closed.
    #[error("Broker is closed")]
    Closed,

    /// Close could not confirm a full drain before its deadline.
    #[error("Deadline exceeded while draining in-flight deliveries")]
    DeadlineExceeded,

    /// Invalid topic name.
    #[error("Invalid topic name: {0}")]
    InvalidTopic(&'static str),

    /// Maximum number of topics reached.
    #[error("Maximum topics reached")]
    MaxTopicsReached,

    /// Maximum subscribers for the topic reached.
    #[error("Maximum subscribers per topic reached")]
    MaxSubscribersReached,

    /// Subscribe was called outside a Tokio runtime.
    #[error("No Tokio runtime available to run the subscriber")]
    NoRuntime,
}

struct Registry<T> {
    topics: HashMap<Arc<str>, Topic<T>>,
    closed: bool,
}

impl<T> Registry<T> {
    fn all_subscribers(&self) -> Vec<Arc<Subscriber<T>>> {
        self.topics
            .values()
            .flat_map(|topic| topic.subscribers().cloned())
            .collect()
    }

    fn subscriber_count(&self) -> usize {
        self.topics.values().map(Topic::len).sum()
    }
}

/// State shared between a broker and its subscriptions.
pub(crate) struct Shared<T> {
    registry: RwLock<Registry<T>>,
    in_flight: Arc<InFlight>,
    config: BrokerConfig,
}

impl<T> Shared<T> {
    fn read(&self) -> RwLockReadGuard<'_, Registry<T>> {
        // No user code runs under this lock.
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry<T>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a subscriber from its topic, dropping the topic once empty.
    pub(crate) fn deregister(&self, subscriber: &Subscriber<T>) -> bool {
        let mut registry = self.write();
        let Some(topic) = registry.topics.get_mut(subscriber.topic()) else {
            return false;
        };

        let removed = topic.remove(subscriber.id());
        if topic.is_empty() {
            registry.topics.remove(subscriber.topic());
            debug!(topic = %subscriber.topic(), "Deleted empty topic");
        }
        if removed {
            metrics::record_unsubscription(1);
        }
        removed
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Let workers of a never-closed broker drain and exit.
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for topic in registry.topics.values() {
            for subscriber in topic.subscribers() {
                subscriber.deactivate();
            }
        }
    }
}

/// The central message broker.
///
/// Cloning a broker is cheap and yields another handle to the same registry.
/// Every broker is independent: there is no process-wide instance.
pub struct Broker<T = Bytes> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Broker<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new broker with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Create a new broker with custom configuration.
    #[must_use]
    pub fn with_config(config: BrokerConfig) -> Self {
        info!("Creating broker with config: {:?}", config);
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry {
                    topics: HashMap::new(),
                    closed: false,
                }),
                in_flight: Arc::new(InFlight::new()),
                config,
            }),
        }
    }

    /// Get the broker configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Subscribe a handler to a topic.
    ///
    /// Starts a dedicated worker task on the current Tokio runtime that
    /// invokes `handler` for every message published to `topic`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] once the broker is closed, and an error
    /// if the topic name is invalid, limits are exceeded, or no runtime is
    /// available.
    pub fn subscribe<H>(&self, topic: &str, handler: H) -> Result<Subscription<T>, BrokerError>
    where
        H: Handler<T>,
    {
        let config = &self.shared.config;
        validate_topic_name(topic, config.max_topic_length).map_err(BrokerError::InvalidTopic)?;
        let runtime = Handle::try_current().map_err(|_| BrokerError::NoRuntime)?;

        let mut registry = self.shared.write();
        if registry.closed {
            return Err(BrokerError::Closed);
        }

        let existing = registry.topics.get(topic).map(Topic::len);
        match existing {
            None if registry.topics.len() >= config.max_topics => {
                return Err(BrokerError::MaxTopicsReached);
            }
            Some(count) if count >= config.max_subscribers_per_topic => {
                return Err(BrokerError::MaxSubscribersReached);
            }
            None if config.max_subscribers_per_topic == 0 => {
                return Err(BrokerError::MaxSubscribersReached);
            }
            _ => {}
        }

        let entry = registry
            .topics
            .entry(Arc::from(topic))
            .or_insert_with_key(|name| {
                debug!(topic = %name, "Creating new topic");
                Topic::new(Arc::clone(name))
            });

        let subscriber = Subscriber::spawn(
            Arc::clone(entry.name()),
            handler,
            Arc::clone(&self.shared.in_flight),
            &runtime,
        );
        entry.insert(Arc::clone(&subscriber));
        metrics::record_subscription();

        debug!(
            topic = %topic,
            subscriber = subscriber.id(),
            subscribers = entry.len(),
            "Subscribed"
        );

        Ok(Subscription::new(subscriber, Arc::downgrade(&self.shared)))
    }

    /// Publish a payload to a topic.
    ///
    /// Returns the number of subscribers that accepted the delivery. Never
    /// waits for handlers to run.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] once the broker is closed.
    pub fn publish(&self, topic: &str, payload: impl Into<T>) -> Result<usize, BrokerError> {
        self.publish_message(Message::new(topic, payload))
    }

    /// Publish a prebuilt message to its topic.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] once the broker is closed.
    pub fn publish_message(&self, message: Message<T>) -> Result<usize, BrokerError> {
        let snapshot = {
            let registry = self.shared.read();
            if registry.closed {
                return Err(BrokerError::Closed);
            }
            match registry.topics.get(message.topic()) {
                Some(topic) => topic.snapshot(),
                None => {
                    trace!(topic = %message.topic(), "Publish to topic without subscribers");
                    metrics::record_publish(0);
                    return Ok(0);
                }
            }
        };

        let delivered = snapshot
            .iter()
            .filter(|subscriber| subscriber.enqueue(message.clone()))
            .count();

        metrics::record_publish(delivered);
        trace!(topic = %message.topic(), recipients = delivered, "Published message");
        Ok(delivered)
    }

    /// Close the broker, waiting at most `timeout` for deliveries to drain.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::DeadlineExceeded`] if the timeout elapses first.
    pub async fn close(&self, timeout: Duration) -> Result<(), BrokerError> {
        self.close_with(tokio::time::sleep(timeout)).await
    }

    /// Close the broker using the configured close timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::DeadlineExceeded`] if the timeout elapses first.
    pub async fn shutdown(&self) -> Result<(), BrokerError> {
        self.close(self.shared.config.close_timeout()).await
    }

    /// Close the broker, giving up when `cancel` completes.
    ///
    /// Every subscriber is deactivated, then this waits until all in-flight
    /// deliveries are handled. Only then is the registry cleared and the
    /// broker sealed; later `subscribe`/`publish` calls fail with
    /// [`BrokerError::Closed`]. Closing a closed broker succeeds at once.
    ///
    /// When `cancel` wins, deliveries that are still running are not
    /// interrupted: they keep running in the background. If the drain timed
    /// out the broker is left unsealed and `close` may be retried.
    ///
    /// Must not be called concurrently with itself.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::DeadlineExceeded`] if `cancel` completes first.
    pub async fn close_with<F>(&self, cancel: F) -> Result<(), BrokerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let subscribers = {
            let registry = self.shared.read();
            if registry.closed {
                return Ok(());
            }
            registry.all_subscribers()
        };

        info!(
            subscribers = subscribers.len(),
            in_flight = self.shared.in_flight.current(),
            "Closing broker"
        );

        for subscriber in &subscribers {
            subscriber.deactivate();
        }

        tokio::select! {
            biased;
            () = self.shared.in_flight.drained() => {}
            () = &mut cancel => {
                warn!(
                    in_flight = self.shared.in_flight.current(),
                    "Close deadline exceeded; deliveries continue in background"
                );
                return Err(BrokerError::DeadlineExceeded);
            }
        }

        // Seal, then sweep subscribers that registered after the snapshot.
        let remaining = {
            let mut registry = self.shared.write();
            registry.closed = true;
            let count = registry.subscriber_count();
            metrics::record_unsubscription(count);
            let remaining: Vec<_> = registry
                .topics
                .drain()
                .flat_map(|(_, topic)| topic.into_subscribers())
                .collect();
            remaining
        };
        for subscriber in &remaining {
            subscriber.deactivate();
        }

        let stopped = join_all(
            subscribers
                .iter()
                .chain(remaining.iter())
                .map(|subscriber| subscriber.stopped()),
        );

        tokio::select! {
            biased;
            _ = stopped => {}
            () = &mut cancel => {
                warn!("Close deadline exceeded while stopping workers");
                return Err(BrokerError::DeadlineExceeded);
            }
        }

        info!("Broker closed");
        Ok(())
    }

    /// Get broker statistics.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let registry = self.shared.read();
        BrokerStats {
            topic_count: registry.topics.len(),
            subscriber_count: registry.subscriber_count(),
            in_flight: self.shared.in_flight.current(),
            closed: registry.closed,
        }
    }
}

impl<T> Broker<T> {
    /// Check if a topic has subscribers.
    #[must_use]
    pub fn topic_exists(&self, topic: &str) -> bool {
        self.shared.read().topics.contains_key(topic)
    }

    /// Get the subscriber count for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared
            .read()
            .topics
            .get(topic)
            .map(Topic::len)
            .unwrap_or(0)
    }

    /// Get all topic names, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .read()
            .topics
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Whether the broker has been sealed by `close`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.read().closed
    }

    /// Number of deliveries enqueued but not yet handled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.current()
    }
}

impl<T> Default for Broker<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Broker statistics.
#[derive(Debug, Clone)]
pub struct BrokerStats {
    /// Number of topics with at least one subscriber.
    pub topic_count: usize,
    /// Number of registered subscribers across all topics.
    pub subscriber_count: usize,
    /// Deliveries enqueued but not yet handled.
    pub in_flight: usize,
    /// Whether the broker has been closed.
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::WorkerState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log) -> impl Handler<String> {
        let log = Arc::clone(log);
        move |msg: Message<String>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(msg.payload().clone());
            }
        }
    }

    fn sleeper(delay: Duration, done: &Arc<AtomicUsize>) -> impl Handler<String> {
        let done = Arc::clone(done);
        move |_msg: Message<String>| {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(delay).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_broker_subscribe_unsubscribe() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();

        let sub = broker.subscribe("test:topic", recorder(&log)).unwrap();
        assert!(broker.topic_exists("test:topic"));
        assert_eq!(broker.subscriber_count("test:topic"), 1);

        sub.unsubscribe().await;
        // Topic should be auto-deleted
        assert!(!broker.topic_exists("test:topic"));
    }

    #[tokio::test]
    async fn test_fanout_preserves_order_per_subscriber() {
        let broker: Broker<String> = Broker::new();
        let first = Log::default();
        let second = Log::default();
        let _s1 = broker.subscribe("t", recorder(&first)).unwrap();
        let _s2 = broker.subscribe("t", recorder(&second)).unwrap();

        assert_eq!(broker.publish("t", "m1").unwrap(), 2);
        assert_eq!(broker.publish("t", "m2").unwrap(), 2);
        broker.close(Duration::from_secs(5)).await.unwrap();

        let expected = vec!["m1".to_string(), "m2".to_string()];
        assert_eq!(*first.lock().unwrap(), expected);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_order_matches_publish_order_under_load() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        let _sub = broker.subscribe("t", recorder(&log)).unwrap();

        for i in 0..1_000 {
            broker.publish("t", i.to_string()).unwrap();
        }
        broker.close(Duration::from_secs(10)).await.unwrap();

        let expected: Vec<String> = (0..1_000).map(|i| i.to_string()).collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broker: Broker<String> = Broker::new();
        assert_eq!(broker.publish("nobody", "m").unwrap(), 0);
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_publish_is_scoped_to_topic() {
        let broker: Broker<String> = Broker::new();
        let a = Log::default();
        let b = Log::default();
        let _sa = broker.subscribe("a", recorder(&a)).unwrap();
        let _sb = broker.subscribe("b", recorder(&b)).unwrap();

        assert_eq!(broker.publish("a", "x").unwrap(), 1);
        broker.close(Duration::from_secs(5)).await.unwrap();

        assert_eq!(*a.lock().unwrap(), vec!["x".to_string()]);
        assert!(b.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_after_unsubscribe_is_not_delivered() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        let sub = broker.subscribe("t", recorder(&log)).unwrap();

        sub.unsubscribe().await;
        assert_eq!(broker.publish("t", "m").unwrap(), 0);
        broker.close(Duration::from_secs(5)).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_in_flight() {
        let broker: Broker<String> = Broker::new();
        let done = Arc::new(AtomicUsize::new(0));
        let _sub = broker
            .subscribe("t", sleeper(Duration::from_millis(50), &done))
            .unwrap();

        for _ in 0..3 {
            broker.publish("t", "m").unwrap();
        }
        broker.close(Duration::from_secs(10)).await.unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(broker.in_flight(), 0);
        assert!(broker.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_deadline_exceeded() {
        let broker: Broker<String> = Broker::new();
        let done = Arc::new(AtomicUsize::new(0));
        let _sub = broker
            .subscribe("t", sleeper(Duration::from_secs(10), &done))
            .unwrap();
        broker.publish("t", "slow").unwrap();

        let result = broker.close(Duration::from_millis(1)).await;
        assert!(matches!(result, Err(BrokerError::DeadlineExceeded)));
        assert!(!broker.is_closed());
        assert_eq!(broker.in_flight(), 1);

        // The abandoned delivery still completes in the background.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        broker.close(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_with_cancellation_future() {
        let broker: Broker<String> = Broker::new();
        let done = Arc::new(AtomicUsize::new(0));
        let _sub = broker
            .subscribe("t", sleeper(Duration::from_secs(60), &done))
            .unwrap();
        broker.publish("t", "slow").unwrap();

        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
        let closer = tokio::spawn({
            let broker = broker.clone();
            async move {
                broker
                    .close_with(async {
                        let _ = cancel_rx.await;
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel_tx.send(()).unwrap();
        let result = closer.await.unwrap();
        assert!(matches!(result, Err(BrokerError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_subscribers_added_while_draining() {
        let broker: Broker<String> = Broker::new();
        let done = Arc::new(AtomicUsize::new(0));
        let _slow = broker
            .subscribe("t", sleeper(Duration::from_millis(100), &done))
            .unwrap();
        broker.publish("t", "slow").unwrap();

        let closer = tokio::spawn({
            let broker = broker.clone();
            async move { broker.close(Duration::from_secs(10)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!broker.is_closed());

        let log = Log::default();
        let late = broker.subscribe("t", recorder(&log)).unwrap();
        // The slow subscriber is already deactivated; only the newcomer accepts.
        assert_eq!(broker.publish("t", "late").unwrap(), 1);

        closer.await.unwrap().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["late".to_string()]);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(broker.is_closed());
        assert!(!broker.topic_exists("t"));
        assert_eq!(late.state(), WorkerState::Stopped);
        assert_eq!(broker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        let _sub = broker.subscribe("t", recorder(&log)).unwrap();

        broker.close(Duration::from_secs(1)).await.unwrap();

        assert!(broker.is_closed());
        assert!(!broker.topic_exists("t"));
        assert!(matches!(broker.publish("t", "m"), Err(BrokerError::Closed)));
        assert!(matches!(
            broker.subscribe("t", recorder(&log)),
            Err(BrokerError::Closed)
        ));
        // Closing again is a no-op.
        broker.close(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_after_close() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        let sub = broker.subscribe("t", recorder(&log)).unwrap();

        broker.close(Duration::from_secs(1)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), sub.unsubscribe())
            .await
            .expect("unsubscribe after close should return");
    }

    #[tokio::test]
    async fn test_brokers_are_independent() {
        let first: Broker<String> = Broker::new();
        let second: Broker<String> = Broker::new();
        let log = Log::default();
        let _sub = second.subscribe("t", recorder(&log)).unwrap();

        first.close(Duration::from_secs(1)).await.unwrap();

        assert!(!second.is_closed());
        assert_eq!(second.publish("t", "m").unwrap(), 1);
        second.close(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["m".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_topic() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();

        assert!(matches!(
            broker.subscribe("", recorder(&log)),
            Err(BrokerError::InvalidTopic(_))
        ));
        let long_name = "a".repeat(broker.config().max_topic_length + 1);
        assert!(matches!(
            broker.subscribe(&long_name, recorder(&log)),
            Err(BrokerError::InvalidTopic(_))
        ));
    }

    #[tokio::test]
    async fn test_any_non_empty_topic_is_accepted() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        let topics = ["héllo", "$sys", "a\tb"];
        let _subs: Vec<_> = topics
            .iter()
            .map(|topic| broker.subscribe(topic, recorder(&log)).unwrap())
            .collect();

        for topic in topics {
            assert_eq!(broker.publish(topic, topic).unwrap(), 1);
        }
        broker.close(Duration::from_secs(1)).await.unwrap();

        let mut received = log.lock().unwrap().clone();
        received.sort();
        let mut expected: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_limits() {
        let config = BrokerConfig {
            max_topics: 1,
            max_subscribers_per_topic: 2,
            ..BrokerConfig::default()
        };
        let broker: Broker<String> = Broker::with_config(config);
        let log = Log::default();

        let _s1 = broker.subscribe("a", recorder(&log)).unwrap();
        let _s2 = broker.subscribe("a", recorder(&log)).unwrap();
        assert!(matches!(
            broker.subscribe("a", recorder(&log)),
            Err(BrokerError::MaxSubscribersReached)
        ));
        assert!(matches!(
            broker.subscribe("b", recorder(&log)),
            Err(BrokerError::MaxTopicsReached)
        ));
        assert_eq!(broker.topics(), vec!["a".to_string()]);
    }

    #[test]
    fn test_subscribe_requires_runtime() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();
        assert!(matches!(
            broker.subscribe("t", recorder(&log)),
            Err(BrokerError::NoRuntime)
        ));
        assert!(!broker.topic_exists("t"));
    }

    #[tokio::test]
    async fn test_broker_stats() {
        let broker: Broker<String> = Broker::new();
        let log = Log::default();

        let _s1 = broker.subscribe("topic-1", recorder(&log)).unwrap();
        let _s2 = broker.subscribe("topic-2", recorder(&log)).unwrap();
        let _s3 = broker.subscribe("topic-1", recorder(&log)).unwrap();

        let stats = broker.stats();
        assert_eq!(stats.topic_count, 2);
        assert_eq!(stats.subscriber_count, 3);
        assert!(!stats.closed);
        assert_eq!(
            broker.topics(),
            vec!["topic-1".to_string(), "topic-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_shutdown_uses_configured_timeout() {
        let config = BrokerConfig {
            close_timeout_ms: 1_000,
            ..BrokerConfig::default()
        };
        let broker: Broker<String> = Broker::with_config(config);
        let log = Log::default();
        let _sub = broker.subscribe("t", recorder(&log)).unwrap();
        broker.publish("t", "m").unwrap();

        broker.shutdown().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["m".to_string()]);
    }

    #[tokio::test]
    async fn test_default_payload_is_bytes() {
        let broker = Broker::<Bytes>::default();
        let received = Arc::new(AtomicUsize::new(0));
        let _sub = broker
            .subscribe("bytes", {
                let received = Arc::clone(&received);
                move |msg: Message| {
                    let received = Arc::clone(&received);
                    async move {
                        received.fetch_add(msg.payload_size(), Ordering::SeqCst);
                    }
                }
            })
            .unwrap();

        broker.publish("bytes", b"hello".to_vec()).unwrap();
        broker.close(Duration::from_secs(1)).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 5);
    }
}
