//! Message types carried through the broker.
//!
//! A message lives only inside subscriber queues. Fan-out clones the
//! envelope, never the payload.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A message routed to every subscriber of its topic.
#[derive(Debug)]
pub struct Message<T = Bytes> {
    /// Unique message identifier.
    pub id: MessageId,
    /// Target topic.
    pub topic: Arc<str>,
    /// Message payload (shared across all deliveries).
    pub payload: Arc<T>,
    /// Timestamp when the message was created, in milliseconds.
    pub timestamp: u64,
}

// Manual impl: deriving would require `T: Clone`.
impl<T> Clone for Message<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            topic: Arc::clone(&self.topic),
            payload: Arc::clone(&self.payload),
            timestamp: self.timestamp,
        }
    }
}

impl<T> Message<T> {
    /// Create a new message.
    #[must_use]
    pub fn new(topic: impl Into<Arc<str>>, payload: impl Into<T>) -> Self {
        Self::from_shared(topic, Arc::new(payload.into()))
    }

    /// Create a message around an already shared payload.
    #[must_use]
    pub fn from_shared(topic: impl Into<Arc<str>>, payload: Arc<T>) -> Self {
        Self {
            id: generate_message_id(),
            topic: topic.into(),
            payload,
            timestamp: now_millis(),
        }
    }

    /// Get the topic this message was published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Get the payload.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

impl Message<Bytes> {
    /// Get the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}
