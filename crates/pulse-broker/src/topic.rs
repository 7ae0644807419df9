//! Topic abstraction for the broker.
//!
//! A topic is a named routing key holding the set of live subscribers that
//! receive every message published to it.

use crate::subscriber::{Subscriber, SubscriberId};
use std::sync::Arc;
use tracing::debug;

/// Default maximum topic name length.
pub const MAX_TOPIC_NAME_LENGTH: usize = 256;

/// Validate a topic name.
///
/// # Errors
///
/// Returns an error message if the topic name is invalid.
pub fn validate_topic_name(name: &str, max_length: usize) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Topic name cannot be empty");
    }
    if name.len() > max_length {
        return Err("Topic name too long");
    }
    Ok(())
}

/// A registry entry: one topic and its subscribers.
pub(crate) struct Topic<T> {
    name: Arc<str>,
    subscribers: Vec<Arc<Subscriber<T>>>,
}

impl<T> Topic<T> {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self {
            name,
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn insert(&mut self, subscriber: Arc<Subscriber<T>>) {
        debug!(topic = %self.name, subscriber = subscriber.id(), "Subscriber joined topic");
        self.subscribers.push(subscriber);
    }

    /// Remove a subscriber by id.
    ///
    /// Returns `true` if the subscriber was registered here.
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        match self.subscribers.iter().position(|s| s.id() == id) {
            Some(index) => {
                // Order across subscribers carries no meaning.
                self.subscribers.swap_remove(index);
                debug!(topic = %self.name, subscriber = id, "Subscriber left topic");
                true
            }
            None => false,
        }
    }

    /// Copy of the current subscriber set, taken for a single publish.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscriber<T>>> {
        self.subscribers.clone()
    }

    pub(crate) fn subscribers(&self) -> impl Iterator<Item = &Arc<Subscriber<T>>> {
        self.subscribers.iter()
    }

    pub(crate) fn into_subscribers(self) -> Vec<Arc<Subscriber<T>>> {
        self.subscribers
    }
}
