//! Subscriber callbacks.

use crate::message::Message;
use async_trait::async_trait;
use std::future::Future;

/// A callback invoked once per delivered message.
///
/// The broker awaits each invocation on the subscriber's own worker task, so
/// a handler never runs concurrently with itself. Errors and panics raised by
/// the handler are its own business: the broker does not catch, log, or retry
/// them.
///
/// Any `Fn(Message<T>) -> impl Future<Output = ()>` closure is a handler:
///
/// ```rust,ignore
/// broker.subscribe("orders", |msg: Message<Bytes>| async move {
///     println!("{} bytes", msg.payload_size());
/// })?;
/// ```
#[async_trait]
pub trait Handler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Handle a single message.
    async fn handle(&self, message: Message<T>);
}

#[async_trait]
impl<T, F, Fut> Handler<T> for F
where
    T: Send + Sync + 'static,
    F: Fn(Message<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, message: Message<T>) {
        (self)(message).await;
    }
}
