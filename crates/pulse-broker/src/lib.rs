//! # pulse-broker
//!
//! In-process, topic-based publish/subscribe for the Pulse realtime engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Broker** - Topic registry with non-blocking fan-out publish
//! - **Subscription** - Handle for idempotent, draining teardown
//! - **Handler** - Async callback invoked once per delivered message
//! - **Message** - Envelope sharing one payload across all deliveries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │  Publisher  │────▶│   Broker    │────▶│ Subscriber queue │──▶ worker ──▶ Handler
//! └─────────────┘     └─────────────┘     └──────────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  In-flight  │◀── Broker::close waits here
//!                     └─────────────┘
//! ```
//!
//! Delivery order is FIFO per subscriber. Nothing is promised across
//! subscribers or topics.
//!
//! ```rust,ignore
//! let broker: Broker<String> = Broker::new();
//! let sub = broker.subscribe("orders", |msg: Message<String>| async move {
//!     println!("{}", msg.payload());
//! })?;
//! broker.publish("orders", "created")?;
//! sub.unsubscribe().await;
//! broker.close(Duration::from_secs(5)).await?;
//! ```

pub mod broker;
pub mod config;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod subscriber;
pub mod subscription;
pub mod topic;

mod shutdown;

pub use broker::{Broker, BrokerError, BrokerStats};
pub use config::{BrokerConfig, ConfigError};
pub use handler::Handler;
pub use message::{Message, MessageId};
pub use subscriber::{SubscriberId, WorkerState};
pub use subscription::Subscription;
pub use topic::validate_topic_name;
