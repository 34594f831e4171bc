//! Broker seam used by the notification helper.
//!
//! The helper only needs durable streams, a key-value bucket and
//! fire-and-forget publishes. [`NatsBroker`](super::NatsBroker) backs these
//! with JetStream; [`MemoryBroker`](super::MemoryBroker) keeps everything in
//! process for tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt::Display;
use thiserror::Error;

/// Resolves once the broker has stored (or rejected) a published message.
pub type AckFuture = BoxFuture<'static, Result<(), BrokerError>>;

/// Error that can occur in broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// NATS connection error
    #[error("connection to nats server at '{address}' failed: {reason}")]
    Connect { address: String, reason: String },

    /// Stream creation error
    #[error("stream error: {0}")]
    Stream(String),

    /// Key-value bucket error
    #[error("key-value error: {0}")]
    KeyValue(String),

    /// Publish error
    #[error("publish error: {0}")]
    Publish(String),

    /// Drain error
    #[error("drain error: {0}")]
    Drain(String),
}

impl BrokerError {
    pub fn connect(address: impl Into<String>, error: impl Display) -> Self {
        Self::Connect {
            address: address.into(),
            reason: error.to_string(),
        }
    }

    pub fn stream(error: impl Display) -> Self {
        Self::Stream(error.to_string())
    }

    pub fn key_value(error: impl Display) -> Self {
        Self::KeyValue(error.to_string())
    }

    pub fn publish(error: impl Display) -> Self {
        Self::Publish(error.to_string())
    }

    pub fn drain(error: impl Display) -> Self {
        Self::Drain(error.to_string())
    }
}

/// A publish/subscribe broker with durable streams and key-value buckets.
#[async_trait]
pub trait Broker: Send + Sync {
    type Bucket: KeyValueBucket;

    /// Whether a stream with this name already exists.
    async fn stream_exists(&self, stream: &str) -> bool;

    /// Create a durable stream covering `subjects`.
    async fn create_stream(&self, stream: &str, subjects: Vec<String>) -> Result<(), BrokerError>;

    /// Open the named bucket, creating it if needed.
    async fn create_bucket(&self, bucket: &str) -> Result<Self::Bucket, BrokerError>;

    /// Send a message without waiting for the broker's acknowledgement.
    ///
    /// An `Err` means the message never left. Rejections by the broker, such
    /// as a subject no stream covers or an ack timeout, surface through the
    /// returned [`AckFuture`].
    async fn publish(&self, subject: String, payload: Bytes) -> Result<AckFuture, BrokerError>;

    /// Flush pending work and close the connection.
    async fn drain(&self) -> Result<(), BrokerError>;
}

/// A durable key-value namespace.
#[async_trait]
pub trait KeyValueBucket: Send + Sync {
    /// Store `value` under `key`, returning the entry revision.
    async fn put(&self, key: &str, value: Bytes) -> Result<u64, BrokerError>;

    /// Every live entry in the bucket.
    async fn entries(&self) -> Result<Vec<(String, Bytes)>, BrokerError>;

    async fn delete(&self, key: &str) -> Result<(), BrokerError>;
}
