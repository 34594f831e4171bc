//! In-process broker for testing

use super::broker::{AckFuture, Broker, BrokerError, KeyValueBucket};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{self, FutureExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A message captured by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

#[derive(Default)]
struct State {
    streams: HashMap<String, Vec<String>>,
    stream_creations: usize,
    buckets: HashMap<String, BTreeMap<String, Bytes>>,
    published: Vec<PublishedMessage>,
    drained: bool,
}

#[derive(Default, Clone, Copy)]
struct Failures {
    streams: bool,
    buckets: bool,
    writes: bool,
    acks: bool,
    drain: bool,
}

/// Broker that keeps streams, buckets and published messages in memory
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
    failures: Failures,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a stream, as if provisioned by an earlier run
    pub async fn with_stream(self, stream: &str, subjects: Vec<String>) -> Self {
        self.state
            .lock()
            .await
            .streams
            .insert(stream.to_string(), subjects);
        self
    }

    /// Store an entry directly in a bucket
    pub async fn insert_entry(&self, bucket: &str, key: &str, value: impl Into<Bytes>) {
        self.state
            .lock()
            .await
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Fail every stream creation
    pub fn failing_streams(mut self) -> Self {
        self.failures.streams = true;
        self
    }

    /// Fail every bucket creation
    pub fn failing_buckets(mut self) -> Self {
        self.failures.buckets = true;
        self
    }

    /// Fail every publish and bucket write
    pub fn failing_writes(mut self) -> Self {
        self.failures.writes = true;
        self
    }

    /// Accept every publish but reject its acknowledgement
    pub fn failing_acks(mut self) -> Self {
        self.failures.acks = true;
        self
    }

    /// Fail on drain
    pub fn failing_drain(mut self) -> Self {
        self.failures.drain = true;
        self
    }

    /// Get all published messages
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.published.clone()
    }

    /// Subjects of a stream, if it exists
    pub async fn stream_subjects(&self, stream: &str) -> Option<Vec<String>> {
        self.state.lock().await.streams.get(stream).cloned()
    }

    /// Number of successful `create_stream` calls
    pub async fn stream_creations(&self) -> usize {
        self.state.lock().await.stream_creations
    }

    /// Read an entry from a bucket
    pub async fn entry(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .await
            .buckets
            .get(bucket)
            .and_then(|entries| entries.get(key).cloned())
    }

    pub async fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().await.buckets.contains_key(bucket)
    }

    pub async fn is_drained(&self) -> bool {
        self.state.lock().await.drained
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Bucket = MemoryBucket;

    async fn stream_exists(&self, stream: &str) -> bool {
        self.state.lock().await.streams.contains_key(stream)
    }

    async fn create_stream(&self, stream: &str, subjects: Vec<String>) -> Result<(), BrokerError> {
        if self.failures.streams {
            return Err(BrokerError::stream("stream creation refused"));
        }

        let mut state = self.state.lock().await;
        if state.streams.contains_key(stream) {
            return Err(BrokerError::stream(format!("stream name {stream} already in use")));
        }
        state.streams.insert(stream.to_string(), subjects);
        state.stream_creations += 1;
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<MemoryBucket, BrokerError> {
        if self.failures.buckets {
            return Err(BrokerError::key_value("bucket creation refused"));
        }

        self.state
            .lock()
            .await
            .buckets
            .entry(bucket.to_string())
            .or_default();

        Ok(MemoryBucket {
            name: bucket.to_string(),
            state: self.state.clone(),
            fail_writes: self.failures.writes,
        })
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<AckFuture, BrokerError> {
        if self.failures.writes {
            return Err(BrokerError::publish("connection closed"));
        }

        let ack = if self.failures.acks {
            Err(BrokerError::publish(format!("no stream matches subject {subject}")))
        } else {
            Ok(())
        };

        self.state
            .lock()
            .await
            .published
            .push(PublishedMessage { subject, payload });
        Ok(future::ready(ack).boxed())
    }

    async fn drain(&self) -> Result<(), BrokerError> {
        if self.failures.drain {
            return Err(BrokerError::drain("connection already closed"));
        }

        self.state.lock().await.drained = true;
        Ok(())
    }
}

/// Bucket handle returned by [`MemoryBroker`].
pub struct MemoryBucket {
    name: String,
    state: Arc<Mutex<State>>,
    fail_writes: bool,
}

#[async_trait]
impl KeyValueBucket for MemoryBucket {
    async fn put(&self, key: &str, value: Bytes) -> Result<u64, BrokerError> {
        if self.fail_writes {
            return Err(BrokerError::key_value("write refused"));
        }

        let mut state = self.state.lock().await;
        let entries = state.buckets.entry(self.name.clone()).or_default();
        entries.insert(key.to_string(), value);
        Ok(entries.len() as u64)
    }

    async fn entries(&self) -> Result<Vec<(String, Bytes)>, BrokerError> {
        Ok(self
            .state
            .lock()
            .await
            .buckets
            .get(&self.name)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        if let Some(entries) = self.state.lock().await.buckets.get_mut(&self.name) {
            entries.remove(key);
        }
        Ok(())
    }
}
