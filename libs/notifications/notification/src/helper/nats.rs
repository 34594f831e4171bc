//! NATS JetStream broker.

use super::broker::{AckFuture, Broker, BrokerError, KeyValueBucket};
use async_nats::jetstream::{self, kv, stream::Config as StreamConfig, Context};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, TryStreamExt};
use tracing::{debug, info};

/// Broker backed by a NATS connection and its JetStream context.
pub struct NatsBroker {
    client: Client,
    jetstream: Context,
}

impl NatsBroker {
    /// Connect to `address`, authenticating with `token` when one is given.
    pub async fn connect(address: &str, token: Option<&str>) -> Result<Self, BrokerError> {
        let options = match token {
            Some(token) if !token.is_empty() => ConnectOptions::with_token(token.to_string()),
            _ => ConnectOptions::new(),
        };

        info!(url = %address, "Connecting to NATS...");
        let client = options
            .connect(address)
            .await
            .map_err(|e| BrokerError::connect(address, e))?;
        info!("Connected to NATS successfully");

        Ok(Self::from_client(client))
    }

    /// Wrap an existing connection.
    pub fn from_client(client: Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self { client, jetstream }
    }

    /// Get the JetStream context.
    pub fn jetstream(&self) -> &Context {
        &self.jetstream
    }
}

#[async_trait]
impl Broker for NatsBroker {
    type Bucket = NatsBucket;

    async fn stream_exists(&self, stream: &str) -> bool {
        match self.jetstream.get_stream(stream).await {
            Ok(_) => true,
            Err(e) => {
                debug!(stream = %stream, error = %e, "Stream lookup failed, treating as absent");
                false
            }
        }
    }

    async fn create_stream(&self, stream: &str, subjects: Vec<String>) -> Result<(), BrokerError> {
        self.jetstream
            .create_stream(StreamConfig {
                name: stream.to_string(),
                subjects,
                ..Default::default()
            })
            .await
            .map_err(BrokerError::stream)?;
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<NatsBucket, BrokerError> {
        if let Ok(store) = self.jetstream.get_key_value(bucket).await {
            debug!(bucket = %bucket, "Key-value bucket already exists");
            return Ok(NatsBucket { store });
        }

        let store = self
            .jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .map_err(BrokerError::key_value)?;

        info!(bucket = %bucket, "Key-value bucket created");
        Ok(NatsBucket { store })
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<AckFuture, BrokerError> {
        let ack = self
            .jetstream
            .publish(subject.clone(), payload)
            .await
            .map_err(BrokerError::publish)?;

        Ok(async move {
            let ack = ack.await.map_err(BrokerError::publish)?;
            debug!(subject = %subject, sequence = ack.sequence, "Publish acknowledged");
            Ok(())
        }
        .boxed())
    }

    async fn drain(&self) -> Result<(), BrokerError> {
        self.client.drain().await.map_err(BrokerError::drain)
    }
}

/// JetStream key-value bucket.
pub struct NatsBucket {
    store: kv::Store,
}

#[async_trait]
impl KeyValueBucket for NatsBucket {
    async fn put(&self, key: &str, value: Bytes) -> Result<u64, BrokerError> {
        self.store
            .put(key, value)
            .await
            .map_err(BrokerError::key_value)
    }

    async fn entries(&self) -> Result<Vec<(String, Bytes)>, BrokerError> {
        let keys: Vec<String> = self
            .store
            .keys()
            .await
            .map_err(BrokerError::key_value)?
            .try_collect()
            .await
            .map_err(BrokerError::key_value)?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self
                .store
                .get(key.as_str())
                .await
                .map_err(BrokerError::key_value)?
            {
                entries.push((key, value));
            }
        }

        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        self.store
            .delete(key)
            .await
            .map_err(BrokerError::key_value)
    }
}
