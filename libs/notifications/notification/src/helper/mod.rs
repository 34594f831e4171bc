//! Broker-facing side of notification dispatch.
//!
//! [`NotificationHelper`] is what services embed to take part in notification
//! dispatch. Starting it provisions everything on the broker:
//!
//! ```text
//! <stream>                      JetStream stream
//! ├── <stream>.notification
//! ├── <stream>.notification-register
//! ├── <stream>.notification-unregister
//! └── <stream>.trigger
//! <stream>-template             key-value bucket, one entry per template
//! ```
//!
//! Publishing triggers, (un)registering notifications and registering
//! templates are fire-and-forget: failures are logged and counted, never
//! returned to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use notification::{NotificationHelper, NotificationHelperConfig, Trigger};
//!
//! let config = NotificationHelperConfig::from_env()?;
//! let helper = NotificationHelper::start("sharing", config, &templates).await?;
//!
//! helper
//!     .trigger_notification(&Trigger::new("share-created", "noreply@example.com"))
//!     .await;
//!
//! helper.stop().await;
//! ```

mod broker;
mod error;
mod memory;
mod metrics;
mod nats;

pub use broker::{AckFuture, Broker, BrokerError, KeyValueBucket};
pub use error::HelperError;
pub use memory::{MemoryBroker, MemoryBucket, PublishedMessage};
pub use metrics::HelperMetrics;
pub use nats::{NatsBroker, NatsBucket};

use crate::config::NotificationHelperConfig;
use crate::handler::HandlerTable;
use crate::notification::Notification;
use crate::registry::Registry;
use crate::template::RegistrationRequest;
use crate::trigger::Trigger;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

const REGISTER_TEMPLATE: &str = "register_template";
const REGISTER_NOTIFICATION: &str = "register_notification";
const UNREGISTER_NOTIFICATION: &str = "unregister_notification";
const TRIGGER_NOTIFICATION: &str = "trigger_notification";

/// Subjects covered by the notification stream.
///
/// Registration and unregistration subjects are included on purpose: without
/// them the stream would not capture those publishes and every one of them
/// would be rejected by the broker.
pub fn stream_subjects(stream: &str) -> Vec<String> {
    ["notification", "notification-register", "notification-unregister", "trigger"]
        .iter()
        .map(|suffix| format!("{stream}.{suffix}"))
        .collect()
}

/// Name of the key-value bucket holding template registrations.
pub fn template_bucket(stream: &str) -> String {
    format!("{stream}-template")
}

/// Connection to the notification stream and template store.
///
/// Only a successfully started helper can be obtained, so every method may
/// assume the stream and bucket exist.
pub struct NotificationHelper<B: Broker = NatsBroker> {
    name: String,
    config: NotificationHelperConfig,
    broker: B,
    templates: B::Bucket,
    metrics: HelperMetrics,
    in_flight: Arc<Semaphore>,
    max_pending: u32,
}

impl NotificationHelper<NatsBroker> {
    /// Connect to NATS and provision the stream and template bucket.
    ///
    /// `templates` are registered right away; see
    /// [`NotificationHelper::register_templates`].
    pub async fn start(
        name: impl Into<String>,
        mut config: NotificationHelperConfig,
        templates: &HashMap<String, RegistrationRequest>,
    ) -> Result<Self, HelperError> {
        config.apply_defaults();

        let broker = NatsBroker::connect(&config.nats_address, config.nats_token.as_deref())
            .await
            .map_err(|source| HelperError::Connection {
                address: config.nats_address.clone(),
                source,
            })?;

        Self::with_broker(name, config, broker, templates).await
    }
}

impl<B: Broker> NotificationHelper<B> {
    /// Provision the stream and template bucket on an already connected broker.
    pub async fn with_broker(
        name: impl Into<String>,
        mut config: NotificationHelperConfig,
        broker: B,
        templates: &HashMap<String, RegistrationRequest>,
    ) -> Result<Self, HelperError> {
        config.apply_defaults();
        let name = name.into();
        let stream = config.nats_stream.clone();

        if broker.stream_exists(&stream).await {
            debug!(service = %name, stream = %stream, "Stream already exists");
        } else {
            info!(service = %name, stream = %stream, "Creating stream");
            broker
                .create_stream(&stream, stream_subjects(&stream))
                .await
                .map_err(HelperError::Stream)?;
        }

        let bucket = broker
            .create_bucket(&template_bucket(&stream))
            .await
            .map_err(HelperError::KeyValue)?;

        let max_pending = u32::try_from(config.max_pending).unwrap_or(u32::MAX);
        let helper = Self {
            metrics: HelperMetrics::new(&name),
            name,
            config,
            broker,
            templates: bucket,
            in_flight: Arc::new(Semaphore::new(max_pending as usize)),
            max_pending,
        };

        match helper.register_templates(templates).await {
            0 => info!(service = %helper.name, "no templates to register"),
            count => info!(
                service = %helper.name,
                count,
                "{} notification templates successfully registered",
                count
            ),
        }

        Ok(helper)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &NotificationHelperConfig {
        &self.config
    }

    pub fn stream(&self) -> &str {
        &self.config.nats_stream
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Full subject name for `suffix` within the notification stream.
    pub fn subject(&self, suffix: &str) -> String {
        format!("{}.{}", self.config.nats_stream, suffix)
    }

    /// Number of publishes and bucket writes that failed since start.
    pub fn failure_count(&self) -> u64 {
        self.metrics.failure_count()
    }

    /// Wait until every publish sent so far has been acknowledged or rejected.
    pub async fn flush(&self) {
        // Holding every permit at once means no acknowledgement is pending.
        let _ = self.in_flight.acquire_many(self.max_pending).await;
    }

    /// Drain the connection. A failure here is fatal to the process.
    pub async fn stop(self) {
        let service = self.name.clone();
        if let Err(e) = self.try_stop().await {
            error!(service = %service, error = %e, "Failed to drain nats connection");
            std::process::exit(1);
        }
    }

    /// Drain the connection, returning the failure instead of exiting.
    pub async fn try_stop(self) -> Result<(), HelperError> {
        self.flush().await;
        self.broker.drain().await.map_err(HelperError::Drain)?;
        info!(service = %self.name, "Notification helper stopped");
        Ok(())
    }

    /// Register every template in `templates`, returning how many were sent.
    ///
    /// A request without a name is registered under its map key.
    pub async fn register_templates(
        &self,
        templates: &HashMap<String, RegistrationRequest>,
    ) -> usize {
        let mut count = 0;
        for (key, request) in templates {
            if request.name.is_empty() {
                let mut request = request.clone();
                request.name = key.clone();
                self.register_template(&request).await;
            } else {
                self.register_template(request).await;
            }
            count += 1;
        }
        count
    }

    /// Store a template registration in the template bucket.
    pub async fn register_template(&self, request: &RegistrationRequest) {
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(e) => return self.record_failure(REGISTER_TEMPLATE, "json marshalling", &e),
        };

        match self.templates.put(&request.name, Bytes::from(payload)).await {
            Ok(revision) => {
                self.metrics.published(REGISTER_TEMPLATE);
                debug!(
                    service = %self.name,
                    template = %request.name,
                    revision,
                    "template registration published"
                );
            }
            Err(e) => self.record_failure(REGISTER_TEMPLATE, "publish", &e),
        }
    }

    /// Publish a notification registration.
    pub async fn register_notification(&self, notification: &Notification) {
        let payload = match serde_json::to_vec(notification) {
            Ok(payload) => payload,
            Err(e) => return self.record_failure(REGISTER_NOTIFICATION, "json marshalling", &e),
        };

        if self
            .publish(REGISTER_NOTIFICATION, self.subject("notification-register"), payload)
            .await
        {
            debug!(
                service = %self.name,
                notification = %notification.reference,
                "notification registration published"
            );
        }
    }

    /// Publish a notification unregistration. The payload is the bare ref.
    pub async fn unregister_notification(&self, reference: &str) {
        if self
            .publish(
                UNREGISTER_NOTIFICATION,
                self.subject("notification-unregister"),
                reference.as_bytes().to_vec(),
            )
            .await
        {
            debug!(
                service = %self.name,
                notification = %reference,
                "notification unregistration published"
            );
        }
    }

    /// Publish a trigger for the notifications service.
    pub async fn trigger_notification(&self, trigger: &Trigger) {
        let payload = match serde_json::to_vec(trigger) {
            Ok(payload) => payload,
            Err(e) => return self.record_failure(TRIGGER_NOTIFICATION, "json marshalling", &e),
        };

        if self
            .publish(TRIGGER_NOTIFICATION, self.subject("trigger"), payload)
            .await
        {
            debug!(
                service = %self.name,
                notification = %trigger.reference,
                "notification trigger published"
            );
        }
    }

    /// Compile every stored template registration into `registry`.
    ///
    /// Records whose template files are gone are removed from the bucket;
    /// other failures leave the record in place for a later attempt.
    /// Returns the number of templates loaded.
    pub async fn load_templates(
        &self,
        registry: &Registry,
        handlers: &HandlerTable,
    ) -> Result<usize, HelperError> {
        let entries = self
            .templates
            .entries()
            .await
            .map_err(HelperError::TemplateLoad)?;

        let mut loaded = 0;
        for (key, raw) in entries {
            match registry.put(&raw, handlers).await {
                Ok(name) => {
                    debug!(service = %self.name, template = %name, "Template loaded");
                    loaded += 1;
                }
                Err(e) if e.should_delete() => {
                    warn!(service = %self.name, key = %key, error = %e, "Removing template registration");
                    if let Err(e) = self.templates.delete(&key).await {
                        error!(service = %self.name, key = %key, error = %e, "Template registration removal failed");
                    }
                }
                Err(e) => {
                    warn!(service = %self.name, key = %key, error = %e, "Template registration skipped");
                }
            }
        }

        info!(service = %self.name, loaded, "Templates loaded from store");
        Ok(loaded)
    }

    async fn publish(&self, operation: &'static str, subject: String, payload: Vec<u8>) -> bool {
        let permit = match self.in_flight.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                self.record_failure(operation, "publish", &e);
                return false;
            }
        };

        let ack = match self.broker.publish(subject.clone(), Bytes::from(payload)).await {
            Ok(ack) => ack,
            Err(e) => {
                self.record_failure(operation, "publish", &e);
                return false;
            }
        };

        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            match ack.await {
                Ok(()) => metrics.published(operation),
                Err(e) => record_failure(&metrics, operation, "acknowledgement", &e),
            }
            debug!(subject = %subject, "Publish settled");
            drop(permit);
        });

        true
    }

    fn record_failure(&self, operation: &'static str, stage: &str, err: &dyn Display) {
        record_failure(&self.metrics, operation, stage, err);
    }
}

fn record_failure(metrics: &HelperMetrics, operation: &'static str, stage: &str, err: &dyn Display) {
    error!(
        service = %metrics.service(),
        operation,
        error = %err,
        "{} {} failed",
        operation,
        stage
    );
    metrics.failed(operation);
}
