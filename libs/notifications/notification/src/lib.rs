//! Template based notification dispatch over NATS JetStream.
//!
//! Services describe *what* to send as [`Notification`]s bound to named
//! [`Template`]s, and ask for it to be sent by publishing a [`Trigger`]. The
//! pieces:
//!
//! - [`template`] - Handlebars subject/body pairs bound to a delivery [`Handler`]
//! - [`registry`] - concurrent store of compiled templates, keyed by name
//! - [`notification`] - the notification entity, validation and fan-out delivery
//! - [`dispatcher`] - resolves a trigger into a rendered, delivered notification
//! - [`helper`] - provisions the broker and publishes triggers and registrations
//!
//! ## Example
//!
//! ```rust,ignore
//! use notification::{NotificationHelper, NotificationHelperConfig, Trigger};
//! use std::collections::HashMap;
//!
//! let config = NotificationHelperConfig::new("nats://localhost:4222");
//! let helper = NotificationHelper::start("sharing", config, &HashMap::new()).await?;
//!
//! let trigger = Trigger::new("share-created", "noreply@example.com")
//!     .with_param("file", "report.pdf");
//! helper.trigger_notification(&trigger).await;
//! helper.stop().await;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod helper;
pub mod manager;
pub mod notification;
pub mod registry;
pub mod template;
pub mod trigger;

pub use config::{ConfigError, NotificationHelperConfig, DEFAULT_MAX_PENDING, DEFAULT_STREAM};
pub use dispatcher::Dispatcher;
pub use error::{NotificationError, NotificationResult};
pub use handler::{Handler, HandlerTable, MockHandler};
pub use helper::{
    Broker, BrokerError, HelperError, KeyValueBucket, MemoryBroker, NatsBroker, NotificationHelper,
};
pub use manager::{InMemoryManager, Manager};
pub use notification::Notification;
pub use registry::Registry;
pub use template::{RegistrationError, RegistrationRequest, Template, TemplateError};
pub use trigger::Trigger;
