//! Delivery handlers.
//!
//! A handler delivers one rendered message to one recipient. Concrete
//! transports (mail, chat, ...) live outside this crate and are looked up by
//! name through a [`HandlerTable`] when a template is registered.

pub mod mock;

pub use mock::{MockHandler, SentMessage};

use async_trait::async_trait;
use eyre::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers keyed by the name used in template registrations.
pub type HandlerTable = HashMap<String, Arc<dyn Handler>>;

/// Trait for notification transports
#[async_trait]
pub trait Handler: Send + Sync {
    /// Deliver a rendered message to a single recipient
    async fn send(&self, sender: &str, recipient: &str, subject: &str, body: &str) -> Result<()>;

    /// Get handler name
    fn name(&self) -> &'static str;
}
