//! Notification storage contract.

use crate::error::{NotificationError, NotificationResult};
use crate::notification::Notification;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for registered notifications.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Insert or update a notification.
    async fn upsert_notification(&self, notification: Notification) -> NotificationResult<()>;

    /// Read a notification by ref.
    async fn get_notification(&self, reference: &str) -> NotificationResult<Notification>;

    /// Delete a notification by ref.
    async fn delete_notification(&self, reference: &str) -> NotificationResult<()>;
}

/// In-memory notification manager
#[derive(Default)]
pub struct InMemoryManager {
    notifications: RwLock<HashMap<String, Notification>>,
}

impl InMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Manager for InMemoryManager {
    async fn upsert_notification(&self, notification: Notification) -> NotificationResult<()> {
        notification.check()?;
        self.notifications
            .write()
            .await
            .insert(notification.reference.clone(), notification);
        Ok(())
    }

    async fn get_notification(&self, reference: &str) -> NotificationResult<Notification> {
        self.notifications
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| NotificationError::NotificationNotFound(reference.to_string()))
    }

    async fn delete_notification(&self, reference: &str) -> NotificationResult<()> {
        self.notifications
            .write()
            .await
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| NotificationError::NotificationNotFound(reference.to_string()))
    }
}
