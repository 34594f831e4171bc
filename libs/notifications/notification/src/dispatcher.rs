//! Trigger dispatch.

use crate::error::NotificationResult;
use crate::manager::Manager;
use crate::registry::Registry;
use crate::trigger::Trigger;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolves triggers into rendered, delivered notifications.
#[derive(Clone)]
pub struct Dispatcher {
    manager: Arc<dyn Manager>,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(manager: Arc<dyn Manager>, registry: Arc<Registry>) -> Self {
        Self { manager, registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Look up the triggered notification and its template, then send it.
    #[instrument(skip(self, trigger), fields(notification = %trigger.reference))]
    pub async fn dispatch(&self, trigger: &Trigger) -> NotificationResult<()> {
        let mut notification = self.manager.get_notification(&trigger.reference).await?;
        notification.check()?;

        let template = self.registry.get(&notification.template_name).await?;
        notification.init_template(template);

        notification
            .send(&trigger.sender, &trigger.template_data)
            .await?;

        debug!(sender = %trigger.sender, "Trigger dispatched");
        Ok(())
    }
}
