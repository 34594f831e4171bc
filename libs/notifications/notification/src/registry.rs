//! In-memory template registry.

use crate::error::{NotificationError, NotificationResult};
use crate::handler::HandlerTable;
use crate::template::{RegistrationError, Template, TemplateError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Compiled templates keyed by name.
///
/// Registration events and rendering requests may arrive from different
/// tasks; every access goes through the inner lock.
#[derive(Default)]
pub struct Registry {
    templates: RwLock<HashMap<String, Arc<Template>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a JSON registration record and store it under its name,
    /// replacing any previous template with that name.
    ///
    /// Returns the registered name. On failure, [`RegistrationError::should_delete`]
    /// tells whether the stored record is beyond repair.
    pub async fn put(&self, raw: &[u8], handlers: &HandlerTable) -> Result<String, RegistrationError> {
        let fields: Map<String, Value> = serde_json::from_slice(raw)
            .map_err(|e| RegistrationError::new(String::new(), TemplateError::Decode(e)))?;

        let template = Template::new(fields, handlers)?;
        Ok(self.insert(template).await)
    }

    /// Store an already compiled template.
    pub async fn insert(&self, template: Template) -> String {
        let name = template.name().to_string();
        let replaced = self
            .templates
            .write()
            .await
            .insert(name.clone(), Arc::new(template))
            .is_some();

        debug!(template = %name, replaced, "Template registered");
        name
    }

    /// Look up a template by name.
    pub async fn get(&self, name: &str) -> NotificationResult<Arc<Template>> {
        self.templates
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| NotificationError::TemplateNotFound(name.to_string()))
    }

    /// Drop a template. Returns whether it was present.
    pub async fn remove(&self, name: &str) -> bool {
        self.templates.write().await.remove(name).is_some()
    }

    /// List all registered template names
    pub async fn names(&self) -> Vec<String> {
        self.templates.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.templates.read().await.is_empty()
    }
}
