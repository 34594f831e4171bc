//! Notification triggers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request to fire the notification registered under `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sender: String,
    /// Render parameters for the notification's template.
    #[serde(default)]
    pub template_data: Map<String, Value>,
}

impl Trigger {
    pub fn new(reference: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            sender: sender.into(),
            template_data: Map::new(),
        }
    }

    pub fn with_template_data(mut self, template_data: Map<String, Value>) -> Self {
        self.template_data = template_data;
        self
    }

    /// Add a single render parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.template_data.insert(key.into(), value.into());
        self
    }
}
