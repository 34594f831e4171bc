//! Notification templates.
//!
//! A [`Template`] pairs a compiled subject and body with the [`Handler`] that
//! delivers them. Both are Handlebars templates in strict mode, so a reference
//! to a missing field fails rendering instead of producing an empty string.
//!
//! - the **subject** is plain text and is rendered without escaping
//! - the **body** is markup and HTML-escapes every `{{value}}`

mod error;

pub use error::{RegistrationError, TemplateError};

use crate::handler::{Handler, HandlerTable};
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::sync::Arc;
use tracing::debug;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]*$").expect("valid name pattern"));

/// Whether `name` only uses alphanumeric characters and hyphens.
pub(crate) fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Wire form of a template registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub handler: String,
    pub body_template_path: String,
    pub subject_template_path: String,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Clone, Copy)]
enum TemplateKind {
    Subject,
    Body,
}

impl TemplateKind {
    fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Subject => "subject",
            TemplateKind::Body => "body",
        }
    }
}

/// A compiled subject/body pair bound to a delivery handler.
pub struct Template {
    name: String,
    handler: Arc<dyn Handler>,
    persistent: bool,
    subject: Handlebars<'static>,
    body: Handlebars<'static>,
}

impl Template {
    /// Build a template from loosely typed registration fields.
    pub fn new(fields: Map<String, Value>, handlers: &HandlerTable) -> Result<Self, RegistrationError> {
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let request: RegistrationRequest = serde_json::from_value(Value::Object(fields))
            .map_err(|e| RegistrationError::new(name, e))?;

        Self::from_request(request, handlers)
    }

    /// Build a template from a decoded registration request.
    pub fn from_request(
        request: RegistrationRequest,
        handlers: &HandlerTable,
    ) -> Result<Self, RegistrationError> {
        let RegistrationRequest {
            name,
            handler,
            body_template_path,
            subject_template_path,
            persistent,
        } = request;

        let Some(handler) = handlers.get(&handler).cloned() else {
            return Err(RegistrationError::new(
                name,
                TemplateError::UnknownHandler(handler),
            ));
        };

        let subject = compile(&subject_template_path, TemplateKind::Subject)
            .map_err(|e| RegistrationError::new(name.as_str(), e))?;
        let body = compile(&body_template_path, TemplateKind::Body)
            .map_err(|e| RegistrationError::new(name.as_str(), e))?;

        if !is_valid_name(&name) {
            return Err(RegistrationError::new(
                name.clone(),
                TemplateError::InvalidName(name),
            ));
        }

        debug!(template = %name, handler = handler.name(), "Template compiled");

        Ok(Self {
            name,
            handler,
            persistent,
            subject,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Whether the registration should survive restarts.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Render the subject as plain text.
    pub fn render_subject(&self, data: &Map<String, Value>) -> Result<String, TemplateError> {
        Ok(self.subject.render(TemplateKind::Subject.as_str(), data)?)
    }

    /// Render the body with HTML escaping.
    pub fn render_body(&self, data: &Map<String, Value>) -> Result<String, TemplateError> {
        Ok(self.body.render(TemplateKind::Body.as_str(), data)?)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("handler", &self.handler.name())
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

fn compile(path: &str, kind: TemplateKind) -> Result<Handlebars<'static>, TemplateError> {
    let source = fs::read_to_string(path).map_err(|source| TemplateError::FileNotFound {
        path: path.to_string(),
        source,
    })?;

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    match kind {
        TemplateKind::Subject => handlebars.register_escape_fn(handlebars::no_escape),
        TemplateKind::Body => handlebars.register_escape_fn(handlebars::html_escape),
    }

    handlebars
        .register_template_string(kind.as_str(), source)
        .map_err(|e| TemplateError::Syntax {
            path: path.to_string(),
            source: Box::new(e),
        })?;

    Ok(handlebars)
}
