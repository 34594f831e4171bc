use thiserror::Error;

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The registration record could not be decoded.
    #[error("template registration decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The registration names a handler missing from the handler table.
    #[error("unknown handler {0}")]
    UnknownHandler(String),

    /// The template source could not be read.
    #[error("template file {path} not found")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The template source does not compile.
    #[error("template file {path} is invalid: {source}")]
    Syntax {
        path: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    /// The template name has characters outside `[A-Za-z0-9-]`.
    #[error("template name {0} must contain only alphanumeric characters and hyphens")]
    InvalidName(String),

    /// Rendering failed, e.g. on a missing field reference.
    #[error("template rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// A failed template registration.
///
/// Carries the best-effort name of the rejected template so the caller can
/// act on the stored record.
#[derive(Debug, Error)]
#[error("template {name} registration failed: {source}")]
pub struct RegistrationError {
    pub name: String,
    #[source]
    pub source: TemplateError,
}

impl RegistrationError {
    pub(crate) fn new(name: impl Into<String>, source: impl Into<TemplateError>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Whether the stored registration record should be removed.
    ///
    /// Only a missing template file qualifies; anything else (syntax errors,
    /// unknown handlers) may be fixed in place and retried.
    pub fn should_delete(&self) -> bool {
        matches!(self.source, TemplateError::FileNotFound { .. })
    }
}
