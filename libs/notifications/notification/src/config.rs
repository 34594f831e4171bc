//! Notification helper configuration.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Stream used when none is configured.
pub const DEFAULT_STREAM: &str = "reva-notifications";

/// Publishes allowed to wait for a JetStream ack at once.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Connection settings for the notification helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationHelperConfig {
    /// The NATS server address.
    pub nats_address: String,
    /// The token to authenticate against the NATS server.
    pub nats_token: Option<String>,
    /// The notifications JetStream stream.
    pub nats_stream: String,
    /// Upper bound on unacknowledged publishes.
    pub max_pending: usize,
}

impl Default for NotificationHelperConfig {
    fn default() -> Self {
        Self {
            nats_address: "nats://localhost:4222".to_string(),
            nats_token: None,
            nats_stream: DEFAULT_STREAM.to_string(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl NotificationHelperConfig {
    pub fn new(nats_address: impl Into<String>) -> Self {
        Self {
            nats_address: nats_address.into(),
            ..Default::default()
        }
    }

    /// Load from `NATS_URL` (required), `NATS_TOKEN`, `NATS_STREAM` and
    /// `NATS_MAX_PENDING`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let nats_address =
            env::var("NATS_URL").map_err(|_| ConfigError::MissingEnvVar("NATS_URL".to_string()))?;

        let max_pending = match env::var("NATS_MAX_PENDING") {
            Ok(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::ParseError {
                key: "NATS_MAX_PENDING".to_string(),
                details: e.to_string(),
            })?,
            Err(_) => DEFAULT_MAX_PENDING,
        };

        Ok(Self {
            nats_address,
            nats_token: env::var("NATS_TOKEN").ok().filter(|t| !t.is_empty()),
            nats_stream: env::var("NATS_STREAM").unwrap_or_else(|_| DEFAULT_STREAM.to_string()),
            max_pending,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.nats_token = Some(token.into());
        self
    }

    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.nats_stream = stream.into();
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Fill in empty fields with their defaults.
    pub(crate) fn apply_defaults(&mut self) {
        if self.nats_stream.is_empty() {
            self.nats_stream = DEFAULT_STREAM.to_string();
        }
        if self.max_pending == 0 {
            self.max_pending = DEFAULT_MAX_PENDING;
        }
    }
}
