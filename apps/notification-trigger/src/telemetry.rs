//! Log output for the command.
//!
//! `APP_ENV=production` switches to flattened JSON lines; anything else gets
//! the pretty console format. `RUST_LOG` overrides [`DEFAULT_DIRECTIVES`].

use std::env;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset: our own crates at `info`, the NATS
/// client only when it has something to complain about.
pub const DEFAULT_DIRECTIVES: &str = "warn,notification=info,notification_trigger=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(app_env) if app_env.eq_ignore_ascii_case("production") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the error report hook and the log subscriber.
///
/// Returns `false` when a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init(format: LogFormat) -> bool {
    let _ = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .install();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(false).pretty()), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_target(false).flatten_event(true)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(ErrorLayer::default())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_app_env() {
        temp_env::with_var_unset("APP_ENV", || {
            assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
        });
        temp_env::with_var("APP_ENV", Some("Production"), || {
            assert_eq!(LogFormat::from_env(), LogFormat::Json);
        });
        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
        });
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init(LogFormat::Pretty);
        assert!(!init(LogFormat::Json));
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }
}
