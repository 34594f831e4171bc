//! notification-trigger
//!
//! Publishes a single trigger for a registered notification and exits.
//!
//! ```text
//! notification-trigger [--nats-address <url>] [--sender <addr>] \
//!     [--template-data '{"file":"report.pdf"}'] <ref>
//!   ↓
//! NotificationHelper::start  (provisions stream + template bucket)
//!   ↓
//! <stream>.trigger           ({"ref", "sender", "template_data"})
//! ```
//!
//! A broker that cannot be reached is reported as a warning, not a failure:
//! the command exits successfully without publishing.

pub mod telemetry;

use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use notification::{NotificationHelper, NotificationHelperConfig, Trigger};
use serde_json::{Map, Value};
use std::collections::HashMap;
use telemetry::LogFormat;
use tracing::{info, warn};

/// Service name reported by the helper.
pub const SERVICE_NAME: &str = "reva";

/// Trigger a registered notification
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "notification-trigger")]
#[command(about = "Trigger a registered notification")]
pub struct Args {
    /// Ref of the notification to trigger
    pub reference: String,

    /// NATS server address
    #[arg(long, default_value = "nats://localhost:4222")]
    pub nats_address: String,

    /// NATS authentication token
    #[arg(long, env = "NATS_TOKEN")]
    pub nats_token: Option<String>,

    /// The sender address
    #[arg(long, default_value = "noreply@localhost")]
    pub sender: String,

    /// A JSON object with data to fill in the template
    #[arg(long, default_value = "{}")]
    pub template_data: String,
}

impl Args {
    /// Helper configuration for these arguments.
    pub fn helper_config(&self) -> NotificationHelperConfig {
        let config = NotificationHelperConfig::new(&self.nats_address);
        match &self.nats_token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }

    /// The trigger this invocation publishes.
    pub fn trigger(&self) -> Result<Trigger> {
        let data = parse_template_data(&self.template_data)?;
        Ok(Trigger::new(&self.reference, &self.sender).with_template_data(data))
    }
}

/// Parse `--template-data` into a JSON object.
pub fn parse_template_data(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).wrap_err("Invalid --template-data")? {
        Value::Object(data) => Ok(data),
        other => Err(eyre!(
            "Invalid --template-data: expected a JSON object, got {}",
            other
        )),
    }
}

/// Run the command.
///
/// # Errors
///
/// Returns an error if the template data is not a JSON object or the
/// connection cannot be drained after publishing.
pub async fn run(args: Args) -> Result<()> {
    telemetry::init(LogFormat::from_env());

    let trigger = args.trigger()?;

    println!("Sending trigger with ref {}", trigger.reference);

    let helper =
        match NotificationHelper::start(SERVICE_NAME, args.helper_config(), &HashMap::new()).await
        {
            Ok(helper) => helper,
            Err(e) => {
                warn!(error = ?e, address = %args.nats_address, "error initializing notification helper");
                eprintln!("error initializing notification helper: {e}");
                return Ok(());
            }
        };

    helper.trigger_notification(&trigger).await;
    helper.flush().await;

    let failed = helper.failure_count() > 0;
    helper
        .try_stop()
        .await
        .wrap_err("Failed to drain nats connection")?;

    if failed {
        warn!(reference = %trigger.reference, "Trigger was not published");
    } else {
        info!(reference = %trigger.reference, "Trigger published");
    }

    Ok(())
}
