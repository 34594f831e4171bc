//! notification-trigger
//!
//! Binary entry point. See the library crate for the command itself.

use clap::Parser;
use notification_trigger::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = notification_trigger::run(args).await {
        eprintln!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}
