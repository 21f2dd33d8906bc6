//! Billing server command
//!
//! Starts the HTTP server that creates Stripe Checkout sessions for Pro
//! subscriptions.

use crate::billing;
use crate::config::Config;
use crate::error::Result;

/// Run the billing server
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `port` - Optional listen-port override from the command line
///
/// # Errors
///
/// Returns error if the Stripe secret is missing or the listen address
/// cannot be bound.
pub async fn run_serve(config: Config, port: Option<u16>) -> Result<()> {
    let mut billing_config = config.billing;
    if let Some(port) = port {
        billing_config.port = port;
    }

    billing::serve(billing_config).await
}
