//! Cealgull Verify - anonymous membership credentials and certificates

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cealgull_verify::{cache, config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("cealgull_verify={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(errors) = args.validate() {
        for e in &errors {
            error!("Configuration error: {}", e);
        }
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Cealgull Verify");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!(
        "Anonymity set: {} members, rotated every {} verifications",
        args.keyset.anonymity_set_size, args.keyset.capacity
    );
    info!("CA key: {}", args.cert.ca_private_key.display());
    info!("CA certificate: {}", args.cert.ca_certificate.display());
    info!("Address: version {}, {:?}", args.cert.address_version, args.cert.address_encoding);
    info!("Passcodes: @{} (TTL {}s)", args.passcode.account_domain, args.passcode.passcode_ttl_secs);
    info!("======================================");

    let state = match AppState::new(args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    cache::spawn_cleanup_task(Arc::clone(&state.cache));

    server::run(state).await?;
    Ok(())
}
