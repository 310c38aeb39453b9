//! Navigation backend.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum router, request id, limits)
//!                        │
//!                        ▼
//!                  navigation::Navigator
//!                  ┌──────────────────────────────────────────────┐
//!                  │ RateGate → validate → resolve_address        │
//!                  │               │ hit            │ miss        │
//!                  │               ▼                ▼             │
//!                  │         AddressStore      Geocoder → save    │
//!                  │               └──────┬─────────┘             │
//!                  │                      ▼                       │
//!                  │              RouteProvider → live metrics    │
//!                  └──────────────────────────────────────────────┘
//!                        │
//!     Client Response ◀──┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use nav_backend::config::load_config;
use nav_backend::lifecycle::startup;
use nav_backend::observability::logging;

#[derive(Parser)]
#[command(name = "nav-backend")]
#[command(about = "Address resolution, routing and live ETA service", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        database = %config.database.path,
        geocoder = %config.geocoder.base_url,
        router = %config.router.base_url,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
