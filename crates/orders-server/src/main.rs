//! # Orders Server
//!
//! Main entry point for the orders service: serves cached order documents
//! over HTTP while stream consumers keep the cache and the database current.

use orders_config::{AppConfig, ConfigLoader};
use orders_core::{telemetry::init_logging, OrdersResult};
use orders_server::{app::AppBuilder, startup::print_banner};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    print_banner();
    info!("Starting orders service...");
    info!("Version: {}", config.app.version);
    info!("Environment: {}", config.app.environment);

    if let Err(e) = AppBuilder::new().with_config(config).run().await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

fn load_config() -> OrdersResult<AppConfig> {
    Ok(ConfigLoader::from_default_location()?.into_config())
}
