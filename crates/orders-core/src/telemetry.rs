//! Logging initialisation.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` and either a
//! human-readable or a JSON formatter. `RUST_LOG` always wins over the
//! configured level.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{OrdersError, OrdersResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = OrdersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(OrdersError::Configuration(format!(
                "unknown log format '{}'",
                other
            ))),
        }
    }
}

/// Builds the default filter directive for a base level.
#[must_use]
pub fn default_directive(level: &str) -> String {
    format!("{},orders=debug,tower_http=debug", level)
}

/// Initialize the global subscriber.
#[cfg(feature = "telemetry")]
pub fn init_logging(level: &str, format: LogFormat) -> OrdersResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
    };

    result.map_err(|e| OrdersError::Internal(format!("Failed to install subscriber: {}", e)))
}

/// Placeholder for when the telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_logging(_level: &str, _format: LogFormat) -> OrdersResult<()> {
    Ok(())
}
