//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use orders_core::OrdersError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration loader with layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables with `ORDERS__` prefix (`ORDERS__CACHE__TTL_SECS=60`)
    pub fn new(config_dir: impl Into<String>) -> Result<Self, OrdersError> {
        let config = Self::load_config(&config_dir.into())?;
        Ok(Self { config })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, OrdersError> {
        Self::new("./config")
    }

    /// Consumes the loader, returning the loaded configuration.
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    fn load_config(config_dir: &str) -> Result<AppConfig, OrdersError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("ORDERS_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ORDERS")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("stream.streams")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_orders_error)?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_orders_error)?;

        if app_config.app.environment != environment {
            app_config.app.environment = environment;
        }

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    pub fn validate_config(config: &AppConfig) -> Result<(), OrdersError> {
        if config.database.url.is_empty() {
            return Err(OrdersError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if config.cache.ttl_secs == 0 {
            return Err(OrdersError::Configuration(
                "cache.ttl_secs must be greater than zero".to_string(),
            ));
        }

        if config.cache.sweep_interval_secs == 0 {
            return Err(OrdersError::Configuration(
                "cache.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        if config.stream.enabled {
            if config.stream.streams.is_empty() {
                return Err(OrdersError::Configuration(
                    "At least one stream key is required when ingestion is enabled".to_string(),
                ));
            }
            if config.stream.streams.iter().any(|s| s.trim().is_empty()) {
                return Err(OrdersError::Configuration(
                    "Stream keys must not be blank".to_string(),
                ));
            }
            if config.stream.group.is_empty() || config.stream.consumer.is_empty() {
                return Err(OrdersError::Configuration(
                    "Stream group and consumer names are required".to_string(),
                ));
            }
        }

        if config.cache.negative_ttl_secs >= config.cache.ttl_secs {
            warn!(
                negative_ttl_secs = config.cache.negative_ttl_secs,
                ttl_secs = config.cache.ttl_secs,
                "Negative TTL is not shorter than the positive TTL"
            );
        }

        Ok(())
    }
}

fn config_error_to_orders_error(err: ConfigError) -> OrdersError {
    OrdersError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigLoader::validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_database_url() {
        let mut config = AppConfig::default();
        config.database.url = String::new();
        let err = ConfigLoader::validate_config(&config).unwrap_err();
        assert!(matches!(err, OrdersError::Configuration(_)));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_enabled_stream_without_keys() {
        let mut config = AppConfig::default();
        config.stream.streams = vec![];
        assert!(ConfigLoader::validate_config(&config).is_err());

        config.stream.enabled = false;
        assert!(ConfigLoader::validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_blank_stream_key_among_valid_ones() {
        let mut config = AppConfig::default();
        config.stream.streams = vec!["orders".to_string(), "  ".to_string()];
        let err = ConfigLoader::validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("must not be blank"));

        config.stream.streams = vec!["orders".to_string(), "orders-eu".to_string()];
        assert!(ConfigLoader::validate_config(&config).is_ok());
    }

    #[test]
    fn test_loads_file_layers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[cache]\nttl_secs = 120\n\n[server]\nport = 9000\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.toml"), "[cache]\nttl_secs = 30\n").unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy().to_string()).unwrap();
        let config = loader.into_config();
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.cache.negative_ttl_secs, 3);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[cache]\nttl_secs = 0\n").unwrap();

        let result = ConfigLoader::new(dir.path().to_string_lossy().to_string());
        assert!(matches!(result, Err(OrdersError::Configuration(_))));
    }
}
