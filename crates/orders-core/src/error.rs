//! Unified error types for all layers of the orders service.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for the orders service.
///
/// The type is `Clone` because a single backing-store outcome is shared by
/// every caller waiting on the same in-flight fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrdersError {
    // ============ Domain Errors ============
    /// The key does not exist in the backing store.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stream message that can never be applied
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // ============ Infrastructure Errors ============
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Event stream transport error
    #[error("Event stream error: {0}")]
    Stream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Aborted Operations ============
    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the operation before it completed
    #[error("Operation cancelled")]
    Cancelled,

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrdersError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) | Self::InvalidMessage(_) => 400,
            Self::Stream(_) => 502,
            Self::Timeout(_) | Self::Cancelled => 503,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Stream(_) => "STREAM_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for an order key.
    #[must_use]
    pub fn order_not_found<T: ToString>(key: T) -> Self {
        Self::NotFound {
            resource_type: "order",
            id: key.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an invalid message error.
    #[must_use]
    pub fn invalid_message<T: Into<String>>(message: T) -> Self {
        Self::InvalidMessage(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for the "key is absent" outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this error is transient and worth retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Stream(_) | Self::Timeout(_)
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for OrdersError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "order",
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut => Self::Timeout(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for OrdersError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Stream(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OrdersError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMessage(format!("invalid json: {}", err))
    }
}

/// Serializable error response for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level errors for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-level validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
}

impl ErrorResponse {
    /// Creates a new error response from an `OrdersError`.
    #[must_use]
    pub fn from_error(error: &OrdersError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }

    /// Sets field-level validation errors.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&OrdersError> for ErrorResponse {
    fn from(error: &OrdersError) -> Self {
        Self::from_error(error)
    }
}
