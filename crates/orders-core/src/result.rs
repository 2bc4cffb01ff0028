//! Result type aliases for the orders service.

use crate::OrdersError;

/// A specialized `Result` type for orders operations.
pub type OrdersResult<T> = Result<T, OrdersError>;
