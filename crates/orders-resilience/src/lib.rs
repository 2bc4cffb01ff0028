//! # Orders Resilience
//!
//! Retry and timeout policies shared by the cache warm-up, the HTTP layer
//! and the ingestion consumers.

pub mod retry;
pub mod timeout;

pub use retry::*;
pub use timeout::*;
