//! # Orders Service
//!
//! The order cache engine: an in-memory, read-through and write-through
//! cache over the durable order store, plus the startup warm-up that seeds
//! it and the metrics it reports.

pub mod cache;
pub mod metrics;
pub mod warmup;

pub use cache::*;
pub use warmup::warm_up;
