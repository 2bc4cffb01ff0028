//! In-memory caching for the order read path.
//!
//! [`CachedOrders`] sits between the HTTP layer and the backing store:
//! read-through with single-flight on misses, write-through on updates,
//! negative caching of not-found keys, per-entry TTL and a periodic sweep.

mod cache_interface;
mod cached_orders;
mod entry;
mod single_flight;
mod sweeper;

pub use cache_interface::OrderCache;
pub use cached_orders::{CacheStats, CachedOrders};
pub use entry::CacheConfig;
