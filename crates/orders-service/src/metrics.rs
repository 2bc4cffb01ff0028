//! Prometheus metrics for the order cache.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names for the order cache.
pub mod names {
    /// Lookups served from a live positive entry.
    pub const CACHE_HITS_TOTAL: &str = "orders_cache_hits_total";
    /// Lookups served from a live negative entry.
    pub const CACHE_NEGATIVE_HITS_TOTAL: &str = "orders_cache_negative_hits_total";
    /// Lookups that found no live entry.
    pub const CACHE_MISSES_TOTAL: &str = "orders_cache_misses_total";
    /// Backing store fetches started by the single-flight group.
    pub const CACHE_STORE_FETCHES_TOTAL: &str = "orders_cache_store_fetches_total";
    /// Backing store fetches that failed with something other than not-found.
    pub const CACHE_FETCH_ERRORS_TOTAL: &str = "orders_cache_fetch_errors_total";
    /// Entries removed by the sweep.
    pub const CACHE_EVICTIONS_TOTAL: &str = "orders_cache_evictions_total";
    /// Current number of entries in the table, live or not.
    pub const CACHE_ENTRIES: &str = "orders_cache_entries";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Lookups served from a live cached payload");
    describe_counter!(
        names::CACHE_NEGATIVE_HITS_TOTAL,
        "Lookups answered not-found from the negative cache"
    );
    describe_counter!(names::CACHE_MISSES_TOTAL, "Lookups that found no live entry");
    describe_counter!(
        names::CACHE_STORE_FETCHES_TOTAL,
        "Backing store fetches issued on cache misses"
    );
    describe_counter!(
        names::CACHE_FETCH_ERRORS_TOTAL,
        "Backing store fetches that failed"
    );
    describe_counter!(
        names::CACHE_EVICTIONS_TOTAL,
        "Expired entries removed by the background sweep"
    );
    describe_gauge!(names::CACHE_ENTRIES, "Current number of cache entries");
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a positive hit.
    pub fn hit() {
        counter!(names::CACHE_HITS_TOTAL).increment(1);
    }

    /// Record a negative hit.
    pub fn negative_hit() {
        counter!(names::CACHE_NEGATIVE_HITS_TOTAL).increment(1);
    }

    /// Record a miss.
    pub fn miss() {
        counter!(names::CACHE_MISSES_TOTAL).increment(1);
    }

    /// Record a store fetch.
    pub fn store_fetch() {
        counter!(names::CACHE_STORE_FETCHES_TOTAL).increment(1);
    }

    /// Record a failed store fetch.
    pub fn fetch_error(error_code: &'static str) {
        counter!(names::CACHE_FETCH_ERRORS_TOTAL, "error" => error_code).increment(1);
    }

    /// Record sweep evictions.
    pub fn evicted(count: usize) {
        counter!(names::CACHE_EVICTIONS_TOTAL).increment(count as u64);
    }

    /// Update the entry gauge.
    pub fn set_entries(count: usize) {
        gauge!(names::CACHE_ENTRIES).set(count as f64);
    }
}
