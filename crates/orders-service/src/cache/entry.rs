//! Cache entries and engine configuration.

use bytes::Bytes;
use orders_config::CacheSettings;
use std::time::Duration;
use tokio::time::Instant;

/// Tuning for [`CachedOrders`](super::CachedOrders).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of an entry holding a payload.
    pub ttl: Duration,
    /// Lifetime of a "not found" entry. Zero disables negative caching.
    pub negative_ttl: Duration,
    /// Period of the expired-entry sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            negative_ttl: Duration::from_secs(3),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: settings.ttl(),
            negative_ttl: settings.negative_ttl(),
            sweep_interval: settings.sweep_interval(),
        }
    }
}

/// One slot of the cache table.
///
/// An entry with `payload == None` is a negative entry: the backing store
/// reported the key as absent.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub(crate) payload: Option<Bytes>,
    pub(crate) expires_at: Instant,
    pub(crate) stored_at: Instant,
}

impl CacheEntry {
    pub(crate) fn positive(payload: Bytes, ttl: Duration, now: Instant) -> Self {
        Self {
            payload: Some(payload),
            expires_at: now + ttl,
            stored_at: now,
        }
    }

    pub(crate) fn negative(ttl: Duration, now: Instant) -> Self {
        Self {
            payload: None,
            expires_at: now + ttl,
            stored_at: now,
        }
    }

    #[inline]
    pub(crate) const fn is_negative(&self) -> bool {
        self.payload.is_none()
    }

    /// Live means strictly before the expiry instant.
    #[inline]
    pub(crate) fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_deadline() {
        let now = Instant::now();
        let entry = CacheEntry::positive(Bytes::from_static(b"{}"), Duration::from_secs(10), now);

        assert!(!entry.is_negative());
        assert!(entry.is_live(now + Duration::from_secs(9)));
        assert!(!entry.is_live(now + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_entry_has_no_payload() {
        let now = Instant::now();
        let entry = CacheEntry::negative(Duration::from_secs(3), now);
        assert!(entry.is_negative());
        assert!(entry.payload.is_none());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = CacheSettings {
            ttl_secs: 60,
            negative_ttl_secs: 0,
            ..CacheSettings::default()
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.negative_ttl, Duration::ZERO);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }
}
