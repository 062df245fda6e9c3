use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Which upstream tool a cached response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    MonthlyIrradiance,
    PvProduction,
    HourlySeries,
}

impl QueryKind {
    fn tag(self) -> &'static str {
        match self {
            QueryKind::MonthlyIrradiance => "MRcalc",
            QueryKind::PvProduction => "PVcalc",
            QueryKind::HourlySeries => "seriescalc",
        }
    }
}

/// Normalized cache key. Numbers are rendered with fixed precision so that
/// `45`, `45.0` and `45.000000001` collapse to the same key, and `-0` to `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: QueryKind) -> Self {
        Self(kind.tag().to_string())
    }

    pub fn num(mut self, name: &str, value: f64) -> Self {
        let rounded = (value * 1e6).round() / 1e6;
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        let _ = write!(self.0, "|{name}={rounded:.6}");
        self
    }

    pub fn opt_num(self, name: &str, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.num(name, v),
            None => self.text(name, "none"),
        }
    }

    pub fn int(mut self, name: &str, value: i64) -> Self {
        let _ = write!(self.0, "|{name}={value}");
        self
    }

    pub fn flag(self, name: &str, value: bool) -> Self {
        self.int(name, value as i64)
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        let _ = write!(self.0, "|{name}={value}");
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// In-memory response cache with a fixed time-to-live.
///
/// Cloning shares the underlying map. Two requests racing on the same key
/// may both miss and both insert; the later insert wins.
#[derive(Debug, Clone)]
pub struct ResultCache<V> {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        let map = self.entries.read().ok()?;
        map.get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        self.insert_at(key, value, Utc::now());
    }

    pub fn insert_at(&self, key: CacheKey, value: V, now: DateTime<Utc>) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        if let Ok(mut map) = self.entries.write() {
            let before = map.len();
            map.retain(|_, entry| now < entry.expires_at);
            before - map.len()
        } else {
            0
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_key_ignores_float_formatting() {
        let a = CacheKey::new(QueryKind::HourlySeries).num("lat", 45.0).num("lon", -0.0);
        let b = CacheKey::new(QueryKind::HourlySeries)
            .num("lat", 45.000_000_000_1)
            .num("lon", 0.0);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "seriescalc|lat=45.000000|lon=0.000000");
    }

    #[test]
    fn test_key_distinguishes_kind_and_optional_values() {
        let a = CacheKey::new(QueryKind::PvProduction).opt_num("angle", None);
        let b = CacheKey::new(QueryKind::PvProduction).opt_num("angle", Some(0.0));
        let c = CacheKey::new(QueryKind::MonthlyIrradiance).opt_num("angle", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hit_within_ttl_and_miss_after() {
        let cache = ResultCache::new(Duration::hours(24));
        let key = CacheKey::new(QueryKind::MonthlyIrradiance).num("lat", 1.0);
        cache.insert_at(key.clone(), 42u32, t0());

        assert_eq!(cache.get_at(&key, t0() + Duration::hours(23)), Some(42));
        assert_eq!(cache.get_at(&key, t0() + Duration::hours(24)), None);
    }

    #[test]
    fn test_reinsert_refreshes_expiry() {
        let cache = ResultCache::new(Duration::hours(1));
        let key = CacheKey::new(QueryKind::PvProduction);
        cache.insert_at(key.clone(), "old", t0());
        cache.insert_at(key.clone(), "new", t0() + Duration::minutes(50));
        assert_eq!(cache.get_at(&key, t0() + Duration::minutes(90)), Some("new"));
    }

    #[test]
    fn test_purge_expired() {
        let cache = ResultCache::new(Duration::hours(1));
        cache.insert_at(CacheKey::new(QueryKind::PvProduction), 1, t0());
        cache.insert_at(
            CacheKey::new(QueryKind::HourlySeries),
            2,
            t0() + Duration::minutes(30),
        );
        assert_eq!(cache.purge_expired(t0() + Duration::minutes(61)), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ResultCache::new(Duration::hours(1));
        let other = cache.clone();
        other.insert(CacheKey::new(QueryKind::HourlySeries), 7);
        assert_eq!(cache.get(&CacheKey::new(QueryKind::HourlySeries)), Some(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers() {
        let cache: ResultCache<u64> = ResultCache::new(Duration::hours(1));
        let key = |i: u64| CacheKey::new(QueryKind::HourlySeries).int("slot", (i % 16) as i64);

        let mut tasks = Vec::new();
        for worker in 0..8u64 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..500u64 {
                    // Every writer stores the slot number, so any value read back must match it.
                    cache.insert(key(i + worker), (i + worker) % 16);
                    if let Some(v) = cache.get(&key(i)) {
                        assert_eq!(v, i % 16);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len(), 16);
        for slot in 0..16u64 {
            assert_eq!(cache.get(&key(slot)), Some(slot));
        }
    }
}
