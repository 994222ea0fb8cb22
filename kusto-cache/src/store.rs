//! The in-process fingerprint cache. Unlike
//! `caliber-storage::cache::lmdb_backend::LmdbCacheBackend`'s durable,
//! cross-process store, this is the executor facade's own query-result
//! cache — it does not need to survive a restart, so there is no LMDB/heed
//! dependency here (see `DESIGN.md`). `CacheStats` and its `hit_rate()`
//! helper are carried over unchanged from
//! `caliber-storage::cache::traits::CacheStats`.

use crate::fingerprint::QueryFingerprint;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use kusto_core::{CacheConfig, CacheError, EvictionPolicy};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    bytes: Vec<u8>,
    compressed: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    ttl: ChronoDuration,
    access_count: u64,
    last_access: DateTime<Utc>,
    size_bytes: u64,
}

struct Inner {
    entries: HashMap<[u8; 32], Entry>,
    stats: CacheStats,
}

/// Result-cache store keyed by [`QueryFingerprint`]. `now` is supplied by
/// the caller at every operation (rather than read from the wall clock
/// internally) so tests can drive eviction and expiry deterministically.
pub struct ResultCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: QueryFingerprint, now: DateTime<Utc>) -> Option<T> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let k = key.encode();

        let expired = matches!(inner.entries.get(&k), Some(e) if now >= e.expires_at);
        if expired {
            remove_entry(&mut inner, &k);
        }

        let Some(entry) = inner.entries.get_mut(&k) else {
            inner.stats.misses += 1;
            return None;
        };

        let bytes = decompress(entry);
        let value = serde_json::from_slice(&bytes).ok();
        if value.is_none() {
            inner.stats.misses += 1;
            return None;
        }

        entry.access_count += 1;
        entry.last_access = now;
        if self.config.cache_eviction_policy == EvictionPolicy::Lru {
            entry.expires_at = now + entry.ttl;
        }
        inner.stats.hits += 1;
        value
    }

    pub fn put<T: Serialize>(
        &self,
        key: QueryFingerprint,
        value: &T,
        ttl: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let raw =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let (bytes, compressed) = if raw.len() as u64 > self.config.cache_compression_threshold_bytes
        {
            (compress(&raw)?, true)
        } else {
            (raw, false)
        };
        let size_bytes = bytes.len() as u64;

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let k = key.encode();

        if let Some(existing) = inner.entries.remove(&k) {
            inner.stats.entry_count -= 1;
            inner.stats.memory_bytes -= existing.size_bytes;
        }

        make_room(&mut inner, &self.config, size_bytes)?;

        inner.entries.insert(
            k,
            Entry {
                bytes,
                compressed,
                created_at: now,
                expires_at: now + ttl,
                ttl,
                access_count: 0,
                last_access: now,
                size_bytes,
            },
        );
        inner.stats.entry_count += 1;
        inner.stats.memory_bytes += size_bytes;
        Ok(())
    }

    pub fn invalidate(&self, key: QueryFingerprint) -> bool {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        remove_entry(&mut inner, &key.encode())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.clear();
        inner.stats.entry_count = 0;
        inner.stats.memory_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("cache lock poisoned").stats.clone()
    }
}

fn remove_entry(inner: &mut Inner, key: &[u8; 32]) -> bool {
    if let Some(entry) = inner.entries.remove(key) {
        inner.stats.entry_count -= 1;
        inner.stats.memory_bytes -= entry.size_bytes;
        true
    } else {
        false
    }
}

/// Evicts victims chosen by policy until `incoming_size` fits under the
/// byte ceiling, or fails with [`CacheError::CapacityExceeded`] if it never
/// would, even with the cache empty.
fn make_room(inner: &mut Inner, config: &CacheConfig, incoming_size: u64) -> Result<(), CacheError> {
    if incoming_size > config.cache_max_bytes {
        return Err(CacheError::CapacityExceeded);
    }

    while inner.stats.memory_bytes + incoming_size > config.cache_max_bytes {
        let Some(victim) = choose_victim(inner, config.cache_eviction_policy) else {
            return Err(CacheError::CapacityExceeded);
        };
        remove_entry(inner, &victim);
        inner.stats.evictions += 1;
    }
    Ok(())
}

fn choose_victim(inner: &Inner, policy: EvictionPolicy) -> Option<[u8; 32]> {
    match policy {
        EvictionPolicy::Lru => inner
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| *k),
        EvictionPolicy::Lfu => inner
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.access_count, e.last_access))
            .map(|(k, _)| *k),
        EvictionPolicy::Ttl => inner
            .entries
            .iter()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(k, _)| *k),
    }
}

fn compress(raw: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Compression(e.to_string()))
}

fn decompress(entry: &Entry) -> Vec<u8> {
    if !entry.compressed {
        return entry.bytes.clone();
    }
    let mut decoder = GzDecoder::new(entry.bytes.as_slice());
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .expect("cache entry was compressed by this process and must decompress cleanly");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kusto_core::EvictionPolicy;

    fn config(max_bytes: u64, policy: EvictionPolicy) -> CacheConfig {
        CacheConfig {
            cache_default_ttl: std::time::Duration::from_secs(60),
            cache_compression_threshold_bytes: 10_240,
            cache_eviction_policy: policy,
            cache_max_bytes: max_bytes,
        }
    }

    fn fp(q: &str) -> QueryFingerprint {
        QueryFingerprint::new(q, "tenant", None, &[])
    }

    #[test]
    fn put_then_get_returns_value() {
        let cache = ResultCache::new(config(1_000_000, EvictionPolicy::Lru));
        let now = Utc::now();
        cache.put(fp("T | where a > 1"), &42u32, ChronoDuration::seconds(60), now).unwrap();
        let got: Option<u32> = cache.get(fp("T | where a > 1"), now);
        assert_eq!(got, Some(42));
    }

    #[test]
    fn clear_empties_every_key() {
        let cache = ResultCache::new(config(1_000_000, EvictionPolicy::Lru));
        let now = Utc::now();
        cache.put(fp("T"), &1u32, ChronoDuration::seconds(60), now).unwrap();
        cache.clear();
        let got: Option<u32> = cache.get(fp("T"), now);
        assert_eq!(got, None);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ResultCache::new(config(1_000_000, EvictionPolicy::Ttl));
        let now = Utc::now();
        cache.put(fp("T"), &1u32, ChronoDuration::seconds(5), now).unwrap();
        let later = now + ChronoDuration::seconds(10);
        let got: Option<u32> = cache.get(fp("T"), later);
        assert_eq!(got, None);
    }

    #[test]
    fn lru_evicts_least_recently_accessed() {
        let cache = ResultCache::new(config(40, EvictionPolicy::Lru));
        let now = Utc::now();
        cache.put(fp("A"), &"aaaaaaaaaa".to_string(), ChronoDuration::seconds(60), now).unwrap();
        cache.put(fp("B"), &"bbbbbbbbbb".to_string(), ChronoDuration::seconds(60), now).unwrap();
        let _: Option<String> = cache.get(fp("A"), now + ChronoDuration::seconds(1));
        cache
            .put(fp("C"), &"cccccccccc".to_string(), ChronoDuration::seconds(60), now + ChronoDuration::seconds(2))
            .unwrap();
        let a: Option<String> = cache.get(fp("A"), now + ChronoDuration::seconds(3));
        let b: Option<String> = cache.get(fp("B"), now + ChronoDuration::seconds(3));
        assert!(a.is_some());
        assert!(b.is_none());
    }

    #[test]
    fn capacity_exceeded_when_entry_never_fits() {
        let cache = ResultCache::new(config(4, EvictionPolicy::Lru));
        let now = Utc::now();
        let err = cache
            .put(fp("T"), &"way too large to ever fit".to_string(), ChronoDuration::seconds(60), now)
            .unwrap_err();
        assert!(matches!(err, CacheError::CapacityExceeded));
    }

    #[test]
    fn hit_rate_tracks_hits_and_misses() {
        let cache = ResultCache::new(config(1_000_000, EvictionPolicy::Lru));
        let now = Utc::now();
        cache.put(fp("T"), &1u32, ChronoDuration::seconds(60), now).unwrap();
        let _: Option<u32> = cache.get(fp("T"), now);
        let _: Option<u32> = cache.get(fp("missing"), now);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }
}
