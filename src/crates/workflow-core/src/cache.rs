//! Generic in-memory cache with LRU/TTL eviction (SPEC_FULL §10's recovery
//! of the teacher's node-result cache as an optional `(executor_id, payload
//! hash)`-keyed tool-result cache, off by default).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    last_accessed: Instant,
    access_count: usize,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map(|expiry| Instant::now() > expiry).unwrap_or(false)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    Fifo,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: usize,
    pub default_ttl: Option<Duration>,
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 256,
            default_ttl: Some(Duration::from_secs(300)),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CacheMetrics {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub entries: usize,
}

impl CacheMetrics {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// A generic, off-by-default memoization cache. Nothing in `workflow-core`
/// consults one unless a caller explicitly builds and wires it in —
/// see `AgentExecutor::with_tool_cache`.
pub struct Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    storage: RwLock<HashMap<K, CacheEntry<V>>>,
    config: CacheConfig,
    metrics: RwLock<CacheMetrics>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            storage: RwLock::new(HashMap::new()),
            config,
            metrics: RwLock::new(CacheMetrics::default()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut storage = self.storage.write().await;
        match storage.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                storage.remove(key);
                let mut metrics = self.metrics.write().await;
                metrics.misses += 1;
                metrics.entries = storage.len();
                None
            }
            Some(entry) => {
                entry.touch();
                self.metrics.write().await.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.metrics.write().await.misses += 1;
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut storage = self.storage.write().await;
        if storage.len() >= self.config.max_size && !storage.contains_key(&key) {
            self.evict(&mut storage).await;
        }
        storage.insert(key, CacheEntry::new(value, self.config.default_ttl));
        self.metrics.write().await.entries = storage.len();
    }

    pub async fn metrics(&self) -> CacheMetrics {
        self.metrics.read().await.clone()
    }

    async fn evict(&self, storage: &mut HashMap<K, CacheEntry<V>>) {
        if storage.is_empty() {
            return;
        }
        let victim = match self.config.eviction_policy {
            EvictionPolicy::Lru => storage.iter().min_by_key(|(_, e)| e.last_accessed).map(|(k, _)| k.clone()),
            EvictionPolicy::Lfu => storage.iter().min_by_key(|(_, e)| e.access_count).map(|(k, _)| k.clone()),
            EvictionPolicy::Fifo => storage.iter().min_by_key(|(_, e)| e.created_at).map(|(k, _)| k.clone()),
        };
        if let Some(key) = victim {
            storage.remove(&key);
            self.metrics.write().await.evictions += 1;
        }
    }
}

/// Hashes a JSON value deterministically enough for cache-key purposes (key
/// ordering in `serde_json::Value::Object` is insertion order, not sorted,
/// so two semantically-equal objects built in different orders may hash
/// differently — acceptable for a best-effort memoization cache).
pub fn hash_payload(value: &serde_json::Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}

/// Keyed by `(tool name, hash of its JSON arguments)` (spec's "node-level
/// cache" recovered at tool-invocation granularity since `Executor::handle`
/// has no return value to memoize against).
pub type ToolResultCache = Cache<(String, u64), serde_json::Value>;

pub fn create_tool_result_cache(max_size: usize, ttl: Duration) -> Arc<ToolResultCache> {
    Arc::new(Cache::new(CacheConfig {
        max_size,
        default_ttl: Some(ttl),
        eviction_policy: EvictionPolicy::Lru,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_hits() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::default());
        cache.put("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some("v".to_string()));
        assert_eq!(cache.metrics().await.hits, 1);
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::default());
        assert_eq!(cache.get(&"missing".to_string()).await, None);
        assert_eq!(cache.metrics().await.misses, 1);
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache: Cache<String, String> = Cache::new(CacheConfig {
            max_size: 10,
            default_ttl: Some(Duration::from_millis(20)),
            eviction_policy: EvictionPolicy::Lru,
        });
        cache.put("k".to_string(), "v".to_string()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }

    #[tokio::test]
    async fn fifo_evicts_oldest_when_full() {
        let cache: Cache<String, String> = Cache::new(CacheConfig {
            max_size: 2,
            default_ttl: None,
            eviction_policy: EvictionPolicy::Fifo,
        });
        cache.put("a".to_string(), "1".to_string()).await;
        cache.put("b".to_string(), "2".to_string()).await;
        cache.put("c".to_string(), "3".to_string()).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
        assert_eq!(cache.get(&"c".to_string()).await, Some("3".to_string()));
    }

    #[test]
    fn hash_payload_is_stable_for_identical_values() {
        let a = serde_json::json!({"x": 1, "y": 2});
        let b = serde_json::json!({"x": 1, "y": 2});
        assert_eq!(hash_payload(&a), hash_payload(&b));
    }
}
