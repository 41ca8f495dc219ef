//! Memoising wrapper for classifier calls.
//!
//! The classifier is the throughput bottleneck of a scan (hundreds of
//! milliseconds per call), while batches often repeat the same text. Results
//! are keyed by the SHA-256 of the exact text sent. Failures are never cached.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::classifier::{LabelScores, ToxicityClassifier};
use crate::error::Result;

/// Cache key for a classified text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    /// Generate a cache key from raw content.
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash = hasher.finalize();
        CacheKey(format!("{:x}", hash))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0[..16])
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A memoised classification.
#[derive(Debug, Clone)]
struct CacheEntry {
    scores: LabelScores,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Entries plus their insertion order, oldest first.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, entry: CacheEntry, capacity: usize) -> u64 {
        if self.entries.insert(key.clone(), entry).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key);

        let mut evicted = 0;
        while self.entries.len() > capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    fn remove(&mut self, key: &CacheKey) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Classifier wrapper that memoises successful results.
///
/// Entries expire after a TTL; past the capacity the oldest insertion is
/// evicted first.
pub struct CachedClassifier<C: ToxicityClassifier> {
    inner: C,
    state: Arc<RwLock<CacheState>>,
    stats: Arc<RwLock<CacheStats>>,
    capacity: usize,
    ttl: Duration,
}

impl<C: ToxicityClassifier> CachedClassifier<C> {
    /// Default maximum number of memoised texts.
    pub const DEFAULT_CAPACITY: usize = 1024;
    /// Default lifetime of a memoised result.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    pub fn new(inner: C) -> Self {
        Self {
            inner,
            state: Arc::new(RwLock::new(CacheState::default())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            capacity: Self::DEFAULT_CAPACITY,
            ttl: Self::DEFAULT_TTL,
        }
    }

    /// Set the maximum number of entries (at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set how long a result stays valid.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Drop expired entries.
    pub async fn evict_expired(&self) {
        let mut state = self.state.write().await;
        let ttl = self.ttl;
        let before = state.entries.len();
        state.entries.retain(|_, e| !e.is_expired(ttl));
        let CacheState { entries, order } = &mut *state;
        order.retain(|k| entries.contains_key(k));

        let mut stats = self.stats.write().await;
        stats.evictions += (before - entries.len()) as u64;
        stats.entry_count = entries.len() as u64;
    }

    /// Drop all memoised results.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.order.clear();
        *self.stats.write().await = CacheStats::default();
    }
}

#[async_trait]
impl<C: ToxicityClassifier> ToxicityClassifier for CachedClassifier<C> {
    async fn classify(&self, text: &str) -> Result<LabelScores> {
        let key = CacheKey::from_content(text);

        let cached = self.state.read().await.entries.get(&key).cloned();
        match cached {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.stats.write().await.hits += 1;
                debug!(key = %key, "classifier cache hit");
                return Ok(entry.scores);
            }
            Some(_) => {
                let mut state = self.state.write().await;
                state.remove(&key);
                let mut stats = self.stats.write().await;
                stats.evictions += 1;
                stats.entry_count = state.entries.len() as u64;
            }
            None => {}
        }
        self.stats.write().await.misses += 1;

        let scores = self.inner.classify(text).await?;

        let entry = CacheEntry {
            scores: scores.clone(),
            created_at: Instant::now(),
        };
        let mut state = self.state.write().await;
        let evicted = state.insert(key, entry, self.capacity);
        let mut stats = self.stats.write().await;
        stats.evictions += evicted;
        stats.entry_count = state.entries.len() as u64;
        Ok(scores)
    }

    fn max_input_chars(&self) -> usize {
        self.inner.max_input_chars()
    }

    fn provider(&self) -> &str {
        self.inner.provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToxicityClassifier for CountingClassifier {
        async fn classify(&self, text: &str) -> Result<LabelScores> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("fail") {
                return Err(Error::classifier("counting", "refused"));
            }
            Ok([("toxic".to_string(), 0.5)].into_iter().collect())
        }

        fn provider(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = CacheKey::from_content("same text");
        let b = CacheKey::from_content("same text");
        let c = CacheKey::from_content("other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.to_string().len(), 16);
    }

    #[tokio::test]
    async fn test_hits_skip_inner_classifier() {
        let cached = CachedClassifier::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });

        cached.classify("hello").await.unwrap();
        cached.classify("hello").await.unwrap();
        cached.classify("world").await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        let stats = cached.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 2);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let cached = CachedClassifier::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        })
        .with_capacity(3);

        for i in 0..10 {
            cached.classify(&format!("text {i}")).await.unwrap();
        }
        let stats = cached.stats().await;
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.evictions, 7);

        // The three newest survive
        cached.classify("text 9").await.unwrap();
        cached.classify("text 7").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 10);

        cached.classify("text 0").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 11);
        assert!(cached.stats().await.entry_count <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cached = CachedClassifier::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        })
        .with_ttl(Duration::from_secs(60));

        cached.classify("hello").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cached.classify("hello").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cached.classify("hello").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);

        cached.classify("world").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cached.evict_expired().await;
        let stats = cached.stats().await;
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 3);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cached = CachedClassifier::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });

        assert!(cached.classify("fail").await.is_err());
        assert!(cached.classify("fail").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.stats().await.entry_count, 0);

        cached.clear().await;
        assert_eq!(cached.stats().await, CacheStats::default());
    }
}
