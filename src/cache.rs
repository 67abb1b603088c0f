//! Per-user cache of pipeline results for the dashboard.
//!
//! The pipeline itself never caches; the HTTP layer owns one of these and
//! decides when to reuse a result. Entries expire after a TTL and are removed
//! on the next read or write, on refresh, or when the session switches to
//! another user. Once a session user is set, only that user is stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

struct CacheInner<V> {
    /// user id → last pipeline result
    entries: HashMap<i64, CacheEntry<V>>,
    /// User the session is currently looking at
    current_user: Option<i64>,
}

/// Thread-safe, TTL-bounded map from user id to a pipeline result.
#[derive(Clone)]
pub struct SessionCache<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
    ttl: Duration,
}

impl<V: Clone> SessionCache<V> {
    pub fn new(ttl: Duration) -> Self {
        SessionCache {
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::new(),
                current_user: None,
            })),
            ttl,
        }
    }

    /// Cached value for `user_id` if it is younger than the TTL. An expired
    /// entry is removed.
    pub async fn get(&self, user_id: i64) -> Option<V> {
        {
            let inner = self.inner.read().await;
            match inner.entries.get(&user_id) {
                Some(e) if e.is_fresh(self.ttl) => return Some(e.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut inner = self.inner.write().await;
        // Re-checked: another task may have refreshed it in between.
        if let Some(e) = inner.entries.get(&user_id) {
            if e.is_fresh(self.ttl) {
                return Some(e.value.clone());
            }
            inner.entries.remove(&user_id);
            debug!("SessionCache: expired entry for user {} removed", user_id);
        }
        None
    }

    /// Store `value` for `user_id` and sweep expired entries. Ignored when the
    /// session is pointed at another user, so a load that was running when the
    /// session switched cannot bring the previous user back.
    pub async fn insert(&self, user_id: i64, value: V) {
        let mut inner = self.inner.write().await;
        if inner.current_user.is_some_and(|u| u != user_id) {
            debug!(
                "SessionCache: not storing user {} (session is on {:?})",
                user_id, inner.current_user
            );
            return;
        }
        let ttl = self.ttl;
        inner.entries.retain(|_, e| e.is_fresh(ttl));
        inner.entries.insert(
            user_id,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Return the cached value or compute, store and return a fresh one.
    /// Errors from `load` are passed through and nothing is stored.
    pub async fn get_or_try_insert<E>(
        &self,
        user_id: i64,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.get(user_id).await {
            debug!("SessionCache hit for user {}", user_id);
            return Ok(v);
        }
        let value = load()?;
        self.insert(user_id, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate(&self, user_id: i64) {
        let mut inner = self.inner.write().await;
        if inner.entries.remove(&user_id).is_some() {
            debug!("SessionCache: invalidated user {}", user_id);
        }
    }

    pub async fn clear(&self) {
        self.inner.write().await.entries.clear();
    }

    /// Point the session at `user_id`, dropping the previous user's entry when
    /// the user changes. Returns the previous user.
    pub async fn switch_user(&self, user_id: i64) -> Option<i64> {
        let mut inner = self.inner.write().await;
        let previous = inner.current_user.replace(user_id);
        if let Some(prev) = previous.filter(|p| *p != user_id) {
            inner.entries.remove(&prev);
            debug!("SessionCache: switched user {} -> {}", prev, user_id);
        }
        previous
    }

    pub async fn current_user(&self) -> Option<i64> {
        self.inner.read().await.current_user
    }

    /// Number of users with a fresh entry.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.values().filter(|e| e.is_fresh(self.ttl)).count()
    }

    #[cfg(test)]
    async fn stored(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
