//! Bounded cache of per-token clients.

use super::{ClientError, ClientFactory};
use crate::constants::DEFAULT_CLIENT_CACHE_SIZE;
use crate::observability::metrics;
use crate::store::ResourceStore;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Least-recently-used cache of store clients keyed by bearer token
///
/// All access goes through one mutex. The lock is never held while a client
/// is being built, and evicted clients stay usable by requests that already
/// hold them.
pub struct CredentialCache {
    clients: Mutex<LruCache<String, Arc<dyn ResourceStore>>>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clients = self.lock();
        f.debug_struct("CredentialCache")
            .field("len", &clients.len())
            .field("capacity", &clients.cap())
            .finish()
    }
}

impl CredentialCache {
    /// Cache holding at most `capacity` clients; zero falls back to the default
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CLIENT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            clients: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<dyn ResourceStore>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached client for `token`, marking it as most recently used
    #[must_use]
    pub fn get(&self, token: &str) -> Option<Arc<dyn ResourceStore>> {
        let client = self.lock().get(token).cloned();
        if client.is_some() {
            metrics::increment_credential_cache_hits();
        } else {
            metrics::increment_credential_cache_misses();
        }
        client
    }

    /// Insert a client, evicting the least recently used one when full
    pub fn insert(&self, token: &str, client: Arc<dyn ResourceStore>) {
        let replaced = self.lock().push(token.to_owned(), client);
        if let Some((key, _)) = replaced {
            if key != token {
                debug!("Evicted least recently used client from credential cache");
                metrics::increment_credential_cache_evictions();
            }
        }
    }

    /// Cached client for `token`, building and caching one on a miss
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the factory fails; nothing is cached then.
    pub async fn get_or_create(
        &self,
        token: &str,
        factory: &dyn ClientFactory,
    ) -> Result<Arc<dyn ResourceStore>, ClientError> {
        if let Some(client) = self.get(token) {
            return Ok(client);
        }
        let client = factory.create_client(Some(token)).await?;
        self.insert(token, Arc::clone(&client));
        Ok(client)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFactory {
        built: AtomicUsize,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn create_client(
            &self,
            _token: Option<&str>,
        ) -> Result<Arc<dyn ResourceStore>, ClientError> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryStore::default()))
        }
    }

    #[tokio::test]
    async fn test_hit_reuses_client() {
        let cache = CredentialCache::new(2);
        let factory = CountingFactory::default();
        let first = cache.get_or_create("a", &factory).await.unwrap();
        let second = cache.get_or_create("a", &factory).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache = CredentialCache::new(2);
        let factory = CountingFactory::default();
        cache.get_or_create("a", &factory).await.unwrap();
        cache.get_or_create("b", &factory).await.unwrap();
        // touch "a" so "b" becomes the eviction candidate
        cache.get_or_create("a", &factory).await.unwrap();
        cache.get_or_create("c", &factory).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));

        cache.get_or_create("b", &factory).await.unwrap();
        assert_eq!(factory.built.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_evicted_client_stays_usable() {
        let cache = CredentialCache::new(1);
        let factory = CountingFactory::default();
        let held = cache.get_or_create("a", &factory).await.unwrap();
        cache.get_or_create("b", &factory).await.unwrap();
        assert!(!cache.contains("a"));
        assert!(held.list_tenants().await.unwrap().is_empty());
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache = CredentialCache::new(0);
        assert_eq!(
            cache.lock().cap().get(),
            DEFAULT_CLIENT_CACHE_SIZE
        );
    }
}
