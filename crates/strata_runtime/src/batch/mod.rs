//! Batch loading for N+1 prevention.
//!
//! A [`BatchLoader`] collects keys while the fields of one level are being
//! resolved and hands out [`Deferred`] values. Forcing any one of them
//! resolves every key collected so far in a single call; the others read
//! from the cached results.

mod registry;

pub use registry::{normalize_path, BatchLoaderRegistry};

use crate::error::ResolverError;
use crate::resolver::{Deferred, ResolverResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// The consolidated fetch behind a [`BatchLoader`].
#[async_trait]
pub trait BatchResolve: Send + Sync + 'static {
    /// Identity of a scheduled load.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;
    /// Per-key information needed to resolve it.
    type Meta: Send + Sync + 'static;

    /// Resolves every pending key at once. Keys missing from the result
    /// resolve to `null`.
    async fn resolve(
        &self,
        entries: IndexMap<Self::Key, Self::Meta>,
    ) -> Result<HashMap<Self::Key, Value>, ResolverError>;
}

struct LoaderState<K, M> {
    pending: IndexMap<K, M>,
    resolved: HashMap<K, ResolverResult>,
    has_resolved: bool,
}

/// Coalesces loads scheduled during one level of execution.
pub struct BatchLoader<R: BatchResolve> {
    resolver: R,
    state: Mutex<LoaderState<R::Key, R::Meta>>,
    resolve_count: AtomicUsize,
}

impl<R: BatchResolve> BatchLoader<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            state: Mutex::new(LoaderState {
                pending: IndexMap::new(),
                resolved: HashMap::new(),
                has_resolved: false,
            }),
            resolve_count: AtomicUsize::new(0),
        }
    }

    /// Schedules `key` and returns a value resolved on first force.
    ///
    /// Scheduling a key twice before resolution keeps the first meta.
    pub async fn load(self: &Arc<Self>, key: R::Key, meta: R::Meta) -> Deferred {
        {
            let mut state = self.state.lock().await;
            if !state.resolved.contains_key(&key) && !state.pending.contains_key(&key) {
                state.pending.insert(key.clone(), meta);
            }
        }
        let loader = Arc::clone(self);
        Deferred::new(async move { loader.force(&key).await })
    }

    /// Schedules several keys sharing the same meta.
    pub async fn load_many<I>(self: &Arc<Self>, keys: I, meta: R::Meta) -> Vec<Deferred>
    where
        I: IntoIterator<Item = R::Key>,
        R::Meta: Clone,
    {
        let mut deferred = Vec::new();
        for key in keys {
            deferred.push(self.load(key, meta.clone()).await);
        }
        deferred
    }

    async fn force(&self, key: &R::Key) -> ResolverResult {
        let mut state = self.state.lock().await;
        if let Some(result) = state.resolved.get(key) {
            return result.clone();
        }

        let pending = std::mem::take(&mut state.pending);
        if !pending.is_empty() {
            let keys: Vec<R::Key> = pending.keys().cloned().collect();
            let started = Instant::now();
            self.resolve_count.fetch_add(1, Ordering::SeqCst);

            match self.resolver.resolve(pending).await {
                Ok(mut values) => {
                    for k in keys.iter() {
                        let value = values.remove(k).unwrap_or(Value::Null);
                        state.resolved.insert(k.clone(), Ok(value));
                    }
                }
                Err(error) => {
                    for k in keys.iter() {
                        state.resolved.insert(k.clone(), Err(error.clone()));
                    }
                }
            }
            state.has_resolved = true;

            tracing::debug!(
                keys = keys.len(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "batch loader resolved"
            );
        }

        state.resolved.get(key).cloned().unwrap_or(Ok(Value::Null))
    }

    /// Number of consolidated fetches performed so far.
    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }

    /// Whether at least one batch has been resolved.
    pub async fn has_resolved(&self) -> bool {
        self.state.lock().await.has_resolved
    }

    /// Number of keys waiting for resolution.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

impl<R: BatchResolve> Debug for BatchLoader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("resolve_count", &self.resolve_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Doubles keys and records every batch it receives.
    #[derive(Default)]
    struct Doubler {
        batches: Arc<StdMutex<Vec<Vec<i64>>>>,
    }

    #[async_trait]
    impl BatchResolve for Doubler {
        type Key = i64;
        type Meta = ();

        async fn resolve(
            &self,
            entries: IndexMap<i64, ()>,
        ) -> Result<HashMap<i64, Value>, ResolverError> {
            let keys: Vec<i64> = entries.keys().copied().collect();
            self.batches.lock().unwrap().push(keys.clone());
            Ok(keys.into_iter().filter(|k| *k != 0).map(|k| (k, json!(k * 2))).collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl BatchResolve for Failing {
        type Key = String;
        type Meta = ();

        async fn resolve(
            &self,
            _entries: IndexMap<String, ()>,
        ) -> Result<HashMap<String, Value>, ResolverError> {
            Err(ResolverError::custom("backend unavailable"))
        }
    }

    #[tokio::test]
    async fn test_loads_are_coalesced() {
        let doubler = Doubler::default();
        let batches = Arc::clone(&doubler.batches);
        let loader = Arc::new(BatchLoader::new(doubler));

        let a = loader.load(1, ()).await;
        let b = loader.load(2, ()).await;
        let c = loader.load(3, ()).await;
        assert_eq!(loader.pending_count().await, 3);
        assert!(!loader.has_resolved().await);

        assert_eq!(b.force().await.unwrap(), json!(4));
        assert_eq!(a.force().await.unwrap(), json!(2));
        assert_eq!(c.force().await.unwrap(), json!(6));

        assert_eq!(loader.resolve_count(), 1);
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_same_key_twice_fetches_once() {
        let loader = Arc::new(BatchLoader::new(Doubler::default()));
        let first = loader.load(5, ()).await;
        let second = loader.load(5, ()).await;
        assert_eq!(loader.pending_count().await, 1);

        let first = first.force().await.unwrap();
        let second = second.force().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.resolve_count(), 1);
    }

    #[tokio::test]
    async fn test_forcing_again_does_not_resolve_again() {
        let loader = Arc::new(BatchLoader::new(Doubler::default()));
        loader.load(1, ()).await.force().await.unwrap();
        assert_eq!(loader.resolve_count(), 1);

        let again = loader.load(1, ()).await;
        assert_eq!(loader.pending_count().await, 0);
        assert_eq!(again.force().await.unwrap(), json!(2));
        assert_eq!(loader.resolve_count(), 1);
    }

    #[tokio::test]
    async fn test_keys_scheduled_after_resolution_form_a_new_batch() {
        let doubler = Doubler::default();
        let batches = Arc::clone(&doubler.batches);
        let loader = Arc::new(BatchLoader::new(doubler));

        loader.load(1, ()).await.force().await.unwrap();
        let late = loader.load(7, ()).await;
        assert_eq!(late.force().await.unwrap(), json!(14));
        assert_eq!(*batches.lock().unwrap(), vec![vec![1], vec![7]]);
    }

    #[tokio::test]
    async fn test_missing_keys_resolve_to_null() {
        let loader = Arc::new(BatchLoader::new(Doubler::default()));
        let values = loader.load_many([0, 1], ()).await;
        let mut resolved = Vec::new();
        for value in values {
            resolved.push(value.force().await.unwrap());
        }
        assert_eq!(resolved, vec![Value::Null, json!(2)]);
    }

    #[tokio::test]
    async fn test_errors_reach_every_key() {
        let loader = Arc::new(BatchLoader::new(Failing));
        let a = loader.load("a".to_string(), ()).await;
        let b = loader.load("b".to_string(), ()).await;
        assert!(a.force().await.is_err());
        assert_eq!(
            b.force().await.unwrap_err().to_string(),
            "backend unavailable"
        );
        assert_eq!(loader.resolve_count(), 1);
    }
}
