//! Single-flight caches for located sources and config arrays
//!
//! Every key is computed at most once per cache, even when many tasks ask
//! for it at the same time. The first caller installs a pending shared
//! future through the map's entry API; everyone else clones that future and
//! awaits the same result. Failures are settled like successes, so a broken
//! source is reported to every waiter and not retried until invalidated.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config_array::ConfigArray;
use crate::error::ConfigError;
use crate::locator::LocatedSource;
use crate::result::Result;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V>>>;

enum Slot<V: Clone> {
    Pending(SharedResult<V>),
    Settled(Result<V>),
}

/// A map whose values are computed once per key
pub struct SingleFlight<K, V: Clone> {
    slots: DashMap<K, Slot<V>>,
    computations: AtomicUsize,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            computations: AtomicUsize::new(0),
        }
    }

    /// Return the value for `key`, running `compute` only if no other caller
    /// has started it
    ///
    /// The computation runs on its own tokio task, so it must be called from
    /// within a runtime.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let pending = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Settled(result) => return result.clone(),
                Slot::Pending(future) => future.clone(),
            },
            Entry::Vacant(entry) => {
                self.computations.fetch_add(1, Ordering::Relaxed);
                // Spawned so the computation finishes even if every caller stops waiting
                let handle = tokio::spawn(compute());
                let future = async move {
                    handle.await.unwrap_or_else(|err| {
                        Err(ConfigError::Task {
                            message: err.to_string(),
                        })
                    })
                }
                .boxed()
                .shared();
                entry.insert(Slot::Pending(future.clone()));
                future
            }
        };

        let result = pending.clone().await;

        // The slot may have been invalidated and refilled while we waited
        if let Some(mut slot) = self.slots.get_mut(&key) {
            let same_flight = matches!(&*slot, Slot::Pending(current) if current.ptr_eq(&pending));
            if same_flight {
                *slot = Slot::Settled(result.clone());
            }
        }

        result
    }

    /// Settled successful value for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        match self.slots.get(key)?.value() {
            Slot::Settled(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Every settled successful entry
    pub fn settled(&self) -> Vec<(K, V)> {
        self.slots
            .iter()
            .filter_map(|slot| match slot.value() {
                Slot::Settled(Ok(value)) => Some((slot.key().clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Drop the entry for `key`; returns whether one existed
    pub fn invalidate(&self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// How many times a computation was started
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Directories with a cached source location
    pub located_directories: usize,
    /// Sources with a cached config array
    pub loaded_sources: usize,
    /// Upward searches started
    pub locate_calls: usize,
    /// Source loads started
    pub load_calls: usize,
}

/// Directory → source and source → config array caches of one resolver
#[derive(Default)]
pub struct ConfigCache {
    pub(crate) locations: SingleFlight<PathBuf, Arc<LocatedSource>>,
    /// Keyed by source file; `None` is the sequence without a source file
    pub(crate) arrays: SingleFlight<Option<PathBuf>, Arc<ConfigArray>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            located_directories: self.locations.len(),
            loaded_sources: self.arrays.len(),
            locate_calls: self.locations.computations(),
            load_calls: self.arrays.computations(),
        }
    }

    /// Forget everything
    pub fn clear(&self) {
        self.locations.clear();
        self.arrays.clear();
        tracing::debug!("Config cache cleared");
    }
}
