use std::any::{Any, TypeId};

use kura_utils::FxHashMap;
use parking_lot::Mutex;

use crate::{Asset, AssetCache, LoadRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// Disposed requests kept per asset kind; releases beyond this are dropped
    pub max_free_per_kind: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_free_per_kind: 32,
        }
    }
}

impl PoolSettings {
    pub fn unbounded() -> Self {
        Self {
            max_free_per_kind: usize::MAX,
        }
    }
}

/// Free lists of disposed [`LoadRequest`]s, one per asset kind.
///
/// Every request in a free list has been disposed: it is not done, not pending
/// and has no listeners.
pub struct RequestPool {
    free: Mutex<FxHashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    cache: AssetCache,
    settings: PoolSettings,
}

impl RequestPool {
    pub fn new(cache: AssetCache, settings: PoolSettings) -> Self {
        Self {
            free: Mutex::new(FxHashMap::default()),
            cache,
            settings,
        }
    }
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
    fn with_list<T: Asset, R>(&self, f: impl FnOnce(&mut Vec<LoadRequest<T>>) -> R) -> R {
        let mut free = self.free.lock();
        let list = free
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<LoadRequest<T>>::new()))
            .downcast_mut::<Vec<LoadRequest<T>>>()
            .expect("Request free list stored under the wrong asset kind");

        f(list)
    }
    /// A disposed request of kind `T`, or a fresh one if none is free.
    pub fn acquire<T: Asset>(&self) -> LoadRequest<T> {
        match self.with_list::<T, _>(|list| list.pop()) {
            Some(request) => {
                log::debug!("Reusing pooled {} request", T::NAME);
                request
            }
            None => LoadRequest::new(self.cache.clone()),
        }
    }
    /// Disposes `request` and keeps it for reuse.
    ///
    /// Panics if the request is still pending.
    pub fn release<T: Asset>(&self, mut request: LoadRequest<T>) {
        request.dispose();

        let max = self.settings.max_free_per_kind;
        self.with_list::<T, _>(|list| {
            if list.len() < max {
                list.push(request);
            }
        });
    }
    /// Number of disposed requests waiting for reuse for kind `T`
    pub fn free_count<T: Asset>(&self) -> usize {
        self.with_list::<T, _>(|list| list.len())
    }
}

impl Default for RequestPool {
    fn default() -> Self {
        Self::new(AssetCache::global().clone(), PoolSettings::default())
    }
}
