use std::sync::Arc;

use kura_utils::FxHashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::ErasedHandle;

static GLOBAL_CACHE: Lazy<AssetCache> = Lazy::new(AssetCache::new);

/// Url -> asset map holding one retain on every asset it contains.
///
/// A url is present iff the cache holds a retain on its asset. The cache never
/// evicts an asset somebody else still retains: [`AssetCache::try_release`] only
/// drops the entry when the cache's own retain is the last one.
///
/// Cloning is cheap and clones share the same map.
#[derive(Clone, Default)]
pub struct AssetCache {
    entries: Arc<Mutex<FxHashMap<String, ErasedHandle>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }
    /// The process-wide cache used when no cache is passed explicitly
    pub fn global() -> &'static AssetCache {
        &GLOBAL_CACHE
    }
    /// Records `handle` under `url` and retains it. A url that is already cached is
    /// left alone, so repeated loads of the same url never retain twice.
    pub fn add(&self, handle: &ErasedHandle, url: &str) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(url) {
            return false;
        }
        handle.add_ref();
        entries.insert(url.to_owned(), handle.clone());
        log::debug!("Cached {} as {:?} (refs: {})", handle.name(), url, handle.ref_count());

        true
    }
    /// Releases the cache's retain on `handle` and forgets `url`, unless someone
    /// else still retains the asset. Returns whether the entry was removed.
    pub fn try_release(&self, handle: &ErasedHandle, url: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(url) {
            Some(cached) if cached == handle => {}
            _ => return false,
        }
        if handle.ref_count() > 1 {
            return false;
        }
        handle.dec_ref();
        entries.remove(url);
        log::debug!("Released {:?} from cache", url);

        true
    }
    /// Forgets every entry without releasing anything. Meant for hard teardown.
    pub fn reset(&self) {
        self.entries.lock().clear();
    }
    /// Tries to release every entry; entries still retained elsewhere stay.
    pub fn free(&self) {
        let snapshot: Vec<(String, ErasedHandle)> = self
            .entries
            .lock()
            .iter()
            .map(|(url, handle)| (url.clone(), handle.clone()))
            .collect();

        for (url, handle) in snapshot {
            self.try_release(&handle, &url);
        }
    }
    pub fn get(&self, url: &str) -> Option<ErasedHandle> {
        self.entries.lock().get(url).cloned()
    }
    pub fn contains(&self, url: &str) -> bool {
        self.entries.lock().contains_key(url)
    }
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
    /// Cached urls in no particular order
    pub fn urls(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Asset, HandleAllocator};
    use kura_handle::RefMessage;
    use uuid::Uuid;

    struct Sprite;
    impl Asset for Sprite {
        const NAME: &'static str = "Sprite";
    }

    fn sprite(allocator: &HandleAllocator, name: &str) -> ErasedHandle {
        allocator
            .allocate(name, Uuid::new_v4(), Sprite)
            .clone_erased()
    }

    #[test]
    fn test_add_retains_once() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");

        assert!(cache.add(&hero, "hero.png"));
        assert!(!cache.add(&hero, "hero.png"));

        assert_eq!(hero.ref_count(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("hero.png"), Some(hero));
    }

    #[test]
    fn test_release_last_holder() {
        let (sender, receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");
        cache.add(&hero, "hero.png");

        assert!(cache.try_release(&hero, "hero.png"));

        assert!(!cache.contains("hero.png"));
        assert_eq!(hero.ref_count(), 0);
        assert_eq!(receiver.try_recv().unwrap(), RefMessage::Unload(hero.id()));
    }

    #[test]
    fn test_release_keeps_shared_asset() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");
        cache.add(&hero, "hero.png");
        hero.add_ref();

        assert!(!cache.try_release(&hero, "hero.png"));
        assert!(cache.contains("hero.png"));
        assert_eq!(hero.ref_count(), 2);

        hero.dec_ref();
        assert!(cache.try_release(&hero, "hero.png"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_ignores_foreign_handle() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");
        let villain = sprite(&allocator, "villain");
        cache.add(&hero, "hero.png");

        assert!(!cache.try_release(&villain, "hero.png"));
        assert!(!cache.try_release(&hero, "villain.png"));
        assert!(cache.contains("hero.png"));
    }

    #[test]
    fn test_reset_does_not_release() {
        let (sender, receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");
        cache.add(&hero, "hero.png");

        cache.reset();

        assert!(cache.is_empty());
        assert_eq!(hero.ref_count(), 1);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_free_releases_unshared() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let hero = sprite(&allocator, "hero");
        let villain = sprite(&allocator, "villain");
        cache.add(&hero, "hero.png");
        cache.add(&villain, "villain.png");
        villain.add_ref();

        cache.free();

        assert_eq!(cache.urls(), vec!["villain.png".to_owned()]);
        assert_eq!(hero.ref_count(), 0);
        assert_eq!(villain.ref_count(), 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let cache = AssetCache::new();
        let other = cache.clone();
        let hero = sprite(&allocator, "hero");

        cache.add(&hero, "hero.png");
        assert!(other.contains("hero.png"));
    }
}
