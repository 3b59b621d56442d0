use std::sync::Arc;

use anyhow::anyhow;
use kura_utils::FxHashMap;
use parking_lot::RwLock;

use crate::{
    Asset, AssetCache, AssetOptions, Bundle, Handle, LoadAction, LoadError, LoadRequest,
    LoadResult, PoolSettings, RequestItem, RequestPool, RequestType, RequestUrl, SceneAsset,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerSettings {
    pub pool: PoolSettings,
}

#[derive(Default)]
struct Bundles {
    named: FxHashMap<String, Arc<dyn Bundle>>,
    default: Option<String>,
}

struct ResourceManagerInner {
    bundles: RwLock<Bundles>,
    pool: RequestPool,
}

/// Entry point for loading: a registry of named bundles in front of a
/// [`RequestPool`].
///
/// The async helpers take a pooled request, configure it, await it and hand it
/// back to the pool once it has settled, whether it succeeded or not.
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<ResourceManagerInner>,
}

impl ResourceManager {
    /// A manager sharing the process-wide [`AssetCache`]
    pub fn new() -> Self {
        Self::with_settings(AssetCache::global().clone(), ManagerSettings::default())
    }
    pub fn with_settings(cache: AssetCache, settings: ManagerSettings) -> Self {
        Self {
            inner: Arc::new(ResourceManagerInner {
                bundles: RwLock::new(Bundles::default()),
                pool: RequestPool::new(cache, settings.pool),
            }),
        }
    }
    pub fn cache(&self) -> &AssetCache {
        self.inner.pool.cache()
    }
    pub fn pool(&self) -> &RequestPool {
        &self.inner.pool
    }
    /// Registers a bundle under its name, replacing any bundle of that name.
    /// The first bundle registered becomes the default one.
    pub fn add_bundle(&self, bundle: Arc<dyn Bundle>) -> Option<Arc<dyn Bundle>> {
        let name = bundle.name().to_owned();
        let mut bundles = self.inner.bundles.write();
        if bundles.default.is_none() {
            bundles.default = Some(name.clone());
        }
        log::debug!("Registered bundle {}", name);

        bundles.named.insert(name, bundle)
    }
    pub fn remove_bundle(&self, name: &str) -> Option<Arc<dyn Bundle>> {
        let mut bundles = self.inner.bundles.write();
        if bundles.default.as_deref() == Some(name) {
            bundles.default = None;
        }

        bundles.named.remove(name)
    }
    pub fn set_default_bundle(&self, name: &str) -> Result<(), LoadError> {
        let mut bundles = self.inner.bundles.write();
        if !bundles.named.contains_key(name) {
            return Err(LoadError::UnknownBundle(name.to_owned()));
        }
        bundles.default = Some(name.to_owned());

        Ok(())
    }
    /// The bundle called `name`, or the default bundle for `None`
    pub fn bundle(&self, name: Option<&str>) -> Result<Arc<dyn Bundle>, LoadError> {
        let bundles = self.inner.bundles.read();
        let name = match name {
            Some(name) => name,
            None => bundles
                .default
                .as_deref()
                .ok_or_else(|| LoadError::UnknownBundle("<default>".to_owned()))?,
        };

        bundles
            .named
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::UnknownBundle(name.to_owned()))
    }

    pub fn create_request<T: Asset>(&self) -> LoadRequest<T> {
        self.inner.pool.acquire()
    }
    /// Returns a settled or never started request to the pool.
    ///
    /// Panics if the request is pending.
    pub fn release_request<T: Asset>(&self, request: LoadRequest<T>) {
        self.inner.pool.release(request);
    }
    pub fn setup_load_request<T: Asset>(
        &self,
        url: impl Into<RequestUrl>,
        action: LoadAction,
        bundle: Option<&str>,
    ) -> Result<LoadRequest<T>, LoadError> {
        let bundle = self.bundle(bundle)?;
        let mut request = self.create_request::<T>();
        request
            .set_url(url)
            .set_bundle(bundle)
            .set_type(RequestType::Normal)
            .set_load_action(action);

        Ok(request)
    }
    pub fn setup_dir_request<T: Asset>(
        &self,
        dir: &str,
        action: LoadAction,
        bundle: Option<&str>,
    ) -> Result<LoadRequest<T>, LoadError> {
        let bundle = self.bundle(bundle)?;
        let mut request = self.create_request::<T>();
        request
            .set_url(dir)
            .set_bundle(bundle)
            .set_type(RequestType::Directory)
            .set_load_action(action);

        Ok(request)
    }
    pub fn setup_scene_request(
        &self,
        url: &str,
        options: AssetOptions,
        action: LoadAction,
        bundle: Option<&str>,
    ) -> Result<LoadRequest<SceneAsset>, LoadError> {
        let bundle = self.bundle(bundle)?;
        let mut request = self.create_request::<SceneAsset>();
        request
            .set_url(url)
            .set_bundle(bundle)
            .set_type(RequestType::Scene)
            .set_load_action(action)
            .set_asset_option(options);

        Ok(request)
    }

    async fn finish<T: Asset, R>(
        &self,
        request: LoadRequest<T>,
        extract: impl FnOnce(&LoadRequest<T>, Vec<Handle<T>>) -> Result<R, LoadError>,
    ) -> Result<R, LoadError> {
        let result = request.start().await;
        let output = result.and_then(|assets| extract(&request, assets));
        self.release_request(request);

        output
    }

    pub async fn load<T: Asset>(
        &self,
        url: impl Into<RequestUrl>,
        bundle: Option<&str>,
    ) -> LoadResult<T> {
        let request = self.setup_load_request::<T>(url, LoadAction::Load, bundle)?;
        self.finish(request, |_, assets| Ok(assets)).await
    }
    pub async fn preload<T: Asset>(
        &self,
        url: impl Into<RequestUrl>,
        bundle: Option<&str>,
    ) -> Result<Vec<RequestItem>, LoadError> {
        let request = self.setup_load_request::<T>(url, LoadAction::Preload, bundle)?;
        self.finish(request, |request, _| Ok(request.preloaded()))
            .await
    }
    pub async fn load_dir<T: Asset>(&self, dir: &str, bundle: Option<&str>) -> LoadResult<T> {
        let request = self.setup_dir_request::<T>(dir, LoadAction::Load, bundle)?;
        self.finish(request, |_, assets| Ok(assets)).await
    }
    pub async fn preload_dir<T: Asset>(
        &self,
        dir: &str,
        bundle: Option<&str>,
    ) -> Result<Vec<RequestItem>, LoadError> {
        let request = self.setup_dir_request::<T>(dir, LoadAction::Preload, bundle)?;
        self.finish(request, |request, _| Ok(request.preloaded()))
            .await
    }
    pub async fn load_scene(
        &self,
        url: &str,
        options: AssetOptions,
        bundle: Option<&str>,
    ) -> Result<Handle<SceneAsset>, LoadError> {
        let request = self.setup_scene_request(url, options, LoadAction::Load, bundle)?;
        self.finish(request, |_, assets| {
            assets
                .into_iter()
                .next()
                .ok_or_else(|| LoadError::backend(url, anyhow!("Bundle returned no scene")))
        })
        .await
    }
    pub async fn preload_scene(
        &self,
        url: &str,
        bundle: Option<&str>,
    ) -> Result<Vec<RequestItem>, LoadError> {
        let request =
            self.setup_scene_request(url, AssetOptions::default(), LoadAction::Preload, bundle)?;
        self.finish(request, |request, _| Ok(request.preloaded()))
            .await
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
