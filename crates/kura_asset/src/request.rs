use std::sync::Arc;

use kura_utils::{Callback, MulticastDelegate};
use parking_lot::Mutex;

use crate::{
    pending::Settler, Asset, AssetCache, AssetKind, AssetOptions, Bundle, ErasedHandle, Handle,
    LoadError, LoadResponder, LoadedAssets, Pending, PreloadResponder, RequestItem,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestType {
    #[default]
    Normal,
    Directory,
    Scene,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadAction {
    #[default]
    Load,
    Preload,
}

/// Target of a request: nothing yet, one url, or an ordered batch of urls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestUrl {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl RequestUrl {
    pub fn urls(&self) -> Vec<String> {
        match self {
            RequestUrl::None => Vec::new(),
            RequestUrl::One(url) => vec![url.clone()],
            RequestUrl::Many(urls) => urls.clone(),
        }
    }
    pub fn single(&self) -> Option<&str> {
        match self {
            RequestUrl::One(url) => Some(url),
            _ => None,
        }
    }
    pub fn is_empty(&self) -> bool {
        match self {
            RequestUrl::None => true,
            RequestUrl::One(_) => false,
            RequestUrl::Many(urls) => urls.is_empty(),
        }
    }
    fn label(&self) -> String {
        match self {
            RequestUrl::None => "<no url>".to_owned(),
            RequestUrl::One(url) => url.clone(),
            RequestUrl::Many(urls) => urls.join(", "),
        }
    }
}

impl From<&str> for RequestUrl {
    fn from(url: &str) -> Self {
        RequestUrl::One(url.to_owned())
    }
}
impl From<String> for RequestUrl {
    fn from(url: String) -> Self {
        RequestUrl::One(url)
    }
}
impl From<Vec<String>> for RequestUrl {
    fn from(urls: Vec<String>) -> Self {
        RequestUrl::Many(urls)
    }
}
impl From<Vec<&str>> for RequestUrl {
    fn from(urls: Vec<&str>) -> Self {
        RequestUrl::Many(urls.into_iter().map(str::to_owned).collect())
    }
}
impl From<&[&str]> for RequestUrl {
    fn from(urls: &[&str]) -> Self {
        RequestUrl::Many(urls.iter().map(|url| (*url).to_owned()).collect())
    }
}
impl<const N: usize> From<[&str; N]> for RequestUrl {
    fn from(urls: [&str; N]) -> Self {
        RequestUrl::Many(urls.iter().map(|url| (*url).to_owned()).collect())
    }
}

enum Phase<T: Asset> {
    Configured,
    Pending(Pending<T>),
    Succeeded,
    Failed(LoadError),
}

impl<T: Asset> Phase<T> {
    fn name(&self) -> &'static str {
        match self {
            Phase::Configured => "configured",
            Phase::Pending(_) => "pending",
            Phase::Succeeded => "succeeded",
            Phase::Failed(_) => "failed",
        }
    }
}

struct RequestState<T: Asset> {
    request_type: RequestType,
    action: LoadAction,
    url: RequestUrl,
    bundle: Option<Arc<dyn Bundle>>,
    options: AssetOptions,
    assets: Vec<Handle<T>>,
    preloaded: Vec<RequestItem>,
    finished: usize,
    total: usize,
    phase: Phase<T>,
}

impl<T: Asset> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            request_type: RequestType::Normal,
            action: LoadAction::Load,
            url: RequestUrl::None,
            bundle: None,
            options: AssetOptions::default(),
            assets: Vec::new(),
            preloaded: Vec::new(),
            finished: 0,
            total: 1,
            phase: Phase::Configured,
        }
    }
}

impl<T: Asset> RequestState<T> {
    /// Url -> asset pairs a successful load registers in the cache
    fn cache_entries(&self) -> Vec<(String, ErasedHandle)> {
        if self.action != LoadAction::Load {
            return Vec::new();
        }
        match self.request_type {
            RequestType::Normal => self
                .url
                .urls()
                .into_iter()
                .zip(self.assets.iter())
                .map(|(url, asset)| (url, asset.clone_erased()))
                .collect(),
            RequestType::Directory => {
                let dir = self.url.single().unwrap_or_default().trim_end_matches('/');
                self.assets
                    .iter()
                    .map(|asset| (format!("{}/{}", dir, asset.name()), asset.clone_erased()))
                    .collect()
            }
            RequestType::Scene => Vec::new(),
        }
    }
}

struct Completed<T: Asset> {
    assets: Vec<Handle<T>>,
    items: Vec<RequestItem>,
}

struct RequestInner<T: Asset> {
    cache: AssetCache,
    state: Mutex<RequestState<T>>,
    on_progress: MulticastDelegate<LoadRequest<T>>,
    on_complete: MulticastDelegate<LoadRequest<T>>,
}

pub type RequestListener<T> = Callback<LoadRequest<T>>;

/// One load or preload of assets of kind `T` from a bundle.
///
/// A request is configured through its setters, started once, and settles as
/// either succeeded or failed. Starting it again while it is in flight hands out
/// the same [`Pending`]; starting it after it settled resolves immediately with
/// the stored outcome without touching the bundle.
///
/// Listeners on [`LoadRequest::on_progress`] and [`LoadRequest::on_complete`]
/// receive the request itself. After a successful load both listener lists are
/// cleared; after a failure they are kept so the request can still be inspected
/// by whoever registered them. Listeners added after a request settled are never
/// called, the outcome is only available through [`LoadRequest::start`].
pub struct LoadRequest<T: Asset> {
    inner: Arc<RequestInner<T>>,
}

impl<T: Asset> LoadRequest<T> {
    pub fn new(cache: AssetCache) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                cache,
                state: Mutex::new(RequestState::default()),
                on_progress: MulticastDelegate::new(),
                on_complete: MulticastDelegate::new(),
            }),
        }
    }
    // Second reference to the same request, owned by a responder while a load is in flight
    fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
    fn configure(&mut self, setter: &str, f: impl FnOnce(&mut RequestState<T>)) -> &mut Self {
        let mut state = self.inner.state.lock();
        assert!(
            matches!(state.phase, Phase::Configured),
            "LoadRequest::{} called on a {} request",
            setter,
            state.phase.name()
        );
        f(&mut state);
        drop(state);

        self
    }
    pub fn set_url(&mut self, url: impl Into<RequestUrl>) -> &mut Self {
        let url = url.into();
        self.configure("set_url", |state| state.url = url)
    }
    pub fn set_bundle(&mut self, bundle: Arc<dyn Bundle>) -> &mut Self {
        self.configure("set_bundle", |state| state.bundle = Some(bundle))
    }
    pub fn set_type(&mut self, request_type: RequestType) -> &mut Self {
        self.configure("set_type", |state| state.request_type = request_type)
    }
    pub fn set_load_action(&mut self, action: LoadAction) -> &mut Self {
        self.configure("set_load_action", |state| state.action = action)
    }
    pub fn set_asset_option(&mut self, options: AssetOptions) -> &mut Self {
        self.configure("set_asset_option", |state| state.options = options)
    }

    pub fn kind(&self) -> AssetKind {
        AssetKind::of::<T>()
    }
    pub fn request_type(&self) -> RequestType {
        self.inner.state.lock().request_type
    }
    pub fn load_action(&self) -> LoadAction {
        self.inner.state.lock().action
    }
    pub fn url(&self) -> RequestUrl {
        self.inner.state.lock().url.clone()
    }
    pub fn bundle(&self) -> Option<Arc<dyn Bundle>> {
        self.inner.state.lock().bundle.clone()
    }
    pub fn asset_options(&self) -> AssetOptions {
        self.inner.state.lock().options
    }
    pub fn cache(&self) -> &AssetCache {
        &self.inner.cache
    }
    /// Loaded assets, parallel to the urls for batch loads
    pub fn assets(&self) -> Vec<Handle<T>> {
        self.inner.state.lock().assets.clone()
    }
    pub fn main_asset(&self) -> Option<Handle<T>> {
        self.inner.state.lock().assets.first().cloned()
    }
    /// Descriptors reported by a finished preload
    pub fn preloaded(&self) -> Vec<RequestItem> {
        self.inner.state.lock().preloaded.clone()
    }
    pub fn error(&self) -> Option<LoadError> {
        match &self.inner.state.lock().phase {
            Phase::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }
    pub fn finished(&self) -> usize {
        self.inner.state.lock().finished
    }
    pub fn total(&self) -> usize {
        self.inner.state.lock().total
    }
    pub fn is_done(&self) -> bool {
        matches!(
            self.inner.state.lock().phase,
            Phase::Succeeded | Phase::Failed(_)
        )
    }
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.state.lock().phase, Phase::Pending(_))
    }
    pub fn is_successful(&self) -> bool {
        !matches!(self.inner.state.lock().phase, Phase::Failed(_))
    }
    /// The in-flight operation, if the request is currently pending
    pub fn pending(&self) -> Option<Pending<T>> {
        match &self.inner.state.lock().phase {
            Phase::Pending(pending) => Some(pending.clone()),
            _ => None,
        }
    }
    pub fn on_progress(&self) -> &MulticastDelegate<LoadRequest<T>> {
        &self.inner.on_progress
    }
    pub fn on_complete(&self) -> &MulticastDelegate<LoadRequest<T>> {
        &self.inner.on_complete
    }

    pub fn start(&self) -> Pending<T> {
        let mut state = self.inner.state.lock();
        match &state.phase {
            Phase::Pending(pending) => return pending.clone(),
            Phase::Succeeded => return Pending::settled(Ok(state.assets.clone())),
            Phase::Failed(error) => return Pending::settled(Err(error.clone())),
            Phase::Configured => {}
        }

        let (settler, pending) = Pending::channel(state.url.label());
        state.phase = Phase::Pending(pending.clone());

        let request_type = state.request_type;
        let action = state.action;
        let url = state.url.clone();
        let bundle = state.bundle.clone();
        let options = state.options;
        drop(state);

        let Some(bundle) = bundle else {
            self.settle(Err(LoadError::Unconfigured("a bundle")), &settler);
            return pending;
        };
        if url.is_empty() {
            self.settle(Err(LoadError::Unconfigured("a url")), &settler);
            return pending;
        }
        let target = match (request_type, url.single()) {
            (RequestType::Normal, _) => String::new(),
            (_, Some(target)) => target.to_owned(),
            (_, None) => {
                self.settle(
                    Err(LoadError::Unconfigured(
                        "a single url for a directory or scene",
                    )),
                    &settler,
                );
                return pending;
            }
        };

        log::debug!(
            "Starting {:?} {:?} of {} {} from bundle {}",
            action,
            request_type,
            T::NAME,
            url.label(),
            bundle.name()
        );

        let kind = self.kind();
        match action {
            LoadAction::Load => {
                let responder = self.load_responder(settler);
                match request_type {
                    RequestType::Normal => bundle.load(&url.urls(), kind, responder),
                    RequestType::Directory => bundle.load_dir(&target, kind, responder),
                    RequestType::Scene => bundle.load_scene(&target, options, responder),
                }
            }
            LoadAction::Preload => {
                let responder = self.preload_responder(settler);
                match request_type {
                    RequestType::Normal => bundle.preload(&url.urls(), responder),
                    RequestType::Directory => bundle.preload_dir(&target, responder),
                    RequestType::Scene => bundle.preload_scene(&target, responder),
                }
            }
        }

        pending
    }

    /// Resets the request to a freshly constructed one, dropping every listener.
    ///
    /// Panics if the request is pending.
    pub fn dispose(&mut self) {
        let mut state = self.inner.state.lock();
        assert!(
            !matches!(state.phase, Phase::Pending(_)),
            "LoadRequest disposed while its load is pending"
        );
        *state = RequestState::default();
        drop(state);

        self.inner.on_complete.clear();
        self.inner.on_progress.clear();
    }

    fn load_responder(&self, settler: Settler<T>) -> LoadResponder {
        let progress = self.share();
        let complete = self.share();

        LoadResponder::new(
            move |finished, total| progress.report_progress(finished, total),
            move |outcome| {
                let outcome = complete.collect_assets(outcome).map(|assets| Completed {
                    assets,
                    items: Vec::new(),
                });
                complete.settle(outcome, &settler);
            },
        )
    }
    fn preload_responder(&self, settler: Settler<T>) -> PreloadResponder {
        let complete = self.share();

        PreloadResponder::new(move |outcome| {
            let url = complete.url().label();
            let outcome = match outcome {
                Some(Ok(items)) => Ok(Completed {
                    assets: Vec::new(),
                    items,
                }),
                Some(Err(reason)) => Err(LoadError::backend(url, reason)),
                None => Err(LoadError::Abandoned { url }),
            };
            complete.settle(outcome, &settler);
        })
    }
    fn report_progress(&self, finished: usize, total: usize) {
        {
            let mut state = self.inner.state.lock();
            if !matches!(state.phase, Phase::Pending(_)) {
                log::debug!("Ignoring progress for a {} request", state.phase.name());
                return;
            }
            state.finished = finished;
            state.total = total;
        }
        self.inner.on_progress.invoke(self);
    }
    fn collect_assets(
        &self,
        outcome: Option<anyhow::Result<LoadedAssets>>,
    ) -> Result<Vec<Handle<T>>, LoadError> {
        let url = self.url().label();
        match outcome {
            None => Err(LoadError::Abandoned { url }),
            Some(Err(reason)) => Err(LoadError::backend(url, reason)),
            Some(Ok(loaded)) => loaded
                .into_vec()
                .into_iter()
                .map(|handle| {
                    let found = handle.kind().name();
                    handle.into_typed::<T>().ok_or_else(|| LoadError::KindMismatch {
                        url: url.clone(),
                        expected: T::NAME,
                        found,
                    })
                })
                .collect(),
        }
    }
    fn settle(&self, outcome: Result<Completed<T>, LoadError>, settler: &Settler<T>) {
        let mut state = self.inner.state.lock();
        if !matches!(state.phase, Phase::Pending(_)) {
            log::error!(
                "Tried to settle a {} request for {}",
                state.phase.name(),
                state.url.label()
            );
            return;
        }

        let result = match outcome {
            Err(error) => {
                match &error {
                    LoadError::Abandoned { .. } | LoadError::KindMismatch { .. } => {
                        log::warn!("{}", error)
                    }
                    _ => log::error!("{}", error),
                }
                state.assets.clear();
                state.preloaded.clear();
                state.phase = Phase::Failed(error.clone());
                drop(state);

                self.inner.on_complete.invoke(self);
                Err(error)
            }
            Ok(completed) => {
                state.assets = completed.assets;
                state.preloaded = completed.items;
                // Cache before anyone can observe success; the cache never takes a request lock
                for (url, handle) in state.cache_entries() {
                    self.inner.cache.add(&handle, &url);
                }
                state.phase = Phase::Succeeded;
                let assets = state.assets.clone();
                let label = state.url.label();
                drop(state);

                log::info!("Loaded {} ({} assets)", label, assets.len());

                self.inner.on_complete.invoke(self);
                self.inner.on_complete.clear();
                self.inner.on_progress.clear();
                Ok(assets)
            }
        };

        settler.settle(result);
    }
}

impl<T: Asset> std::fmt::Debug for LoadRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LoadRequest")
            .field("kind", &T::NAME)
            .field("type", &state.request_type)
            .field("action", &state.action)
            .field("url", &state.url)
            .field("phase", &state.phase.name())
            .field("finished", &state.finished)
            .field("total", &state.total)
            .finish()
    }
}
