use uuid::Uuid;

use crate::{AssetKind, ErasedHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssetOptions {
    pub reload_asset: bool,
    pub cache_asset: bool,
}

/// What a bundle reports for a preload: a descriptor of the warmed-up item,
/// not a usable asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestItem {
    pub uuid: Uuid,
    pub url: String,
    pub kind: &'static str,
}

/// A bundle may answer a load with a single asset or with a list.
#[derive(Clone, Debug)]
pub enum LoadedAssets {
    One(ErasedHandle),
    Many(Vec<ErasedHandle>),
}

impl LoadedAssets {
    pub fn into_vec(self) -> Vec<ErasedHandle> {
        match self {
            LoadedAssets::One(handle) => vec![handle],
            LoadedAssets::Many(handles) => handles,
        }
    }
}

impl From<ErasedHandle> for LoadedAssets {
    fn from(handle: ErasedHandle) -> Self {
        LoadedAssets::One(handle)
    }
}

impl From<Vec<ErasedHandle>> for LoadedAssets {
    fn from(handles: Vec<ErasedHandle>) -> Self {
        LoadedAssets::Many(handles)
    }
}

type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;
type LoadCompleteFn = Box<dyn FnOnce(Option<anyhow::Result<LoadedAssets>>) + Send>;
type PreloadCompleteFn = Box<dyn FnOnce(Option<anyhow::Result<Vec<RequestItem>>>) + Send>;

/// Progress and completion callbacks of one load handed to a [`Bundle`].
///
/// `complete` consumes the responder, so a load completes at most once. Dropping
/// the responder without completing settles the request as abandoned.
pub struct LoadResponder {
    on_progress: ProgressFn,
    on_complete: Option<LoadCompleteFn>,
}

impl LoadResponder {
    pub fn new(
        on_progress: impl Fn(usize, usize) + Send + Sync + 'static,
        on_complete: impl FnOnce(Option<anyhow::Result<LoadedAssets>>) + Send + 'static,
    ) -> Self {
        Self {
            on_progress: Box::new(on_progress),
            on_complete: Some(Box::new(on_complete)),
        }
    }
    pub fn progress(&self, finished: usize, total: usize) {
        (self.on_progress)(finished, total);
    }
    pub fn complete(mut self, result: anyhow::Result<LoadedAssets>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Some(result));
        }
    }
}

impl Drop for LoadResponder {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(None);
        }
    }
}

/// Completion callback of one preload handed to a [`Bundle`].
pub struct PreloadResponder {
    on_complete: Option<PreloadCompleteFn>,
}

impl PreloadResponder {
    pub fn new(
        on_complete: impl FnOnce(Option<anyhow::Result<Vec<RequestItem>>>) + Send + 'static,
    ) -> Self {
        Self {
            on_complete: Some(Box::new(on_complete)),
        }
    }
    pub fn complete(mut self, result: anyhow::Result<Vec<RequestItem>>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Some(result));
        }
    }
}

impl Drop for PreloadResponder {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(None);
        }
    }
}

/// A named collection of assets addressable by url.
///
/// Implementations fetch and decode however they like. They may complete a
/// responder before returning or later from another thread, and may report
/// progress any number of times before completing.
pub trait Bundle: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn load(&self, urls: &[String], kind: AssetKind, responder: LoadResponder);
    /// Loads every asset of `kind` under the `prefix` directory
    fn load_dir(&self, prefix: &str, kind: AssetKind, responder: LoadResponder);
    fn load_scene(&self, url: &str, options: AssetOptions, responder: LoadResponder);

    fn preload(&self, urls: &[String], responder: PreloadResponder);
    fn preload_dir(&self, prefix: &str, responder: PreloadResponder);
    fn preload_scene(&self, url: &str, responder: PreloadResponder);
}
