use std::{any::Any, sync::Arc};

use kura_handle::RefCounter;
use uuid::Uuid;

use super::typed::{Handle, HandleInner};
use crate::{Asset, AssetKind};

pub(crate) trait ErasedInner: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn uuid(&self) -> Uuid;
    fn refs(&self) -> &RefCounter;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Asset> ErasedInner for HandleInner<T> {
    fn name(&self) -> &str {
        &self.name
    }
    fn uuid(&self) -> Uuid {
        self.uuid
    }
    fn refs(&self) -> &RefCounter {
        &self.refs
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Kind-tagged handle of any asset type. This is what bundles hand back and
/// what the asset cache stores.
#[derive(Clone)]
pub struct ErasedHandle {
    kind: AssetKind,
    inner: Arc<dyn ErasedInner>,
}

impl ErasedHandle {
    pub fn kind(&self) -> AssetKind {
        self.kind
    }
    pub fn id(&self) -> usize {
        self.inner.refs().id()
    }
    pub fn name(&self) -> &str {
        self.inner.name()
    }
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid()
    }
    pub fn ref_count(&self) -> usize {
        self.inner.refs().ref_count()
    }
    pub fn add_ref(&self) -> usize {
        self.inner.refs().add_ref()
    }
    pub fn dec_ref(&self) -> usize {
        self.inner.refs().dec_ref()
    }
    pub fn into_typed<T: Asset>(self) -> Option<Handle<T>> {
        if !self.kind.is::<T>() {
            return None;
        }

        self.inner
            .into_any()
            .downcast::<HandleInner<T>>()
            .ok()
            .map(Handle::from_inner)
    }
    pub fn clone_typed<T: Asset>(&self) -> Option<Handle<T>> {
        self.clone().into_typed::<T>()
    }
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

impl PartialEq for ErasedHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}
impl Eq for ErasedHandle {}

impl std::hash::Hash for ErasedHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for ErasedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedHandle")
            .field("kind", &self.kind.name())
            .field("id", &self.id())
            .field("name", &self.name())
            .field("refs", &self.ref_count())
            .finish()
    }
}

impl<T: Asset> From<Handle<T>> for ErasedHandle {
    fn from(handle: Handle<T>) -> Self {
        let inner: Arc<dyn ErasedInner> = handle.inner().clone();
        Self {
            kind: AssetKind::of::<T>(),
            inner,
        }
    }
}
