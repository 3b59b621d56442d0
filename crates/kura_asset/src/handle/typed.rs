use std::{ops::Deref, sync::Arc};

use kura_handle::RefCounter;
use uuid::Uuid;

use super::erased::ErasedHandle;
use crate::Asset;

pub(crate) struct HandleInner<T> {
    pub(crate) asset: T,
    pub(crate) name: String,
    pub(crate) uuid: Uuid,
    pub(crate) refs: RefCounter,
}

/// Shared pointer to a loaded asset.
///
/// Clones point at the same asset and do not retain it; retaining is explicit
/// through [`Handle::add_ref`] / [`Handle::dec_ref`].
pub struct Handle<T> {
    inner: Arc<HandleInner<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl<T: Asset> Handle<T> {
    pub(crate) fn from_inner(inner: Arc<HandleInner<T>>) -> Self {
        Self { inner }
    }
    pub(crate) fn inner(&self) -> &Arc<HandleInner<T>> {
        &self.inner
    }
    pub fn id(&self) -> usize {
        self.inner.refs.id()
    }
    /// Name of the asset inside its bundle, without the directory part
    pub fn name(&self) -> &str {
        &self.inner.name
    }
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }
    pub fn ref_count(&self) -> usize {
        self.inner.refs.ref_count()
    }
    pub fn add_ref(&self) -> usize {
        self.inner.refs.add_ref()
    }
    pub fn dec_ref(&self) -> usize {
        self.inner.refs.dec_ref()
    }
    pub fn clone_erased(&self) -> ErasedHandle {
        self.clone().into()
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.asset
    }
}

impl<T: Asset + std::fmt::Debug> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &T::NAME)
            .field("id", &self.id())
            .field("name", &self.name())
            .field("refs", &self.ref_count())
            .field("asset", &self.inner.asset)
            .finish()
    }
}
