use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::OnceCell;

use crate::{Asset, Handle, LoadError};

pub type LoadResult<T> = Result<Vec<Handle<T>>, LoadError>;

/// The in-flight operation of a [`crate::LoadRequest`].
///
/// Every clone resolves to the same result, so any number of callers may await
/// one request.
pub struct Pending<T: Asset> {
    inner: Shared<BoxFuture<'static, LoadResult<T>>>,
    outcome: Arc<OnceCell<LoadResult<T>>>,
}

impl<T: Asset> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

/// Settling side of a [`Pending`]. The outcome is stored before it is sent, so
/// it is visible to [`Pending::peek`] without anyone polling.
pub(crate) struct Settler<T: Asset> {
    sender: flume::Sender<LoadResult<T>>,
    outcome: Arc<OnceCell<LoadResult<T>>>,
}

impl<T: Asset> Settler<T> {
    pub(crate) fn settle(&self, result: LoadResult<T>) {
        if self.outcome.set(result.clone()).is_err() {
            log::error!("Pending operation settled twice");
            return;
        }
        if self.sender.send(result).is_err() {
            log::debug!("Request settled after its pending operation was dropped");
        }
    }
}

impl<T: Asset> Pending<T> {
    /// A pending operation and the sender that settles it
    pub(crate) fn channel(url: String) -> (Settler<T>, Self) {
        let (sender, receiver) = flume::bounded(1);
        let outcome = Arc::new(OnceCell::new());
        let inner = receiver
            .into_recv_async()
            .map(move |received| received.unwrap_or(Err(LoadError::Abandoned { url })))
            .boxed()
            .shared();

        let settler = Settler {
            sender,
            outcome: outcome.clone(),
        };
        (settler, Self { inner, outcome })
    }
    pub(crate) fn settled(result: LoadResult<T>) -> Self {
        Self {
            outcome: Arc::new(OnceCell::with_value(result.clone())),
            inner: futures::future::ready(result).boxed().shared(),
        }
    }
    pub fn is_settled(&self) -> bool {
        self.outcome.get().is_some()
    }
    /// The result, if the operation has settled
    pub fn peek(&self) -> Option<&LoadResult<T>> {
        self.outcome.get()
    }
    /// Blocks the current thread until the operation settles
    pub fn wait(self) -> LoadResult<T> {
        futures::executor::block_on(self)
    }
}

impl<T: Asset> Future for Pending<T> {
    type Output = LoadResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}
