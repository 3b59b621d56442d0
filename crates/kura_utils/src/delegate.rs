use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::Mutex;

/// A free listener. Its identity is the allocation behind the `Arc`, so keep the
/// `Callback` around if it has to be removed later.
pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct EntryKey {
    function: usize,
    // `None` is the "no receiver" sentinel, never equal to a real receiver
    receiver: Option<usize>,
}

impl EntryKey {
    fn free<A: ?Sized>(callback: &Callback<A>) -> Self {
        Self {
            function: Arc::as_ptr(callback) as *const () as usize,
            receiver: None,
        }
    }
    fn bound<R, A: ?Sized>(receiver: &Arc<R>, method: fn(&R, &A)) -> Self {
        Self {
            function: method as usize,
            receiver: Some(Arc::as_ptr(receiver) as usize),
        }
    }
}

struct Entry<A: ?Sized> {
    key: EntryKey,
    invoke: Callback<A>,
}

impl<A: ?Sized> Clone for Entry<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            invoke: self.invoke.clone(),
        }
    }
}

/// Ordered list of listeners invoked together.
///
/// Insertion order is invocation order and a `(function, receiver)` pair is only
/// ever registered once. Invocation works on a snapshot of the list, so listeners
/// may add or remove listeners (including themselves) while being invoked; such
/// changes take effect on the next invocation.
pub struct MulticastDelegate<A: ?Sized> {
    entries: Mutex<Vec<Entry<A>>>,
}

impl<A: ?Sized> Default for MulticastDelegate<A> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<A: ?Sized + 'static> MulticastDelegate<A> {
    pub fn new() -> Self {
        Self::default()
    }
    fn insert_with(&self, key: EntryKey, make: impl FnOnce() -> Callback<A>) -> bool {
        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.key == key) {
            return false;
        }
        entries.push(Entry {
            key,
            invoke: make(),
        });

        true
    }
    fn remove_key(&self, key: EntryKey) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.key == key) {
            Some(ix) => {
                entries.remove(ix);
                true
            }
            None => false,
        }
    }
    /// Registers a free listener. Returns `false` if it was already registered.
    pub fn add(&self, callback: &Callback<A>) -> bool {
        self.insert_with(EntryKey::free(callback), || callback.clone())
    }
    /// Wraps `f` into a [`Callback`], registers it and hands it back for later removal.
    pub fn subscribe(&self, f: impl Fn(&A) + Send + Sync + 'static) -> Callback<A> {
        let callback: Callback<A> = Arc::new(f);
        self.add(&callback);

        callback
    }
    /// Registers `method` bound to `receiver`. The receiver is kept alive until the
    /// entry is removed or the delegate cleared.
    pub fn add_bound<R: Send + Sync + 'static>(
        &self,
        receiver: &Arc<R>,
        method: fn(&R, &A),
    ) -> bool {
        self.insert_with(EntryKey::bound(receiver, method), || {
            let receiver = receiver.clone();
            Arc::new(move |args: &A| method(&receiver, args))
        })
    }
    pub fn remove(&self, callback: &Callback<A>) -> bool {
        self.remove_key(EntryKey::free(callback))
    }
    pub fn remove_bound<R: Send + Sync + 'static>(
        &self,
        receiver: &Arc<R>,
        method: fn(&R, &A),
    ) -> bool {
        self.remove_key(EntryKey::bound(receiver, method))
    }
    pub fn contains(&self, callback: &Callback<A>) -> bool {
        let key = EntryKey::free(callback);
        self.entries.lock().iter().any(|entry| entry.key == key)
    }
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
    /// Replaces this delegate's listeners with a copy of `other`'s.
    /// The two lists stay independent afterwards.
    pub fn assign_from(&self, other: &MulticastDelegate<A>) {
        if std::ptr::eq(self, other) {
            return;
        }
        let copied = other.entries.lock().clone();
        *self.entries.lock() = copied;
    }
    /// Invokes every listener in insertion order.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners still run.
    pub fn invoke(&self, args: &A) {
        let snapshot: Vec<Callback<A>> = self
            .entries
            .lock()
            .iter()
            .map(|entry| entry.invoke.clone())
            .collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| (*callback)(args))).is_err() {
                log::error!("Listener panicked while being invoked, continuing with the rest");
            }
        }
    }
    /// Returns an invoker that calls every listener registered at the time of the call.
    pub fn entry(&self) -> impl Fn(&A) + '_ {
        move |args| self.invoke(args)
    }
}
