use std::sync::{atomic::AtomicUsize, Arc};

use kura_handle::{RefCounter, RefMessage};
use uuid::Uuid;

use super::typed::{Handle, HandleInner};
use crate::Asset;

/// Hands out asset ids, reusing released ones, and wires every handle's retain
/// counter to the owner's release channel.
pub struct HandleAllocator {
    handle_count: AtomicUsize,
    free_list_recv: flume::Receiver<usize>,
    free_list_send: flume::Sender<usize>,
    refcount_send: flume::Sender<RefMessage>,
}
impl HandleAllocator {
    pub fn new(refcount_send: flume::Sender<RefMessage>) -> Self {
        let (free_list_send, free_list_recv) = flume::unbounded();
        Self {
            handle_count: AtomicUsize::new(0),
            free_list_recv,
            free_list_send,
            refcount_send,
        }
    }
    pub fn allocate<T: Asset>(&self, name: impl Into<String>, uuid: Uuid, asset: T) -> Handle<T> {
        let id = self.allocate_id();

        Handle::from_inner(Arc::new(HandleInner {
            asset,
            name: name.into(),
            uuid,
            refs: RefCounter::new(id, Some(self.refcount_send.clone())),
        }))
    }
    pub fn allocate_id(&self) -> usize {
        self.free_list_recv.try_recv().unwrap_or_else(|_| {
            self.handle_count
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        })
    }
    pub fn deallocate_id(&self, id: usize) {
        self.free_list_send
            .send(id)
            .expect("Failed to update free list");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob(u8);
    impl Asset for Blob {
        const NAME: &'static str = "Blob";
    }
    struct Other;
    impl Asset for Other {
        const NAME: &'static str = "Other";
    }

    #[test]
    fn test_ids_are_reused() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let a = allocator.allocate_id();
        let b = allocator.allocate_id();
        assert_ne!(a, b);

        allocator.deallocate_id(a);
        assert_eq!(allocator.allocate_id(), a);
    }

    #[test]
    fn test_erased_round_trip_checks_kind() {
        let (sender, _receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let handle = allocator.allocate("blob", Uuid::new_v4(), Blob(4));
        let erased = handle.clone_erased();

        assert_eq!(erased.name(), "blob");
        assert!(erased.clone_typed::<Other>().is_none());

        let typed = erased.into_typed::<Blob>().unwrap();
        assert!(typed == handle);
        assert_eq!(typed.0, 4);
    }

    #[test]
    fn test_retain_is_shared_between_clones() {
        let (sender, receiver) = flume::unbounded();
        let allocator = HandleAllocator::new(sender);
        let handle = allocator.allocate("blob", Uuid::new_v4(), Blob(1));
        let erased = handle.clone_erased();

        erased.add_ref();
        assert_eq!(handle.ref_count(), 1);
        handle.dec_ref();

        assert_eq!(receiver.try_recv().unwrap(), RefMessage::Unload(handle.id()));
    }
}
