use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::*;

/// Explicit retain count of a loaded asset.
///
/// Unlike an `Arc` strong count, cloning a handle that points at this counter does
/// not retain the asset; holders opt in with [`RefCounter::add_ref`]. Releasing the
/// last retain reports [`RefMessage::Unload`] to whoever owns the asset storage.
pub struct RefCounter {
    id: usize,
    count: AtomicUsize,
    sender: Option<flume::Sender<RefMessage>>,
}

impl RefCounter {
    pub fn new(id: usize, sender: Option<flume::Sender<RefMessage>>) -> Self {
        Self {
            id,
            count: AtomicUsize::new(0),
            sender,
        }
    }
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn ref_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
    /// Returns the count after incrementing
    pub fn add_ref(&self) -> usize {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }
    /// Returns the count after decrementing. Releasing an unretained asset is
    /// logged and leaves the count at zero.
    pub fn dec_ref(&self) -> usize {
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });

        match previous {
            Ok(1) => {
                if let Some(sender) = &self.sender {
                    if sender.send(RefMessage::Unload(self.id)).is_err() {
                        log::debug!("Asset {} released after its storage went away", self.id);
                    }
                }
                0
            }
            Ok(previous) => previous - 1,
            Err(_) => {
                log::warn!("Asset {} released more often than it was retained", self.id);
                0
            }
        }
    }
}

impl std::fmt::Debug for RefCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefCounter")
            .field("id", &self.id)
            .field("count", &self.ref_count())
            .finish()
    }
}
