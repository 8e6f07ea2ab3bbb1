//! Thread-safe handle over a [`MemoryStore`].
//!
//! One mutation is in flight at a time (write lock held for the whole
//! operation); readers copy results out under the read lock and therefore
//! only ever observe complete pre- or post-mutation states.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::action::ActionTag;
use crate::error::MemoryResult;
use crate::message::Message;
use crate::store::{MemoryStats, MemoryStore};

/// Cloneable, shareable memory for an agent session.
#[derive(Debug, Clone, Default)]
pub struct SharedMemory {
    inner: Arc<RwLock<MemoryStore>>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: MemoryStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn add(&self, message: Message) -> bool {
        self.inner.write().add(message)
    }

    pub fn add_batch(&self, messages: impl IntoIterator<Item = Message>) -> usize {
        self.inner.write().add_batch(messages)
    }

    pub fn get_by_role(&self, role: &str) -> Vec<Arc<Message>> {
        self.inner.read().get_by_role(role)
    }

    pub fn get_by_content_substring(&self, needle: &str) -> Vec<Arc<Message>> {
        self.inner.read().get_by_content_substring(needle)
    }

    pub fn try_remember(&self, keyword: &str) -> Vec<Arc<Message>> {
        self.inner.read().try_remember(keyword)
    }

    pub fn get_by_action(&self, tag: &ActionTag) -> Vec<Arc<Message>> {
        self.inner.read().get_by_action(tag)
    }

    pub fn get_by_actions<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a ActionTag>,
    ) -> Vec<Arc<Message>> {
        self.inner.read().get_by_actions(tags)
    }

    /// See [`MemoryStore::get_recent`]: `k == 0` returns everything.
    pub fn get_recent(&self, k: usize) -> Vec<Arc<Message>> {
        self.inner.read().get_recent(k)
    }

    pub fn find_new(&self, observed: &[Message], k: usize) -> Vec<Message> {
        self.inner.read().find_new(observed, k)
    }

    pub fn delete_newest(&self) -> Option<Message> {
        self.inner.write().delete_newest()
    }

    pub fn delete(&self, message: &Message) -> MemoryResult<()> {
        self.inner.write().delete(message)
    }

    pub fn clear(&self) {
        self.inner.write().clear()
    }

    pub fn count(&self) -> usize {
        self.inner.read().count()
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner.read().stats()
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> MemoryStore {
        self.inner.read().clone()
    }

    /// Run `f` against a consistent view of the store.
    pub fn with_read<R>(&self, f: impl FnOnce(&MemoryStore) -> R) -> R {
        f(&self.inner.read())
    }

    /// Swap in a new store (e.g. one just loaded from a snapshot).
    pub fn replace(&self, store: MemoryStore) -> MemoryStore {
        std::mem::replace(&mut *self.inner.write(), store)
    }
}

impl From<MemoryStore> for SharedMemory {
    fn from(store: MemoryStore) -> Self {
        Self::from_store(store)
    }
}
