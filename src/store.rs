use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The local key-value engine a node serves from.
///
/// Keys are composite keys (see [`crate::key`]); values are opaque.
pub trait Storage: Send {
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    fn set(&mut self, key: Bytes, value: Bytes);

    fn del(&mut self, key: &[u8]);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Visits every entry whose key starts with `prefix`, ascending by key when `ordered` is set.
    /// Iteration stops as soon as `visit` returns `false`.
    fn for_each(&self, prefix: &[u8], ordered: bool, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`Storage`] kept in key order, so every prefix scan is ordered.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<Bytes, Bytes>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Bytes, value: Bytes) {
        self.entries.insert(key, value);
    }

    fn del(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    fn for_each(&self, prefix: &[u8], _ordered: bool, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool) {
        let range = self
            .entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));

        for (key, value) in range {
            if !key.starts_with(prefix) || !visit(key, value) {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Shared handle to a node's storage engine.
///
/// Every command holds [`Store::lock`] for its whole read-modify-write sequence, which makes the
/// node single-writer. The handle is cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Box<dyn Storage>>>,
}

impl Store {
    pub fn new(storage: impl Storage + 'static) -> Store {
        Store {
            inner: Arc::new(Mutex::new(Box::new(storage))),
        }
    }

    pub fn memory() -> Store {
        Store::new(MemoryStorage::new())
    }

    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Storage>> {
        // A panicking handler cannot leave an entry half-written, so the data is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::memory()
    }
}
