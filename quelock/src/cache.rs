//! A string-keyed cache guarded by an [`RwLock`].
//!
//! Lookups take the read lock and may run concurrently; `put`, `remove` and
//! `clear` take the write lock. The cache is an ordinary value: create it
//! when the process starts, share it through an `Arc`, and drop it (or call
//! [`Cache::into_inner`]) when shutting down.

use crate::builder::SyncBuilder;
use crate::sync::{Lock, ReadLock, RwLock, WriteLock};

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;

/// A `String -> V` map guarded by a reader/writer lock.
///
/// # Examples
///
/// ```rust
/// use quelock::Cache;
///
/// let cache = Cache::new();
/// assert_eq!(cache.put("a".to_string(), 1), None);
/// assert_eq!(cache.put("a".to_string(), 2), Some(1));
/// assert_eq!(cache.get("a"), Some(2));
/// cache.clear();
/// assert!(cache.is_empty());
/// ```
pub struct Cache<V> {
    read: ReadLock,
    write: WriteLock,

    /// The mapping. Read only under `read`, written only under `write`.
    map: UnsafeCell<HashMap<String, V>>,
}

// Safety: the map is only reached through the lock halves, which give
// readers shared access and a writer exclusive access.
unsafe impl<V: Send> Send for Cache<V> {}
// Safety: readers clone through `&V` from several threads at once, so `V`
// must be `Sync`; values move in and out across threads, so `V` must be `Send`.
unsafe impl<V: Send + Sync> Sync for Cache<V> {}

impl<V> Cache<V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::with_builder(SyncBuilder::new())
    }

    /// Creates an empty cache whose lock uses a configured wait queue.
    pub fn with_builder(builder: SyncBuilder) -> Self {
        let lock = RwLock::with_builder(builder);

        Self {
            read: lock.read_lock(),
            write: lock.write_lock(),
            map: UnsafeCell::new(HashMap::new()),
        }
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let _guard = self.read.guard();
        unsafe { (*self.map.get()).get(key).cloned() }
    }

    /// Stores `value` under `key` and returns the previous value.
    pub fn put(&self, key: String, value: V) -> Option<V> {
        let _guard = self.write.guard();
        unsafe { (*self.map.get()).insert(key, value) }
    }

    /// Removes the value stored under `key` and returns it.
    pub fn remove(&self, key: &str) -> Option<V> {
        let _guard = self.write.guard();
        unsafe { (*self.map.get()).remove(key) }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let _guard = self.write.guard();
        unsafe { (*self.map.get()).clear() }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        let _guard = self.read.guard();
        unsafe { (*self.map.get()).len() }
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tears the cache down and returns its contents.
    pub fn into_inner(self) -> HashMap<String, V> {
        self.map.into_inner()
    }
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("len", &self.len()).finish()
    }
}
