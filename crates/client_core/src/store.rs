use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

const STORE_CHANGE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("state store has been closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange<K, V> {
    pub key: K,
    pub value: V,
}

/// Shared client state addressed by key.
///
/// `get` and `set` are synchronous and must not suspend.
pub trait StateStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: &K, value: V) -> Result<(), StoreError>;
    fn subscribe(&self) -> broadcast::Receiver<StoreChange<K, V>>;
}

pub struct MemoryStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
    closed: AtomicBool,
    changes: broadcast::Sender<StoreChange<K, V>>,
}

impl<K, V> MemoryStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + Debug + Send + Sync,
{
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty())
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let (changes, _) = broadcast::channel(STORE_CHANGE_CAPACITY);
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
            closed: AtomicBool::new(false),
            changes,
        }
    }

    /// Tears the store down. Later writes are refused with [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, V> Default for MemoryStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + Debug + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> StateStore<K, V> for MemoryStore<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    V: Clone + Debug + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &K, value: V) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        self.write().insert(key.clone(), value.clone());
        if self
            .changes
            .send(StoreChange {
                key: key.clone(),
                value,
            })
            .is_err()
        {
            debug!(?key, "store change had no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange<K, V>> {
        self.changes.subscribe()
    }
}
