//! Concurrent resource store.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::allocator::IdAllocator;

/// A stored resource. `id` is fixed at creation; only `name` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub name: String,
}

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("resource {0} not found")]
    NotFound(u64),
}

/// A thread-safe resource collection keyed by allocated id.
///
/// Cloning yields another handle to the same collection.
#[derive(Clone, Default)]
pub struct ResourceStore {
    inner: Arc<DashMap<u64, Resource>>,
    ids: Arc<IdAllocator>,
}

impl ResourceStore {
    /// Create an empty store with a fresh allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store drawing ids from `ids`.
    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ids: Arc::new(ids),
        }
    }

    /// Insert a new resource under a freshly allocated id.
    pub fn create(&self, name: impl Into<String>) -> Resource {
        let resource = Resource {
            id: self.ids.next(),
            name: name.into(),
        };
        self.inner.insert(resource.id, resource.clone());
        tracing::debug!(id = resource.id, "resource created");
        resource
    }

    /// Fetch a resource by id.
    pub fn get(&self, id: u64) -> Result<Resource, StoreError> {
        self.inner
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// All resources, ordered by id.
    ///
    /// Each entry is read under its shard lock, so a concurrent update is
    /// seen either entirely or not at all and never duplicates an entry.
    pub fn list(&self) -> Vec<Resource> {
        let mut items: Vec<Resource> = self.inner.iter().map(|r| r.value().clone()).collect();
        items.sort_unstable_by_key(|r| r.id);
        items
    }

    /// Replace the name of an existing resource.
    ///
    /// The presence check and the write happen under the same shard lock,
    /// so an update can never resurrect an id removed by a racing delete.
    pub fn update(&self, id: u64, name: impl Into<String>) -> Result<Resource, StoreError> {
        let mut entry = self.inner.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.name = name.into();
        tracing::debug!(id, "resource updated");
        Ok(entry.clone())
    }

    /// Remove a resource. Deleting an absent id reports `NotFound`.
    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        match self.inner.remove(&id) {
            Some(_) => {
                tracing::debug!(id, "resource deleted");
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
