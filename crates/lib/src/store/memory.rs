use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

use super::types::{LabelSelector, ResourceVersion, StoreError, StoredResource, matches_selector};
use super::ResourceStore;
use crate::manifest::{Manifest, ResourceKey};

/// Operation counters, for asserting how many writes a reconcile issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
  pub gets: u64,
  pub creates: u64,
  pub updates: u64,
  pub deletes: u64,
  pub lists: u64,
}

impl StoreStats {
  /// Successful creates plus updates.
  pub fn writes(&self) -> u64 {
    self.creates + self.updates
  }
}

#[derive(Default)]
struct Counters {
  gets: AtomicU64,
  creates: AtomicU64,
  updates: AtomicU64,
  deletes: AtomicU64,
  lists: AtomicU64,
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
  objects: RwLock<BTreeMap<ResourceKey, StoredResource>>,
  version: AtomicU64,
  counters: Counters,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_version(&self) -> ResourceVersion {
    ResourceVersion(self.version.fetch_add(1, Ordering::SeqCst) + 1)
  }

  /// Counts of successful operations so far.
  pub fn stats(&self) -> StoreStats {
    StoreStats {
      gets: self.counters.gets.load(Ordering::SeqCst),
      creates: self.counters.creates.load(Ordering::SeqCst),
      updates: self.counters.updates.load(Ordering::SeqCst),
      deletes: self.counters.deletes.load(Ordering::SeqCst),
      lists: self.counters.lists.load(Ordering::SeqCst),
    }
  }

  pub async fn len(&self) -> usize {
    self.objects.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.objects.read().await.is_empty()
  }
}

#[async_trait]
impl ResourceStore for MemoryStore {
  async fn get(&self, key: &ResourceKey) -> Result<Option<StoredResource>, StoreError> {
    let objects = self.objects.read().await;
    self.counters.gets.fetch_add(1, Ordering::SeqCst);
    Ok(objects.get(key).cloned())
  }

  async fn create(&self, manifest: &Manifest) -> Result<StoredResource, StoreError> {
    let key = manifest.key();
    let mut objects = self.objects.write().await;
    if objects.contains_key(&key) {
      return Err(StoreError::AlreadyExists { key });
    }

    let mut manifest = manifest.clone();
    manifest.metadata.uid = Some(Uuid::new_v4().to_string());
    let stored = StoredResource {
      resource_version: self.next_version(),
      manifest,
    };
    objects.insert(key, stored.clone());
    self.counters.creates.fetch_add(1, Ordering::SeqCst);

    trace!(key = %stored.key(), version = %stored.resource_version, "created");
    Ok(stored)
  }

  async fn update(&self, manifest: &Manifest, expected: ResourceVersion) -> Result<StoredResource, StoreError> {
    let key = manifest.key();
    let mut objects = self.objects.write().await;
    let current = objects.get(&key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
    if current.resource_version != expected {
      return Err(StoreError::VersionConflict {
        key,
        expected,
        actual: current.resource_version,
      });
    }

    let mut manifest = manifest.clone();
    manifest.metadata.uid = current.manifest.metadata.uid.clone();
    let stored = StoredResource {
      resource_version: self.next_version(),
      manifest,
    };
    objects.insert(key, stored.clone());
    self.counters.updates.fetch_add(1, Ordering::SeqCst);

    trace!(key = %stored.key(), version = %stored.resource_version, "updated");
    Ok(stored)
  }

  async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
    let mut objects = self.objects.write().await;
    objects.remove(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
    self.counters.deletes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn list(&self, selector: &LabelSelector) -> Result<Vec<StoredResource>, StoreError> {
    let objects = self.objects.read().await;
    self.counters.lists.fetch_add(1, Ordering::SeqCst);
    Ok(
      objects
        .values()
        .filter(|stored| matches_selector(&stored.manifest.metadata.labels, selector))
        .cloned()
        .collect(),
    )
  }

  fn backend_name(&self) -> &'static str {
    "memory"
  }
}
