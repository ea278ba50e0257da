//! Resource store abstraction.
//!
//! A store is a keyed object database with optimistic concurrency: every
//! object carries a [`ResourceVersion`], and an update only succeeds when the
//! caller presents the version it last read. The controller never holds a
//! lock across store calls; conflicting writers are detected here instead.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: in-process map, used by tests and dry runs
//! - [`FileStore`]: one JSON document per object on disk, used by the CLI
//!
//! # File store layout
//!
//! ```text
//! <root>/
//! ├── .lock
//! └── objects/
//!     └── <kind>/
//!         ├── <namespace>/<name>.json
//!         └── _cluster/<name>.json
//! ```

mod file;
mod lock;
mod memory;
mod types;

use async_trait::async_trait;

pub use file::FileStore;
pub use lock::{LockMetadata, LockMode, StoreLock, StoreLockError};
pub use memory::{MemoryStore, StoreStats};
pub use types::*;

use crate::manifest::{Manifest, ResourceKey};

/// Keyed create/read/update/delete/list with optimistic concurrency.
///
/// Implementations assign a uid on create and keep it across updates.
#[async_trait]
pub trait ResourceStore: Send + Sync {
  /// Fetch an object. A missing object is `Ok(None)`, not an error.
  async fn get(&self, key: &ResourceKey) -> Result<Option<StoredResource>, StoreError>;

  /// Create an object. Fails with [`StoreError::AlreadyExists`] if the key is taken.
  async fn create(&self, manifest: &Manifest) -> Result<StoredResource, StoreError>;

  /// Replace an object, provided it is still at `expected`.
  ///
  /// Fails with [`StoreError::VersionConflict`] when another writer got there
  /// first and with [`StoreError::NotFound`] when the object was deleted.
  async fn update(&self, manifest: &Manifest, expected: ResourceVersion) -> Result<StoredResource, StoreError>;

  /// Delete an object. Fails with [`StoreError::NotFound`] if it is absent.
  async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;

  /// Every object whose labels match `selector`, ordered by key.
  async fn list(&self, selector: &LabelSelector) -> Result<Vec<StoredResource>, StoreError>;

  /// Short backend name for logs.
  fn backend_name(&self) -> &'static str;
}
