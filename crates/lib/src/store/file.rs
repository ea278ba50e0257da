use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;
use walkdir::WalkDir;

use super::lock::{LockMode, StoreLock};
use super::types::{LabelSelector, ResourceVersion, StoreError, StoredResource, matches_selector};
use super::ResourceStore;
use crate::consts::DEFAULT_LOCK_TIMEOUT;
use crate::manifest::{Manifest, ResourceKey};

const OBJECTS_DIR: &str = "objects";
const CLUSTER_DIR: &str = "_cluster";
const VERSION_FILENAME: &str = ".version";

/// Store backed by one JSON file per object.
///
/// Operations serialize on a store-wide lock held only for the operation
/// itself. Waiting for it is bounded by the lock timeout; past that the
/// operation fails with [`StoreError::Unavailable`].
#[derive(Debug, Clone)]
pub struct FileStore {
  root: PathBuf,
  lock_timeout: Duration,
}

impl FileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      lock_timeout: DEFAULT_LOCK_TIMEOUT,
    }
  }

  pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
    self.lock_timeout = timeout;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn objects_dir(&self) -> PathBuf {
    self.root.join(OBJECTS_DIR)
  }

  /// `<root>/objects/<kind>/<namespace|_cluster>/<name>.json`
  pub fn object_path(&self, key: &ResourceKey) -> Result<PathBuf, StoreError> {
    let invalid = |reason| StoreError::InvalidKey {
      key: key.clone(),
      reason,
    };

    for part in [Some(key.kind.as_str()), key.namespace.as_deref(), Some(key.name.as_str())]
      .into_iter()
      .flatten()
    {
      if part.is_empty() || part == "." || part == ".." {
        return Err(invalid("empty or relative path segment"));
      }
      if part.contains(['/', '\\']) {
        return Err(invalid("path separator in key"));
      }
    }
    if key.namespace.as_deref() == Some(CLUSTER_DIR) {
      return Err(invalid("reserved namespace"));
    }

    Ok(
      self
        .objects_dir()
        .join(&key.kind)
        .join(key.namespace.as_deref().unwrap_or(CLUSTER_DIR))
        .join(format!("{}.json", key.name)),
    )
  }

  fn lock(&self, mode: LockMode, operation: &str) -> Result<StoreLock, StoreError> {
    Ok(StoreLock::acquire_within(&self.root, mode, operation, self.lock_timeout)?)
  }

  fn read_object(&self, path: &Path) -> Result<Option<StoredResource>, StoreError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(StoreError::Io {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    serde_json::from_str(&content)
      .map(Some)
      .map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
      })
  }

  fn write_object(&self, path: &Path, stored: &StoredResource) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
      path: path.to_path_buf(),
      source,
    };

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = serde_json::to_string_pretty(stored).map_err(|e| io_err(io::Error::other(e)))?;
    atomic_write(path, content.as_bytes()).map_err(io_err)
  }

  /// Bump and persist the store-wide version counter. Caller holds the exclusive lock.
  fn next_version(&self) -> Result<ResourceVersion, StoreError> {
    let path = self.root.join(VERSION_FILENAME);
    let current = match fs::read_to_string(&path) {
      Ok(content) => content.trim().parse::<u64>().map_err(|e| StoreError::Corrupt {
        path: path.clone(),
        message: e.to_string(),
      })?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
      Err(source) => return Err(StoreError::Io { path, source }),
    };

    let next = current + 1;
    atomic_write(&path, next.to_string().as_bytes()).map_err(|source| StoreError::Io {
      path: path.clone(),
      source,
    })?;
    Ok(ResourceVersion(next))
  }

  fn get_blocking(&self, key: &ResourceKey) -> Result<Option<StoredResource>, StoreError> {
    let path = self.object_path(key)?;
    let _lock = self.lock(LockMode::Shared, "get")?;
    self.read_object(&path)
  }

  fn create_blocking(&self, manifest: &Manifest) -> Result<StoredResource, StoreError> {
    let key = manifest.key();
    let path = self.object_path(&key)?;
    let _lock = self.lock(LockMode::Exclusive, "create")?;

    if self.read_object(&path)?.is_some() {
      return Err(StoreError::AlreadyExists { key });
    }

    let mut manifest = manifest.clone();
    manifest.metadata.uid = Some(Uuid::new_v4().to_string());
    let stored = StoredResource {
      resource_version: self.next_version()?,
      manifest,
    };
    self.write_object(&path, &stored)?;

    trace!(key = %key, version = %stored.resource_version, "created");
    Ok(stored)
  }

  fn update_blocking(&self, manifest: &Manifest, expected: ResourceVersion) -> Result<StoredResource, StoreError> {
    let key = manifest.key();
    let path = self.object_path(&key)?;
    let _lock = self.lock(LockMode::Exclusive, "update")?;

    let current = self
      .read_object(&path)?
      .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
    if current.resource_version != expected {
      return Err(StoreError::VersionConflict {
        key,
        expected,
        actual: current.resource_version,
      });
    }

    let mut manifest = manifest.clone();
    manifest.metadata.uid = current.manifest.metadata.uid;
    let stored = StoredResource {
      resource_version: self.next_version()?,
      manifest,
    };
    self.write_object(&path, &stored)?;

    trace!(key = %key, version = %stored.resource_version, "updated");
    Ok(stored)
  }

  fn delete_blocking(&self, key: &ResourceKey) -> Result<(), StoreError> {
    let path = self.object_path(key)?;
    let _lock = self.lock(LockMode::Exclusive, "delete")?;

    match fs::remove_file(&path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound { key: key.clone() }),
      Err(source) => Err(StoreError::Io { path, source }),
    }
  }

  fn list_blocking(&self, selector: &LabelSelector) -> Result<Vec<StoredResource>, StoreError> {
    let objects_dir = self.objects_dir();
    let _lock = self.lock(LockMode::Shared, "list")?;

    if !objects_dir.exists() {
      return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(&objects_dir).sort_by_file_name() {
      let entry = entry.map_err(|e| StoreError::Io {
        path: objects_dir.clone(),
        source: e.into(),
      })?;
      let path = entry.path();
      if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
        continue;
      }

      if let Some(stored) = self.read_object(path)?
        && matches_selector(&stored.manifest.metadata.labels, selector)
      {
        found.push(stored);
      }
    }

    found.sort_by_key(|stored| stored.key());
    debug!(root = %self.root.display(), count = found.len(), "listed objects");
    Ok(found)
  }

  async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(FileStore) -> Result<T, StoreError> + Send + 'static,
  {
    let store = self.clone();
    tokio::task::spawn_blocking(move || op(store))
      .await
      .map_err(|e| StoreError::unavailable(format!("store task failed: {e}")))?
  }
}

/// Write to a sibling temp file, then rename over the target.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
  let mut temp = path.as_os_str().to_owned();
  temp.push(".tmp");
  let temp = PathBuf::from(temp);

  fs::write(&temp, content)?;
  fs::rename(&temp, path)
}

#[async_trait]
impl ResourceStore for FileStore {
  async fn get(&self, key: &ResourceKey) -> Result<Option<StoredResource>, StoreError> {
    let key = key.clone();
    self.run(move |store| store.get_blocking(&key)).await
  }

  async fn create(&self, manifest: &Manifest) -> Result<StoredResource, StoreError> {
    let manifest = manifest.clone();
    self.run(move |store| store.create_blocking(&manifest)).await
  }

  async fn update(&self, manifest: &Manifest, expected: ResourceVersion) -> Result<StoredResource, StoreError> {
    let manifest = manifest.clone();
    self.run(move |store| store.update_blocking(&manifest, expected)).await
  }

  async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
    let key = key.clone();
    self.run(move |store| store.delete_blocking(&key)).await
  }

  async fn list(&self, selector: &LabelSelector) -> Result<Vec<StoredResource>, StoreError> {
    let selector = selector.clone();
    self.run(move |store| store.list_blocking(&selector)).await
  }

  fn backend_name(&self) -> &'static str {
    "file"
  }
}
