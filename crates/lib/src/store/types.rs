use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lock::StoreLockError;
use crate::manifest::{Manifest, ResourceKey};

/// Exact-match label selector. An empty selector matches everything.
pub type LabelSelector = BTreeMap<String, String>;

/// Opaque optimistic-concurrency token. Every successful write bumps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl fmt::Display for ResourceVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A manifest as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResource {
  pub resource_version: ResourceVersion,
  pub manifest: Manifest,
}

impl StoredResource {
  pub fn key(&self) -> ResourceKey {
    self.manifest.key()
  }

  pub fn uid(&self) -> Option<&str> {
    self.manifest.metadata.uid.as_deref()
  }
}

/// Whether every selector entry is present on `labels` with the same value.
pub fn matches_selector(labels: &BTreeMap<String, String>, selector: &LabelSelector) -> bool {
  selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("not found: {key}")]
  NotFound { key: ResourceKey },

  #[error("already exists: {key}")]
  AlreadyExists { key: ResourceKey },

  #[error("version conflict on {key}: expected {expected}, found {actual}")]
  VersionConflict {
    key: ResourceKey,
    expected: ResourceVersion,
    actual: ResourceVersion,
  },

  #[error("{key} cannot be stored: {reason}")]
  InvalidKey { key: ResourceKey, reason: &'static str },

  #[error("store unavailable: {message}")]
  Unavailable { message: String },

  #[error("corrupt object at {path}: {message}")]
  Corrupt { path: PathBuf, message: String },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Lock(StoreLockError),
}

impl StoreError {
  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::Unavailable {
      message: message.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }

  pub fn is_already_exists(&self) -> bool {
    matches!(self, Self::AlreadyExists { .. })
  }

  pub fn is_version_conflict(&self) -> bool {
    matches!(self, Self::VersionConflict { .. })
  }

  /// Transient errors: retrying the same operation later may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::VersionConflict { .. } | Self::Unavailable { .. })
  }
}

impl From<StoreLockError> for StoreError {
  fn from(err: StoreLockError) -> Self {
    if err.is_contention() {
      StoreError::Unavailable {
        message: err.to_string(),
      }
    } else {
      StoreError::Lock(err)
    }
  }
}
