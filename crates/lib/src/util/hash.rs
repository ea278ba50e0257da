//! Fingerprinting for drift detection and diagnostics.
//!
//! This module provides:
//! - `fingerprint()`: full SHA-256 of a value's canonical JSON form
//! - `Hashable`: truncated 20-character hashes for display
//! - `hash_directory()`: deterministic digest of a template directory
//! - `hash_file()` / `hash_bytes()`: building blocks for the above
//!
//! None of this is a security control. The digests only need to be stable
//! and unlikely to collide so that "nothing changed" can be decided without a
//! deep structural comparison.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A short hash used when printing or logging objects.
///
/// The hash is the first 20 hex characters of the SHA-256 of the
/// JSON-serialized value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let full = fingerprint(self)?;
    Ok(ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Fingerprint an arbitrary serializable value.
///
/// The value is first converted to a `serde_json::Value`, whose maps are
/// ordered by key, so two values that are equal as JSON always produce the
/// same digest regardless of the field order of their Rust types.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<ContentHash, HashError> {
  let canonical = serde_json::to_value(value)?;
  let serialized = serde_json::to_vec(&canonical)?;
  Ok(hash_bytes(&serialized))
}

/// Error during directory hashing.
#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

/// Compute a deterministic digest of a directory's file contents.
///
/// File contents and relative paths are included, metadata is not. Entries
/// are sorted by path.
pub fn hash_directory(path: &Path) -> Result<ContentHash, DirHashError> {
  let mut entries: Vec<(String, String)> = Vec::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|e| DirHashError::WalkDir { message: e.to_string() })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let entry_path = entry.path();
    let rel_path = entry_path
      .strip_prefix(path)
      .unwrap_or(entry_path)
      .to_string_lossy()
      .to_string();
    let content_hash = hash_file(entry_path)?;
    entries.push((rel_path.clone(), format!("F:{}:{}", rel_path, content_hash.0)));
  }

  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut hasher = Sha256::new();
  for (_, entry_hash) in entries {
    hasher.update(entry_hash.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let mut file = fs::File::open(path).map_err(|e| DirHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| DirHashError::ReadFile {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}
