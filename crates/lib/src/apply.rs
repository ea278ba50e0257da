//! Idempotent create-or-update of a single manifest.
//!
//! 1. Fetch the stored object by key
//! 2. Absent: create it (a concurrent create sends us back to step 1)
//! 3. Present: overlay our owned fields on the stored copy; if the result
//!    fingerprints the same as the stored copy, stop without writing
//! 4. Otherwise update against the fetched resource version; a version
//!    conflict sends us back to step 1, a bounded number of times
//!
//! Fields written by other actors (status, server-assigned defaults) survive
//! because the update payload starts from the stored copy.
//!
//! Children go through [`apply_manifest`], which merges into the stored spec.
//! Parents go through [`apply_parent`], which replaces it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::DEFAULT_CONFLICT_RETRIES;
use crate::manifest::{Manifest, ResourceKey};
use crate::store::{ResourceStore, StoreError};
use crate::util::hash::{HashError, fingerprint};

/// Tuning for [`apply_manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplyOptions {
  /// How many times a version conflict (or a concurrent create) restarts the
  /// protocol before giving up.
  pub conflict_retries: u32,
}

impl Default for ApplyOptions {
  fn default() -> Self {
    Self {
      conflict_retries: DEFAULT_CONFLICT_RETRIES,
    }
  }
}

/// What [`apply_manifest`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyOutcome {
  Created,
  Updated,
  Unchanged,
}

impl ApplyOutcome {
  pub fn is_write(self) -> bool {
    !matches!(self, ApplyOutcome::Unchanged)
  }
}

impl fmt::Display for ApplyOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ApplyOutcome::Created => "created",
      ApplyOutcome::Updated => "updated",
      ApplyOutcome::Unchanged => "unchanged",
    })
  }
}

#[derive(Debug, Error)]
pub enum ApplyError {
  #[error("{key}: still conflicting after {retries} retries")]
  ConflictRetriesExhausted {
    key: ResourceKey,
    retries: u32,
    #[source]
    source: StoreError,
  },

  #[error("{key} was deleted while being updated")]
  Vanished { key: ResourceKey },

  #[error("failed to fingerprint {key}: {source}")]
  Fingerprint {
    key: ResourceKey,
    #[source]
    source: HashError,
  },

  #[error("store error on {key}: {source}")]
  Store {
    key: ResourceKey,
    #[source]
    source: StoreError,
  },
}

impl ApplyError {
  pub fn key(&self) -> &ResourceKey {
    match self {
      ApplyError::ConflictRetriesExhausted { key, .. }
      | ApplyError::Vanished { key }
      | ApplyError::Fingerprint { key, .. }
      | ApplyError::Store { key, .. } => key,
    }
  }

  /// Whether a later reconcile may succeed without any input changing.
  pub fn is_retryable(&self) -> bool {
    match self {
      ApplyError::ConflictRetriesExhausted { .. } | ApplyError::Vanished { .. } => true,
      ApplyError::Fingerprint { .. } => false,
      ApplyError::Store { source, .. } => source.is_retryable(),
    }
  }
}

/// Bring the stored copy of `manifest` in line with it.
pub async fn apply_manifest<S>(store: &S, manifest: &Manifest, options: &ApplyOptions) -> Result<ApplyOutcome, ApplyError>
where
  S: ResourceStore + ?Sized,
{
  apply_with(store, manifest, options, Manifest::merge_owned).await
}

/// Store a parent object, replacing its stored `spec` with the submitted one.
///
/// A section dropped from the submitted parent is dropped from the store, so
/// the next reconcile renders its defaults.
pub async fn apply_parent<S>(store: &S, manifest: &Manifest, options: &ApplyOptions) -> Result<ApplyOutcome, ApplyError>
where
  S: ResourceStore + ?Sized,
{
  apply_with(store, manifest, options, Manifest::replace_owned).await
}

async fn apply_with<S>(
  store: &S,
  manifest: &Manifest,
  options: &ApplyOptions,
  overlay: fn(&Manifest, &Manifest) -> Manifest,
) -> Result<ApplyOutcome, ApplyError>
where
  S: ResourceStore + ?Sized,
{
  let key = manifest.key();
  let store_err = |source| ApplyError::Store {
    key: key.clone(),
    source,
  };
  let fingerprint_err = |source| ApplyError::Fingerprint {
    key: key.clone(),
    source,
  };

  let mut retries = 0;
  loop {
    let Some(current) = store.get(&key).await.map_err(store_err)? else {
      match store.create(manifest).await {
        Ok(_) => {
          debug!(key = %key, outcome = %ApplyOutcome::Created, "applied");
          return Ok(ApplyOutcome::Created);
        }
        Err(e) if e.is_already_exists() && retries < options.conflict_retries => {
          retries += 1;
          warn!(key = %key, retries, "created concurrently, retrying as update");
          continue;
        }
        Err(e) if e.is_already_exists() => {
          return Err(ApplyError::ConflictRetriesExhausted {
            key: key.clone(),
            retries,
            source: e,
          });
        }
        Err(e) => return Err(store_err(e)),
      }
    };

    let merged = overlay(&current.manifest, manifest);
    let before = fingerprint(&current.manifest).map_err(fingerprint_err)?;
    let after = fingerprint(&merged).map_err(fingerprint_err)?;
    if before == after {
      debug!(key = %key, outcome = %ApplyOutcome::Unchanged, "applied");
      return Ok(ApplyOutcome::Unchanged);
    }

    match store.update(&merged, current.resource_version).await {
      Ok(_) => {
        debug!(key = %key, outcome = %ApplyOutcome::Updated, version = %current.resource_version, "applied");
        return Ok(ApplyOutcome::Updated);
      }
      Err(e) if e.is_version_conflict() && retries < options.conflict_retries => {
        retries += 1;
        warn!(key = %key, retries, error = %e, "version conflict, retrying");
      }
      Err(e) if e.is_version_conflict() => {
        return Err(ApplyError::ConflictRetriesExhausted {
          key: key.clone(),
          retries,
          source: e,
        });
      }
      Err(e) if e.is_not_found() => return Err(ApplyError::Vanished { key: key.clone() }),
      Err(e) => return Err(store_err(e)),
    }
  }
}
