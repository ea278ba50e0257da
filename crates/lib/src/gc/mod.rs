//! Orphan collection.
//!
//! A child records its owner's uid in the ownership label and, when it lives
//! in the owner's namespace, in a controller owner reference. Once the owner
//! is deleted nothing else removes the child, so the collector does: every
//! object whose owner uid does not belong to any stored object is deleted.
//!
//! One pass removes one generation. Objects owned by a collected orphan are
//! picked up by the next run.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::manifest::ResourceKey;
use crate::ownership::owner_uid;
use crate::store::{LabelSelector, ResourceStore, StoreError, StoredResource};

#[derive(Debug, Error)]
pub enum GcError {
  #[error("failed to list store contents: {0}")]
  List(#[source] StoreError),

  #[error("failed to delete {key}: {source}")]
  Delete {
    key: ResourceKey,
    #[source]
    source: StoreError,
  },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GcStats {
  /// Objects examined.
  pub scanned: usize,
  /// Objects that carry an owner uid.
  pub owned: usize,
  /// Orphans deleted, or that would be deleted in a dry run.
  pub deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GcResult {
  pub stats: GcStats,
  pub deleted: Vec<ResourceKey>,
  pub dry_run: bool,
}

fn collect_live_uids(objects: &[StoredResource]) -> HashSet<&str> {
  let live: HashSet<&str> = objects.iter().filter_map(StoredResource::uid).collect();
  debug!(count = live.len(), "collected live uids");
  live
}

/// Delete every object whose owner is gone.
pub async fn collect_orphans<S>(store: &S, dry_run: bool) -> Result<GcResult, GcError>
where
  S: ResourceStore + ?Sized,
{
  let objects = store.list(&LabelSelector::new()).await.map_err(GcError::List)?;
  let live = collect_live_uids(&objects);

  let mut stats = GcStats::default();
  let mut deleted = Vec::new();

  for object in &objects {
    stats.scanned += 1;
    let Some(owner) = owner_uid(&object.manifest) else {
      continue;
    };
    stats.owned += 1;
    if live.contains(owner) {
      continue;
    }

    let key = object.key();
    debug!(key = %key, owner, "removing orphan");

    if !dry_run {
      match store.delete(&key).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
          debug!(key = %key, "orphan already gone");
          continue;
        }
        Err(source) => return Err(GcError::Delete { key, source }),
      }
    }

    stats.deleted += 1;
    deleted.push(key);
  }

  info!(
    scanned = stats.scanned,
    deleted = stats.deleted,
    dry_run,
    store = store.backend_name(),
    "orphan collection complete"
  );

  Ok(GcResult { stats, deleted, dry_run })
}
