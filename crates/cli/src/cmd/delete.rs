//! Implementation of the `ctlplane delete` command.
//!
//! Only the parent is removed. Its children stay until `ctlplane gc` finds
//! them without an owner.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use ctlplane_lib::parent::ParentKey;
use ctlplane_lib::store::ResourceStore;

use super::{ParentKind, open_store, runtime};
use crate::GlobalPaths;
use crate::output::{OutputFormat, print_info, print_json, print_success};

pub fn cmd_delete(key: &ParentKey, kind: ParentKind, paths: &GlobalPaths, output: OutputFormat) -> Result<()> {
  let store = open_store(paths);
  let resource_key = key.resource_key(kind.kind());

  let rt = runtime()?;
  let deleted = rt.block_on(async {
    match store.delete(&resource_key).await {
      Ok(()) => Ok(true),
      Err(e) if e.is_not_found() => Ok(false),
      Err(e) => Err(e),
    }
  });
  let deleted = deleted.with_context(|| format!("Failed to delete {}", resource_key))?;

  if deleted {
    info!(key = %resource_key, "deleted parent");
  }

  if output.is_json() {
    return print_json(&json!({ "key": resource_key, "deleted": deleted }));
  }

  if deleted {
    print_success(&format!("Deleted {}", resource_key));
    print_info("Run 'ctlplane gc' to remove its children");
  } else {
    print_info(&format!("{} not found, nothing to delete", resource_key));
  }

  Ok(())
}
