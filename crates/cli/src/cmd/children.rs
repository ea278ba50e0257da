//! Implementation of the `ctlplane children` command.

use anyhow::{Context, Result};
use serde::Serialize;

use ctlplane_lib::manifest::ResourceKey;
use ctlplane_lib::ownership::children;
use ctlplane_lib::parent::ParentKey;
use ctlplane_lib::store::ResourceVersion;

use super::{ParentKind, load_owner, open_store, runtime};
use crate::GlobalPaths;
use crate::output::{self, OutputFormat, print_info, print_json, print_stat, print_success};

#[derive(Debug, Serialize)]
struct Child {
  key: ResourceKey,
  uid: Option<String>,
  resource_version: ResourceVersion,
}

pub fn cmd_children(key: &ParentKey, kind: ParentKind, paths: &GlobalPaths, output: OutputFormat) -> Result<()> {
  let store = open_store(paths);

  let rt = runtime()?;
  let found = rt.block_on(async {
    let Some(owner) = load_owner(&store, key, kind).await? else {
      return anyhow::Ok(None);
    };
    let objects = children(&store, &owner)
      .await
      .with_context(|| format!("Failed to list children of {}", key))?;
    anyhow::Ok(Some(objects))
  })?;

  let Some(objects) = found else {
    if output.is_json() {
      return print_json(&Vec::<Child>::new());
    }
    print_info(&format!("{} {} not found", kind.kind(), key));
    return Ok(());
  };

  let listed: Vec<Child> = objects
    .iter()
    .map(|object| Child {
      key: object.key(),
      uid: object.uid().map(str::to_string),
      resource_version: object.resource_version,
    })
    .collect();

  if output.is_json() {
    return print_json(&listed);
  }

  print_success(&format!("{} {} owns {} object(s)", kind.kind(), key, listed.len()));
  for child in &listed {
    println!("  {} {}", output::symbols::INFO, child.key);
  }
  if !listed.is_empty() {
    println!();
  }
  print_stat("Total", &listed.len().to_string());

  Ok(())
}
