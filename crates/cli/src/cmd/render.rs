//! Implementation of the `ctlplane render` command.
//!
//! Expands parent documents into the tagged manifests a reconcile would apply
//! and prints them. Nothing is read from or written to the store.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use ctlplane_lib::controller::{ControlPlaneReconciler, OpenStackClientReconciler, ReconcilerConfig};
use ctlplane_lib::manifest::Manifest;
use ctlplane_lib::parent::{ControlPlane, OpenStackClient, Parent};
use ctlplane_lib::pipeline::Pipeline;
use ctlplane_lib::store::MemoryStore;

use super::read_documents;
use crate::GlobalPaths;
use crate::output::{OutputFormat, print_json};

/// Stands in for the uid a parent only receives once it is stored.
const PREVIEW_UID: &str = "00000000-0000-0000-0000-000000000000";

fn plan(document: &Manifest, config: &ReconcilerConfig) -> Result<Pipeline> {
  let store = Arc::new(MemoryStore::new());
  let pipeline = if document.kind == ControlPlane::KIND {
    let parent = ControlPlane::from_manifest(document)?;
    ControlPlaneReconciler::new(store, config.clone()).plan(&parent)?
  } else if document.kind == OpenStackClient::KIND {
    let parent = OpenStackClient::from_manifest(document)?;
    OpenStackClientReconciler::new(store, config.apply).plan(&parent)?
  } else {
    bail!("{}: unsupported kind '{}'", document.key(), document.kind);
  };
  Ok(pipeline)
}

pub fn cmd_render(file: &Path, paths: &GlobalPaths, output: OutputFormat) -> Result<()> {
  let config = ReconcilerConfig::new(&paths.templates);

  let mut rendered = Vec::new();
  for mut document in read_documents(file)? {
    if document.metadata.uid.is_none() {
      debug!(key = %document.key(), "no uid, using a preview uid");
      document.metadata.uid = Some(PREVIEW_UID.to_string());
    }
    let key = document.key();
    let pipeline = plan(&document, &config).with_context(|| format!("Failed to render {}", key))?;
    rendered.extend(pipeline.manifests().cloned());
  }

  if output.is_json() {
    return print_json(&rendered);
  }

  for manifest in &rendered {
    let yaml = serde_yaml::to_string(manifest).context("Failed to serialize manifest")?;
    println!("---");
    print!("{}", yaml);
  }

  Ok(())
}
