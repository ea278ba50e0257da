//! Implementation of the `ctlplane submit` command.
//!
//! Writes parent documents into the store. Existing parents are updated in
//! place and keep their uid, so their children stay attached. The submitted
//! spec replaces the stored one whole.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use ctlplane_lib::apply::{ApplyOptions, ApplyOutcome, apply_parent};
use ctlplane_lib::manifest::{Manifest, ResourceKey};
use ctlplane_lib::parent::{ControlPlane, OpenStackClient, Parent};

use super::{open_store, read_documents, runtime};
use crate::GlobalPaths;
use crate::output::{OutputFormat, print_json, print_outcome, print_success};

#[derive(Debug, Serialize)]
struct Submitted {
  key: ResourceKey,
  outcome: ApplyOutcome,
}

/// Decode the document as the parent its kind names, rejecting anything else.
fn check_parent(manifest: &Manifest) -> Result<()> {
  if manifest.kind == ControlPlane::KIND {
    ControlPlane::from_manifest(manifest)?;
  } else if manifest.kind == OpenStackClient::KIND {
    OpenStackClient::from_manifest(manifest)?;
  } else {
    bail!(
      "{}: unsupported kind '{}', expected {} or {}",
      manifest.key(),
      manifest.kind,
      ControlPlane::KIND,
      OpenStackClient::KIND
    );
  }
  Ok(())
}

pub fn cmd_submit(file: &Path, paths: &GlobalPaths, output: OutputFormat) -> Result<()> {
  let documents = read_documents(file)?;
  for document in &documents {
    check_parent(document)?;
  }

  let store = open_store(paths);
  let options = ApplyOptions::default();

  let rt = runtime()?;
  let submitted = rt.block_on(async {
    let mut submitted = Vec::with_capacity(documents.len());
    for document in &documents {
      let key = document.key();
      let outcome = apply_parent(&store, document, &options)
        .await
        .with_context(|| format!("Failed to submit {}", key))?;
      info!(key = %key, %outcome, "submitted parent");
      submitted.push(Submitted { key, outcome });
    }
    anyhow::Ok(submitted)
  })?;

  if output.is_json() {
    print_json(&submitted)?;
  } else {
    for item in &submitted {
      print_outcome(&item.key, item.outcome);
    }
    print_success(&format!("Submitted {} parent(s)", submitted.len()));
  }

  Ok(())
}
