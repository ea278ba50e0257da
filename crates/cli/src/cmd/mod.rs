mod children;
mod delete;
mod gc;
mod reconcile;
mod render;
mod submit;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tokio::runtime::Runtime;

use ctlplane_lib::context::RenderContext;
use ctlplane_lib::manifest::Manifest;
use ctlplane_lib::ownership::OwnerIdentity;
use ctlplane_lib::parent::{ControlPlane, OpenStackClient, Parent, ParentKey};
use ctlplane_lib::render::render_file;
use ctlplane_lib::store::{FileStore, ResourceStore};

use crate::GlobalPaths;

pub use children::cmd_children;
pub use delete::cmd_delete;
pub use gc::cmd_gc;
pub use reconcile::cmd_reconcile;
pub use render::cmd_render;
pub use submit::cmd_submit;

/// The parent kinds the CLI can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParentKind {
  #[value(name = "controlplane")]
  ControlPlane,
  #[value(name = "openstackclient")]
  OpenStackClient,
}

impl ParentKind {
  pub fn kind(self) -> &'static str {
    match self {
      ParentKind::ControlPlane => ControlPlane::KIND,
      ParentKind::OpenStackClient => OpenStackClient::KIND,
    }
  }
}

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}

fn open_store(paths: &GlobalPaths) -> FileStore {
  FileStore::new(&paths.store)
}

/// Read every document in a parent file.
///
/// Parent files are plain documents; they go through the template parser
/// with an empty context, so any placeholder in them is an error.
fn read_documents(file: &Path) -> Result<Vec<Manifest>> {
  if !fs::metadata(file).is_ok_and(|m| m.is_file()) {
    anyhow::bail!("File not found: {}", file.display());
  }
  let documents =
    render_file(file, &RenderContext::new()).with_context(|| format!("Failed to read {}", file.display()))?;
  if documents.is_empty() {
    anyhow::bail!("No documents in {}", file.display());
  }
  Ok(documents)
}

/// Ownership identity of a stored parent, or `None` if it does not exist.
async fn load_owner(store: &FileStore, key: &ParentKey, kind: ParentKind) -> Result<Option<OwnerIdentity>> {
  let resource_key = key.resource_key(kind.kind());
  let Some(stored) = store
    .get(&resource_key)
    .await
    .with_context(|| format!("Failed to load {}", resource_key))?
  else {
    return Ok(None);
  };

  let owner = match kind {
    ParentKind::ControlPlane => ControlPlane::from_manifest(&stored.manifest)?.owner()?,
    ParentKind::OpenStackClient => OpenStackClient::from_manifest(&stored.manifest)?.owner()?,
  };
  Ok(Some(owner))
}
