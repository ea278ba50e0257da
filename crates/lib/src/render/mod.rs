//! Template expansion.
//!
//! A component's templates live in one directory. [`render_dir`] visits every
//! `*.yaml`, `*.yml` and `*.json` file below it in sorted path order,
//! substitutes the render context into it (see [`crate::placeholder`]), and
//! parses the result as one or more `---`-separated documents. Each
//! non-empty document must be a manifest.
//!
//! Rendering is a pure function of the directory contents and the context.

mod component;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub use component::Component;

use crate::context::RenderContext;
use crate::manifest::{Manifest, ManifestError, ResourceKey};
use crate::placeholder::{self, PlaceholderError};
use crate::util::hash::hash_directory;

const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("template directory not found: {}", path.display())]
  DirectoryNotFound { path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("template error in {}: {source}", path.display())]
  Template {
    path: PathBuf,
    #[source]
    source: PlaceholderError,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("document {index} of {} is not a valid manifest: {source}", path.display())]
  InvalidManifest {
    path: PathBuf,
    index: usize,
    #[source]
    source: ManifestError,
  },

  #[error("{key} is rendered more than once")]
  Duplicate { key: ResourceKey },
}

/// Render every template below `dir` against `ctx`.
pub fn render_dir(dir: &Path, ctx: &RenderContext) -> Result<Vec<Manifest>, RenderError> {
  if !dir.is_dir() {
    return Err(RenderError::DirectoryNotFound { path: dir.to_path_buf() });
  }

  let mut manifests = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|e| RenderError::Io {
      path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
      source: e.into(),
    })?;
    if !entry.file_type().is_file() || !is_template(entry.path()) {
      continue;
    }

    let rendered = render_file(entry.path(), ctx)?;
    debug!(file = %entry.path().display(), documents = rendered.len(), "rendered template");
    manifests.extend(rendered);
  }

  Ok(manifests)
}

fn is_template(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

/// Render one template file into zero or more manifests.
pub fn render_file(path: &Path, ctx: &RenderContext) -> Result<Vec<Manifest>, RenderError> {
  let source = fs::read_to_string(path).map_err(|source| RenderError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let text = placeholder::substitute(&source, ctx).map_err(|source| RenderError::Template {
    path: path.to_path_buf(),
    source,
  })?;

  let mut manifests = Vec::new();
  for (index, document) in serde_yaml::Deserializer::from_str(&text).enumerate() {
    let value = Value::deserialize(document).map_err(|source| RenderError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    if value.is_null() {
      continue;
    }

    let manifest = Manifest::try_from(value).map_err(|source| RenderError::InvalidManifest {
      path: path.to_path_buf(),
      index,
      source,
    })?;
    manifests.push(manifest);
  }

  Ok(manifests)
}

/// Produces the manifests of one component.
pub trait Renderer: Send + Sync {
  fn render(&self, component: Component, ctx: &RenderContext) -> Result<Vec<Manifest>, RenderError>;
}

/// Renders `<root>/<component>/` with [`render_dir`].
#[derive(Debug, Clone)]
pub struct DirRenderer {
  root: PathBuf,
}

impl DirRenderer {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn component_dir(&self, component: Component) -> PathBuf {
    self.root.join(component.dir_name())
  }
}

impl Renderer for DirRenderer {
  fn render(&self, component: Component, ctx: &RenderContext) -> Result<Vec<Manifest>, RenderError> {
    let dir = self.component_dir(component);
    if dir.is_dir() {
      match hash_directory(&dir) {
        Ok(digest) => debug!(%component, templates = %digest, "rendering component"),
        Err(e) => warn!(%component, error = %e, "could not digest template directory"),
      }
    }
    render_dir(&dir, ctx)
  }
}
