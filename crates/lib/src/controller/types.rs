use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::apply::ApplyOptions;
use crate::consts::DEFAULT_TEMPLATE_ROOT;
use crate::manifest::ResourceKey;
use crate::parent::ParentError;
use crate::pipeline::{ApplySummary, PipelineError};
use crate::render::{Component, RenderError};
use crate::store::StoreError;
use crate::util::hash::{HashError, ObjectHash};

/// Settings shared by every reconcile a controller runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
  /// Directory holding one template directory per component.
  pub template_root: PathBuf,
  /// Components to expand, in order.
  pub components: Vec<Component>,
  pub apply: ApplyOptions,
}

impl ReconcilerConfig {
  pub fn new(template_root: impl Into<PathBuf>) -> Self {
    Self {
      template_root: template_root.into(),
      ..Self::default()
    }
  }

  pub fn with_components(mut self, components: impl Into<Vec<Component>>) -> Self {
    self.components = components.into();
    self
  }

  pub fn with_conflict_retries(mut self, retries: u32) -> Self {
    self.apply.conflict_retries = retries;
    self
  }
}

impl Default for ReconcilerConfig {
  fn default() -> Self {
    Self {
      template_root: PathBuf::from(DEFAULT_TEMPLATE_ROOT),
      components: Component::ALL.to_vec(),
      apply: ApplyOptions::default(),
    }
  }
}

/// Result of one successful reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
  /// False when the parent no longer exists; nothing was done.
  pub parent_found: bool,
  /// Always `None`: the trigger re-invokes reconcile on the next change.
  pub requeue_after: Option<Duration>,
  pub summary: ApplySummary,
  /// Short hash of the defaulted parent spec.
  pub spec_hash: Option<ObjectHash>,
}

impl ReconcileOutcome {
  pub fn parent_missing() -> Self {
    Self {
      parent_found: false,
      requeue_after: None,
      summary: ApplySummary::default(),
      spec_hash: None,
    }
  }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("failed to load {key}: {source}")]
  Load {
    key: ResourceKey,
    #[source]
    source: StoreError,
  },

  #[error("invalid parent: {0}")]
  InvalidParent(#[from] ParentError),

  #[error("render failed: {0}")]
  Render(#[from] RenderError),

  #[error("failed to hash parent spec: {0}")]
  Hash(#[from] HashError),

  #[error("apply failed: {0}")]
  Apply(#[from] PipelineError),
}

impl ReconcileError {
  /// Whether the caller should reconcile this key again later.
  ///
  /// Render and parent errors need a change to the parent or the templates
  /// before a retry can succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      ReconcileError::Load { source, .. } => source.is_retryable(),
      ReconcileError::InvalidParent(_) | ReconcileError::Render(_) | ReconcileError::Hash(_) => false,
      ReconcileError::Apply(err) => err.source.is_retryable(),
    }
  }

  /// Manifests applied before the failure, if it happened during apply.
  pub fn applied(&self) -> Option<&ApplySummary> {
    match self {
      ReconcileError::Apply(err) => Some(&err.applied),
      _ => None,
    }
  }
}
