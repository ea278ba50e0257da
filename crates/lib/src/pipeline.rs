//! Ordered apply pipeline.
//!
//! A reconcile first expands every component into a [`Pipeline`] of named
//! steps and only then starts writing. Application is strictly sequential in
//! accumulation order and stops at the first failure; the error reports
//! which manifests were already applied.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::apply::{ApplyError, ApplyOptions, ApplyOutcome, apply_manifest};
use crate::context::RenderContext;
use crate::manifest::{Manifest, ResourceKey};
use crate::ownership::{OwnerIdentity, tag};
use crate::render::{Component, RenderError, Renderer};
use crate::store::ResourceStore;

/// Manifests produced by one component, in render order.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  pub name: String,
  pub manifests: Vec<Manifest>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
  steps: Vec<Step>,
  keys: BTreeSet<ResourceKey>,
}

impl Pipeline {
  pub fn new() -> Self {
    Self::default()
  }

  /// Render `components` in order into a pipeline.
  pub fn expand<R>(renderer: &R, components: &[Component], ctx: &RenderContext) -> Result<Self, RenderError>
  where
    R: Renderer + ?Sized,
  {
    let mut pipeline = Self::new();
    for &component in components {
      let manifests = renderer.render(component, ctx)?;
      debug!(%component, count = manifests.len(), "expanded component");
      pipeline.push(component.dir_name(), manifests)?;
    }
    Ok(pipeline)
  }

  /// Append a step. A manifest whose key is already in the pipeline is an error.
  pub fn push(&mut self, name: impl Into<String>, manifests: Vec<Manifest>) -> Result<(), RenderError> {
    for manifest in &manifests {
      let key = manifest.key();
      if !self.keys.insert(key.clone()) {
        return Err(RenderError::Duplicate { key });
      }
    }
    self.steps.push(Step {
      name: name.into(),
      manifests,
    });
    Ok(())
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  /// Every manifest in apply order.
  pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
    self.steps.iter().flat_map(|step| step.manifests.iter())
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  /// Tag every manifest as owned by `owner`.
  pub fn tag(mut self, owner: &OwnerIdentity) -> Self {
    for step in &mut self.steps {
      step.manifests = std::mem::take(&mut step.manifests)
        .into_iter()
        .map(|manifest| tag(manifest, owner))
        .collect();
    }
    self
  }

  /// Apply every manifest in order, stopping at the first error.
  pub async fn apply<S>(&self, store: &S, options: &ApplyOptions) -> Result<ApplySummary, PipelineError>
  where
    S: ResourceStore + ?Sized,
  {
    let mut summary = ApplySummary::default();

    for step in &self.steps {
      for manifest in &step.manifests {
        match apply_manifest(store, manifest, options).await {
          Ok(outcome) => summary.record(manifest.key(), outcome),
          Err(source) => {
            error!(step = %step.name, key = %source.key(), error = %source, "apply failed");
            return Err(PipelineError {
              step: step.name.clone(),
              applied: summary,
              source,
            });
          }
        }
      }
      debug!(step = %step.name, "step applied");
    }

    info!(
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      "pipeline applied"
    );
    Ok(summary)
  }
}

/// One applied manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedResource {
  pub key: ResourceKey,
  pub outcome: ApplyOutcome,
}

/// What a pipeline run did, in apply order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
  pub created: usize,
  pub updated: usize,
  pub unchanged: usize,
  pub resources: Vec<AppliedResource>,
}

impl ApplySummary {
  fn record(&mut self, key: ResourceKey, outcome: ApplyOutcome) {
    match outcome {
      ApplyOutcome::Created => self.created += 1,
      ApplyOutcome::Updated => self.updated += 1,
      ApplyOutcome::Unchanged => self.unchanged += 1,
    }
    self.resources.push(AppliedResource { key, outcome });
  }

  /// Creates plus updates.
  pub fn writes(&self) -> usize {
    self.created + self.updated
  }
}

/// Apply stopped partway. `applied` is the prefix that went through.
#[derive(Debug, Error)]
#[error("step '{step}' failed: {source}")]
pub struct PipelineError {
  pub step: String,
  pub applied: ApplySummary,
  #[source]
  pub source: ApplyError,
}
