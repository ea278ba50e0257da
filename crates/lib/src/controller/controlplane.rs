use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{ReconcileError, ReconcileOutcome, ReconcilerConfig};
use crate::context::{build_context, with_defaults};
use crate::parent::{ControlPlane, Parent, ParentKey};
use crate::pipeline::Pipeline;
use crate::render::{DirRenderer, Renderer};
use crate::store::ResourceStore;
use crate::util::hash::Hashable;

/// Drives the children of a [`ControlPlane`] toward its spec.
///
/// Reconciles of different keys may run concurrently; two reconciles of the
/// same key must not.
pub struct ControlPlaneReconciler<S: ?Sized, R = DirRenderer> {
  store: Arc<S>,
  renderer: R,
  config: ReconcilerConfig,
}

impl<S> ControlPlaneReconciler<S, DirRenderer>
where
  S: ResourceStore + ?Sized,
{
  /// Render from the template directories under `config.template_root`.
  pub fn new(store: Arc<S>, config: ReconcilerConfig) -> Self {
    let renderer = DirRenderer::new(&config.template_root);
    Self::with_renderer(store, renderer, config)
  }
}

impl<S, R> ControlPlaneReconciler<S, R>
where
  S: ResourceStore + ?Sized,
  R: Renderer,
{
  pub fn with_renderer(store: Arc<S>, renderer: R, config: ReconcilerConfig) -> Self {
    Self {
      store,
      renderer,
      config,
    }
  }

  pub fn config(&self) -> &ReconcilerConfig {
    &self.config
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Fetch and decode the parent. `None` when it does not exist.
  pub async fn load(&self, key: &ParentKey) -> Result<Option<ControlPlane>, ReconcileError> {
    let resource_key = key.resource_key(ControlPlane::KIND);
    let stored = self
      .store
      .get(&resource_key)
      .await
      .map_err(|source| ReconcileError::Load {
        key: resource_key,
        source,
      })?;

    Ok(stored.map(|s| ControlPlane::from_manifest(&s.manifest)).transpose()?)
  }

  /// Everything the parent should own, tagged and in apply order.
  pub fn plan(&self, parent: &ControlPlane) -> Result<Pipeline, ReconcileError> {
    let owner = parent.owner()?;
    let ctx = build_context(parent);
    let pipeline = Pipeline::expand(&self.renderer, &self.config.components, &ctx)?;
    Ok(pipeline.tag(&owner))
  }

  pub async fn reconcile(&self, key: &ParentKey) -> Result<ReconcileOutcome, ReconcileError> {
    info!(parent = %key, store = self.store.backend_name(), "reconciling control plane");

    let Some(parent) = self.load(key).await? else {
      info!(parent = %key, "control plane not found, nothing to do");
      return Ok(ReconcileOutcome::parent_missing());
    };

    let spec_hash = with_defaults(&parent.spec).compute_hash()?;
    debug!(parent = %key, spec = %spec_hash, "computed spec hash");

    let pipeline = self.plan(&parent)?;
    info!(
      parent = %key,
      steps = pipeline.steps().len(),
      manifests = pipeline.len(),
      "expanded pipeline"
    );

    let summary = pipeline.apply(&*self.store, &self.config.apply).await.inspect_err(|e| {
      warn!(parent = %key, applied = e.applied.resources.len(), error = %e, "reconcile stopped");
    })?;

    info!(
      parent = %key,
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      "control plane reconciled"
    );

    Ok(ReconcileOutcome {
      parent_found: true,
      requeue_after: None,
      summary,
      spec_hash: Some(spec_hash),
    })
  }
}
