//! Conflicts, outages and terminal failures.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use ctlplane_lib::apply::ApplyError;
use ctlplane_lib::controller::{ControlPlaneReconciler, ReconcileError, ReconcilerConfig};
use ctlplane_lib::manifest::{Manifest, ResourceKey};
use ctlplane_lib::parent::{ControlPlaneSpec, ParentKey, ReplicaSpec};
use ctlplane_lib::render::{Component, RenderError};
use ctlplane_lib::store::ResourceStore;

use super::common::{RecordingStore, Write, resubmit, scenario_spec, shipped_templates, submit};

const FIVE: [Component; 5] = [
  Component::Mariadb,
  Component::Interconnect,
  Component::Keystone,
  Component::Glance,
  Component::Placement,
];

fn key() -> ParentKey {
  ParentKey::new("openstack", "overcloud")
}

fn reconciler(store: &Arc<RecordingStore>) -> ControlPlaneReconciler<RecordingStore> {
  let config = ReconcilerConfig::new(shipped_templates()).with_components(FIVE);
  ControlPlaneReconciler::new(Arc::clone(store), config)
}

#[tokio::test]
async fn one_conflict_is_retried_with_a_single_write() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  let reconciler = reconciler(&store);
  reconciler.reconcile(&key()).await.unwrap();

  resubmit(
    &*store,
    &parent,
    ControlPlaneSpec {
      keystone: ReplicaSpec::new(2),
      ..scenario_spec()
    },
  )
  .await;
  store.clear_writes();
  let updates_before = store.inner.stats().updates;
  store.inject_conflicts(1);

  let outcome = reconciler.reconcile(&key()).await.unwrap();

  assert_eq!(outcome.summary.updated, 1);
  assert_eq!(store.inner.stats().updates - updates_before, 1);
  assert_eq!(
    store.writes(),
    [Write::Update(ResourceKey::namespaced("KeystoneAPI", "openstack", "keystone"))]
  );
}

#[tokio::test]
async fn persistent_conflicts_surface_as_retryable() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  let reconciler = reconciler(&store);
  reconciler.reconcile(&key()).await.unwrap();

  resubmit(
    &*store,
    &parent,
    ControlPlaneSpec {
      keystone: ReplicaSpec::new(2),
      ..scenario_spec()
    },
  )
  .await;
  store.inject_conflicts(5);

  let err = reconciler.reconcile(&key()).await.unwrap_err();
  assert!(err.is_retryable());
  let ReconcileError::Apply(failure) = &err else {
    panic!("expected an apply failure, got {err}");
  };
  assert!(matches!(failure.source, ApplyError::ConflictRetriesExhausted { .. }));
  assert_eq!(failure.step, "keystone");
}

#[tokio::test]
async fn outage_leaves_a_prefix_and_the_next_reconcile_finishes() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();
  store.fail_creates_after(Some(2));
  let reconciler = reconciler(&store);

  let err = reconciler.reconcile(&key()).await.unwrap_err();
  assert!(err.is_retryable());
  let applied = err.applied().unwrap();
  assert_eq!(applied.created, 2);
  let kinds: Vec<&str> = applied.resources.iter().map(|r| r.key.kind.as_str()).collect();
  assert_eq!(kinds, ["MariaDB", "Interconnect"]);

  store.fail_creates_after(None);
  let outcome = reconciler.reconcile(&key()).await.unwrap();
  assert_eq!(outcome.summary.unchanged, 2);
  assert_eq!(outcome.summary.created, 3);
  assert_eq!(store.writes().len(), 5);
}

#[tokio::test]
async fn missing_template_directory_is_terminal() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();
  let empty = TempDir::new().unwrap();

  let config = ReconcilerConfig::new(empty.path()).with_components(FIVE);
  let err = ControlPlaneReconciler::new(Arc::clone(&store), config)
    .reconcile(&key())
    .await
    .unwrap_err();

  assert!(matches!(err, ReconcileError::Render(RenderError::DirectoryNotFound { .. })));
  assert!(!err.is_retryable());
  assert!(store.writes().is_empty());
}

#[tokio::test]
async fn broken_template_stops_before_any_write() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();

  let templates = TempDir::new().unwrap();
  for component in FIVE {
    std::fs::create_dir_all(templates.path().join(component.dir_name())).unwrap();
  }
  std::fs::write(
    templates.path().join("placement").join("placement.yaml"),
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ .Unknown }}\n",
  )
  .unwrap();

  let config = ReconcilerConfig::new(templates.path()).with_components(FIVE);
  let err = ControlPlaneReconciler::new(Arc::clone(&store), config)
    .reconcile(&key())
    .await
    .unwrap_err();

  assert!(matches!(err, ReconcileError::Render(RenderError::Template { .. })));
  assert!(store.writes().is_empty());
}

#[tokio::test]
async fn invalid_parent_spec_is_terminal() {
  let store = Arc::new(RecordingStore::new());
  let parent = Manifest::try_from(json!({
    "apiVersion": "controlplane.openstack.org/v1beta1",
    "kind": "ControlPlane",
    "metadata": { "name": "overcloud", "namespace": "openstack" },
    "spec": { "glance": { "replicas": -1 } }
  }))
  .unwrap();
  store.create(&parent).await.unwrap();

  let err = reconciler(&store).reconcile(&key()).await.unwrap_err();
  assert!(matches!(err, ReconcileError::InvalidParent(_)));
  assert!(!err.is_retryable());
}
