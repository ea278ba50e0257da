//! End-to-end reconciles against the shipped templates.

use std::sync::Arc;

use serde_json::Value;

use ctlplane_lib::consts::{OWNER_NAME_LABEL, OWNER_NAMESPACE_LABEL, OWNER_UID_LABEL};
use ctlplane_lib::controller::{ControlPlaneReconciler, ReconcilerConfig};
use ctlplane_lib::manifest::{Manifest, ResourceKey};
use ctlplane_lib::parent::{ControlPlaneSpec, ParentKey, ReplicaSpec};
use ctlplane_lib::render::Component;
use ctlplane_lib::store::{FileStore, ResourceStore};

use super::common::{RecordingStore, Write, resubmit, scenario_spec, shipped_templates, submit};

const FIVE: [Component; 5] = [
  Component::Mariadb,
  Component::Interconnect,
  Component::Keystone,
  Component::Glance,
  Component::Placement,
];

fn reconciler(store: &Arc<RecordingStore>, components: &[Component]) -> ControlPlaneReconciler<RecordingStore> {
  let config = ReconcilerConfig::new(shipped_templates()).with_components(components.to_vec());
  ControlPlaneReconciler::new(Arc::clone(store), config)
}

fn key() -> ParentKey {
  ParentKey::new("openstack", "overcloud")
}

async fn stored_document(store: &RecordingStore, key: ResourceKey) -> Value {
  let stored = store.get(&key).await.unwrap().unwrap();
  serde_json::to_value(&stored.manifest).unwrap()
}

#[tokio::test]
async fn five_component_scenario() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();

  let outcome = reconciler(&store, &FIVE).reconcile(&key()).await.unwrap();

  assert!(outcome.parent_found);
  assert_eq!(outcome.requeue_after, None);
  assert_eq!(outcome.summary.created, 5);
  assert_eq!(outcome.summary.updated, 0);

  let writes = store.writes();
  let kinds: Vec<&str> = writes.iter().map(|w| w.key().kind.as_str()).collect();
  assert_eq!(kinds, ["MariaDB", "Interconnect", "KeystoneAPI", "GlanceAPI", "PlacementAPI"]);

  let uid = parent.metadata.uid.clone().unwrap();
  for write in store.writes() {
    let stored = store.get(write.key()).await.unwrap().unwrap();
    let labels = &stored.manifest.metadata.labels;
    assert_eq!(labels.get(OWNER_UID_LABEL), Some(&uid), "{}", write.key());
    assert_eq!(labels.get(OWNER_NAMESPACE_LABEL).map(String::as_str), Some("openstack"));
    assert_eq!(labels.get(OWNER_NAME_LABEL).map(String::as_str), Some("overcloud"));
  }

  let interconnect = stored_document(&store, ResourceKey::namespaced("Interconnect", "openstack", "amq-interconnect")).await;
  assert_eq!(interconnect["spec"]["deploymentPlan"]["size"], 1);

  let glance = stored_document(&store, ResourceKey::namespaced("GlanceAPI", "openstack", "glance")).await;
  assert_eq!(glance["spec"]["replicas"], 2);
  assert_eq!(glance["spec"]["storageClass"], "fast");

  let mariadb = stored_document(&store, ResourceKey::namespaced("MariaDB", "openstack", "openstack")).await;
  assert_eq!(mariadb["spec"]["storageClass"], "fast");
}

#[tokio::test]
async fn second_reconcile_writes_nothing() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  let reconciler = reconciler(&store, &Component::ALL);

  let first = reconciler.reconcile(&key()).await.unwrap();
  assert_eq!(first.summary.created, Component::ALL.len());
  let writes_after_first = store.inner.stats().writes();

  let second = reconciler.reconcile(&key()).await.unwrap();
  assert_eq!(second.summary.writes(), 0);
  assert_eq!(second.summary.unchanged, Component::ALL.len());
  assert_eq!(store.inner.stats().writes(), writes_after_first);
  assert_eq!(first.spec_hash, second.spec_hash);
}

#[tokio::test]
async fn spec_change_updates_only_the_affected_child() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  let reconciler = reconciler(&store, &FIVE);
  let first = reconciler.reconcile(&key()).await.unwrap();

  resubmit(
    &*store,
    &parent,
    ControlPlaneSpec {
      glance: ReplicaSpec::new(3),
      ..scenario_spec()
    },
  )
  .await;
  store.clear_writes();

  let second = reconciler.reconcile(&key()).await.unwrap();
  assert_eq!(second.summary.updated, 1);
  assert_eq!(second.summary.unchanged, 4);
  assert_eq!(
    store.writes(),
    [Write::Update(ResourceKey::namespaced("GlanceAPI", "openstack", "glance"))]
  );
  assert_ne!(first.spec_hash, second.spec_hash);

  let glance = stored_document(&store, ResourceKey::namespaced("GlanceAPI", "openstack", "glance")).await;
  assert_eq!(glance["spec"]["replicas"], 3);
}

#[tokio::test]
async fn drifted_children_are_restored() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  let reconciler = reconciler(&store, &FIVE);
  reconciler.reconcile(&key()).await.unwrap();

  let key_placement = ResourceKey::namespaced("PlacementAPI", "openstack", "placement");
  let stored = store.get(&key_placement).await.unwrap().unwrap();
  let mut drifted = serde_json::to_value(&stored.manifest).unwrap();
  drifted["spec"]["replicas"] = Value::from(7);
  let drifted: Manifest = drifted.try_into().unwrap();
  store.update(&drifted, stored.resource_version).await.unwrap();

  let outcome = reconciler.reconcile(&key()).await.unwrap();
  assert_eq!(outcome.summary.updated, 1);
  let placement = stored_document(&store, key_placement).await;
  assert_eq!(placement["spec"]["replicas"], 1);
}

#[tokio::test]
async fn components_apply_in_configured_order() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();

  reconciler(&store, &[Component::Glance, Component::Keystone])
    .reconcile(&key())
    .await
    .unwrap();

  let kinds: Vec<String> = store.writes().iter().map(|w| w.key().kind.clone()).collect();
  assert_eq!(kinds, ["GlanceAPI", "KeystoneAPI"]);
}

#[tokio::test]
async fn interconnect_replicas_are_defaulted() {
  for (requested, expected) in [(0, 1), (3, 3)] {
    let store = Arc::new(RecordingStore::new());
    let spec = ControlPlaneSpec {
      interconnect: ReplicaSpec::new(requested),
      ..scenario_spec()
    };
    submit(&*store, "openstack", spec).await;
    reconciler(&store, &[Component::Interconnect])
      .reconcile(&key())
      .await
      .unwrap();

    let interconnect =
      stored_document(&store, ResourceKey::namespaced("Interconnect", "openstack", "amq-interconnect")).await;
    assert_eq!(interconnect["spec"]["deploymentPlan"]["size"], expected);
  }
}

#[tokio::test]
async fn rendering_is_deterministic() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;

  let a = reconciler(&store, &Component::ALL).plan(&parent).unwrap();
  let b = reconciler(&store, &Component::ALL).plan(&parent).unwrap();

  let a: Vec<_> = a.manifests().cloned().collect();
  let b: Vec<_> = b.manifests().cloned().collect();
  assert_eq!(a.len(), Component::ALL.len());
  assert_eq!(a, b);
}

#[tokio::test]
async fn missing_parent_is_a_no_op() {
  let store = Arc::new(RecordingStore::new());

  let outcome = reconciler(&store, &Component::ALL).reconcile(&key()).await.unwrap();

  assert!(!outcome.parent_found);
  assert_eq!(outcome.spec_hash, None);
  assert!(store.writes().is_empty());
  assert_eq!(store.inner.stats().lists, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parents_in_different_namespaces_reconcile_concurrently_on_disk() {
  let temp = tempfile::TempDir::new().unwrap();
  let store = Arc::new(FileStore::new(temp.path().join("store")));
  let namespaces = ["alpha", "beta", "gamma", "delta"];
  for namespace in namespaces {
    submit(&*store, namespace, scenario_spec()).await;
  }

  let config = ReconcilerConfig::new(shipped_templates());
  let reconciler = ControlPlaneReconciler::new(Arc::clone(&store), config);
  let keys: Vec<ParentKey> = namespaces.iter().map(|ns| ParentKey::new(*ns, "overcloud")).collect();

  let (a, b, c, d) = tokio::join!(
    reconciler.reconcile(&keys[0]),
    reconciler.reconcile(&keys[1]),
    reconciler.reconcile(&keys[2]),
    reconciler.reconcile(&keys[3]),
  );
  for outcome in [a, b, c, d] {
    assert_eq!(outcome.unwrap().summary.created, Component::ALL.len());
  }
  assert_eq!(
    store.list(&Default::default()).await.unwrap().len(),
    namespaces.len() * (Component::ALL.len() + 1)
  );
}
