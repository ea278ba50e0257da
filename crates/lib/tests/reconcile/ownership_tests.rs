//! Ownership stamping and the children view.

use std::sync::Arc;

use ctlplane_lib::apply::ApplyOptions;
use ctlplane_lib::consts::OWNER_UID_LABEL;
use ctlplane_lib::controller::{ControlPlaneReconciler, OpenStackClientReconciler, ReconcilerConfig};
use ctlplane_lib::manifest::{ManifestBody, ObjectMeta, OwnerReference};
use ctlplane_lib::ownership::children;
use ctlplane_lib::parent::{OpenStackClient, OpenStackClientSpec, Parent, ParentKey};
use ctlplane_lib::render::Component;
use ctlplane_lib::store::ResourceStore;

use super::common::{RecordingStore, StaticRenderer, Write, config_map, scenario_spec, submit};

fn key() -> ParentKey {
  ParentKey::new("openstack", "overcloud")
}

fn reconciler(store: &Arc<RecordingStore>, renderer: StaticRenderer) -> ControlPlaneReconciler<RecordingStore, StaticRenderer> {
  let config = ReconcilerConfig::default().with_components([Component::Keystone, Component::Glance]);
  ControlPlaneReconciler::with_renderer(Arc::clone(store), renderer, config)
}

#[tokio::test]
async fn same_namespace_children_get_a_controller_reference() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  let renderer = StaticRenderer::default().with(Component::Keystone, vec![config_map("openstack", "local")]);

  reconciler(&store, renderer).reconcile(&key()).await.unwrap();

  let stored = store
    .get(&config_map("openstack", "local").key())
    .await
    .unwrap()
    .unwrap();
  let refs = &stored.manifest.metadata.owner_references;
  assert_eq!(refs.len(), 1);
  assert_eq!(Some(&refs[0].uid), parent.metadata.uid.as_ref());
  assert_eq!(refs[0].kind, "ControlPlane");
  assert_eq!(refs[0].name, "overcloud");
  assert!(refs[0].controller);
  assert_eq!(stored.manifest.metadata.labels.get(OWNER_UID_LABEL), parent.metadata.uid.as_ref());
}

#[tokio::test]
async fn other_namespace_children_rely_on_labels() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;
  let renderer = StaticRenderer::default().with(Component::Keystone, vec![config_map("infra", "remote")]);

  reconciler(&store, renderer).reconcile(&key()).await.unwrap();

  let stored = store.get(&config_map("infra", "remote").key()).await.unwrap().unwrap();
  assert!(stored.manifest.metadata.owner_references.is_empty());
  assert_eq!(stored.manifest.metadata.labels.get(OWNER_UID_LABEL), parent.metadata.uid.as_ref());

  let owned = children(&*store, &parent.owner().unwrap()).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].key(), config_map("infra", "remote").key());
}

#[tokio::test]
async fn foreign_controller_references_are_replaced() {
  let store = Arc::new(RecordingStore::new());
  let parent = submit(&*store, "openstack", scenario_spec()).await;

  let mut template = config_map("openstack", "shared");
  template.metadata.owner_references = vec![
    OwnerReference {
      api_version: "v1".into(),
      kind: "Other".into(),
      name: "previous".into(),
      uid: "previous-uid".into(),
      controller: true,
      block_owner_deletion: true,
    },
    OwnerReference {
      api_version: "v1".into(),
      kind: "Watcher".into(),
      name: "watcher".into(),
      uid: "watcher-uid".into(),
      controller: false,
      block_owner_deletion: false,
    },
  ];
  let renderer = StaticRenderer::default().with(Component::Keystone, vec![template.clone()]);

  reconciler(&store, renderer).reconcile(&key()).await.unwrap();

  let stored = store.get(&template.key()).await.unwrap().unwrap();
  let uids: Vec<&str> = stored
    .manifest
    .metadata
    .owner_references
    .iter()
    .map(|r| r.uid.as_str())
    .collect();
  assert_eq!(uids, ["watcher-uid", parent.metadata.uid.as_deref().unwrap()]);
}

#[tokio::test]
async fn each_component_applies_fully_before_the_next() {
  let store = Arc::new(RecordingStore::new());
  submit(&*store, "openstack", scenario_spec()).await;
  store.clear_writes();

  let renderer = StaticRenderer::default()
    .with(
      Component::Keystone,
      vec![config_map("openstack", "a-1"), config_map("openstack", "a-2")],
    )
    .with(
      Component::Glance,
      vec![config_map("openstack", "b-1"), config_map("openstack", "b-2")],
    );

  reconciler(&store, renderer).reconcile(&key()).await.unwrap();

  let names: Vec<String> = store.writes().iter().map(|w| w.key().name.clone()).collect();
  assert_eq!(names, ["a-1", "a-2", "b-1", "b-2"]);
  assert!(store.writes().iter().all(|w| matches!(w, Write::Create(_))));
}

#[tokio::test]
async fn children_of_different_parents_do_not_mix() {
  let store = Arc::new(RecordingStore::new());
  let first = submit(&*store, "openstack", scenario_spec()).await;
  let second = submit(&*store, "staging", scenario_spec()).await;

  let renderer = StaticRenderer::default().with(Component::Keystone, vec![config_map("openstack", "first-child")]);
  reconciler(&store, renderer).reconcile(&key()).await.unwrap();
  let other = StaticRenderer::default().with(Component::Keystone, vec![config_map("staging", "second-child")]);
  reconciler(&store, other)
    .reconcile(&ParentKey::new("staging", "overcloud"))
    .await
    .unwrap();

  let owned = children(&*store, &first.owner().unwrap()).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].key().name, "first-child");

  let owned = children(&*store, &second.owner().unwrap()).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].key().name, "second-child");
}

#[tokio::test]
async fn openstack_client_owns_its_deployment() {
  let store = Arc::new(RecordingStore::new());
  let client = OpenStackClient {
    metadata: ObjectMeta {
      name: "openstackclient".into(),
      namespace: Some("openstack".into()),
      ..Default::default()
    },
    spec: OpenStackClientSpec {
      config_map: "openstack-config".into(),
      config_secret: "openstack-config-secret".into(),
      container_image: "quay.io/openstack/client:latest".into(),
    },
  };
  let stored = store.create(&client.to_manifest().unwrap()).await.unwrap();
  let client = OpenStackClient::from_manifest(&stored.manifest).unwrap();

  let reconciler = OpenStackClientReconciler::new(Arc::clone(&store), ApplyOptions::default());
  let key = ParentKey::new("openstack", "openstackclient");
  let first = reconciler.reconcile(&key).await.unwrap();
  assert_eq!(first.summary.created, 1);
  let second = reconciler.reconcile(&key).await.unwrap();
  assert_eq!(second.summary.writes(), 0);

  let owned = children(&*store, &client.owner().unwrap()).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].manifest.kind, "Deployment");
  assert!(matches!(owned[0].manifest.body, ManifestBody::Deployment(_)));
  assert_eq!(owned[0].manifest.metadata.owner_references.len(), 1);
}
