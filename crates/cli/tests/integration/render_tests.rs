//! Render command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn render_prints_tagged_manifests() {
  let env = TestEnv::new();

  env
    .ctlplane_cmd()
    .arg("render")
    .arg(fixture_path("controlplane.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("kind: GlanceAPI"))
    .stdout(predicate::str::contains("controlplane.openstack.org/name: overcloud"))
    .stdout(predicate::str::contains("storageClass: fast"));
}

#[test]
fn render_applies_defaults() {
  let env = TestEnv::new();
  let rendered = env.json(&["render", fixture_path("controlplane.yaml").to_str().unwrap()]);

  let manifests = rendered.as_array().unwrap();
  assert_eq!(manifests.len(), 8);
  let interconnect = manifests.iter().find(|m| m["kind"] == "Interconnect").unwrap();
  assert_eq!(interconnect["spec"]["deploymentPlan"]["size"], 1);
  let glance = manifests.iter().find(|m| m["kind"] == "GlanceAPI").unwrap();
  assert_eq!(glance["spec"]["replicas"], 2);
}

#[test]
fn render_does_not_touch_the_store() {
  let env = TestEnv::new();
  env
    .ctlplane_cmd()
    .arg("render")
    .arg(fixture_path("openstackclient.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("kind: Deployment"));

  assert!(!env.store_path().exists());
}
