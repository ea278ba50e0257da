//! Reconcile, children and delete integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const COMPONENT_KINDS: [&str; 8] = [
  "MariaDB",
  "Interconnect",
  "KeystoneAPI",
  "GlanceAPI",
  "PlacementAPI",
  "NeutronAPI",
  "Cinder",
  "Nova",
];

#[test]
fn reconcile_creates_every_component_in_order() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");

  let outcome = env.json(&["reconcile", "openstack/overcloud"]);
  assert_eq!(outcome["parent_found"], true);
  assert_eq!(outcome["summary"]["created"], 8);

  let kinds: Vec<&str> = outcome["summary"]["resources"]
    .as_array()
    .unwrap()
    .iter()
    .map(|r| r["key"]["kind"].as_str().unwrap())
    .collect();
  assert_eq!(kinds, COMPONENT_KINDS);
}

#[test]
fn second_reconcile_writes_nothing() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();

  let outcome = env.json(&["reconcile", "openstack/overcloud"]);
  assert_eq!(outcome["summary"]["created"], 0);
  assert_eq!(outcome["summary"]["updated"], 0);
  assert_eq!(outcome["summary"]["unchanged"], 8);
}

#[test]
fn text_output_lists_applied_resources() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");

  env
    .ctlplane_cmd()
    .args(["reconcile", "openstack/overcloud"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Reconciled ControlPlane openstack/overcloud"))
    .stdout(predicate::str::contains("GlanceAPI/openstack/glance"))
    .stdout(predicate::str::contains("Spec hash"));
}

#[test]
fn children_lists_owned_objects() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();

  let children = env.json(&["children", "openstack/overcloud"]);
  assert_eq!(children.as_array().unwrap().len(), 8);

  env
    .ctlplane_cmd()
    .args(["children", "openstack/overcloud"])
    .assert()
    .success()
    .stdout(predicate::str::contains("owns 8 object(s)"));
}

#[test]
fn openstack_client_gets_a_deployment() {
  let env = TestEnv::new();
  env.submit("openstackclient.yaml");

  let outcome = env.json(&["reconcile", "openstack/openstackclient", "--kind", "openstackclient"]);
  assert_eq!(outcome["summary"]["created"], 1);
  assert_eq!(outcome["summary"]["resources"][0]["key"]["kind"], "Deployment");

  let children = env.json(&["children", "openstack/openstackclient", "--kind", "openstackclient"]);
  assert_eq!(children.as_array().unwrap().len(), 1);
}

#[test]
fn broken_templates_fail_without_retrying() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  let templates = env.temp.path().join("templates");
  env.write_file("templates/mariadb/mariadb.yaml", "kind: MariaDB\nmetadata: {{ .Missing }}\n");

  env
    .ctlplane_cmd()
    .args(["reconcile", "openstack/overcloud", "--retries", "3"])
    .arg("--templates")
    .arg(&templates)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to reconcile ControlPlane openstack/overcloud"))
    .stderr(predicate::str::contains("retry").not());
}

#[test]
fn delete_removes_only_the_parent() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();

  env
    .ctlplane_cmd()
    .args(["delete", "openstack/overcloud"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted ControlPlane/openstack/overcloud"));

  env
    .ctlplane_cmd()
    .args(["delete", "openstack/overcloud"])
    .assert()
    .success()
    .stdout(predicate::str::contains("not found"));

  let dry_run = env.json(&["gc", "--dry-run"]);
  assert_eq!(dry_run["stats"]["deleted"], 8);
}
