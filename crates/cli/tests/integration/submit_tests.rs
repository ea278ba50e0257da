//! Submit command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn submit_creates_then_reports_unchanged() {
  let env = TestEnv::new();

  env
    .ctlplane_cmd()
    .arg("submit")
    .arg(fixture_path("controlplane.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("ControlPlane/openstack/overcloud"))
    .stdout(predicate::str::contains("(created)"));

  let submitted = env.json(&["submit", fixture_path("controlplane.yaml").to_str().unwrap()]);
  assert_eq!(submitted[0]["outcome"], "unchanged");
}

#[test]
fn resubmitting_a_changed_parent_updates_it() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");

  let changed = std::fs::read_to_string(fixture_path("controlplane.yaml"))
    .unwrap()
    .replace("replicas: 2", "replicas: 3");
  let path = env.write_file("changed.yaml", &changed);

  let submitted = env.json(&["submit", path.to_str().unwrap()]);
  assert_eq!(submitted[0]["outcome"], "updated");
}

#[test]
fn resubmitting_without_a_section_clears_it() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();

  let without_storage = std::fs::read_to_string(fixture_path("controlplane.yaml"))
    .unwrap()
    .replace("  storageClass: fast\n", "");
  let path = env.write_file("without-storage.yaml", &without_storage);

  let submitted = env.json(&["submit", path.to_str().unwrap()]);
  assert_eq!(submitted[0]["outcome"], "updated");

  // MariaDB and Glance render the storage class; both fall back to empty.
  let outcome = env.json(&["reconcile", "openstack/overcloud"]);
  assert_eq!(outcome["summary"]["updated"], 2);
  let updated: Vec<&str> = outcome["summary"]["resources"]
    .as_array()
    .unwrap()
    .iter()
    .filter(|r| r["outcome"] == "updated")
    .map(|r| r["key"]["kind"].as_str().unwrap())
    .collect();
  assert_eq!(updated, ["MariaDB", "GlanceAPI"]);
}

#[test]
fn submit_rejects_non_parent_documents() {
  let env = TestEnv::new();

  env
    .ctlplane_cmd()
    .arg("submit")
    .arg(fixture_path("unsupported.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("unsupported kind 'ConfigMap'"));
}

#[test]
fn submit_rejects_invalid_specs() {
  let env = TestEnv::new();
  let path = env.write_file(
    "negative.yaml",
    "apiVersion: controlplane.openstack.org/v1beta1\nkind: ControlPlane\nmetadata:\n  name: overcloud\n  namespace: openstack\nspec:\n  glance:\n    replicas: -1\n",
  );

  env
    .ctlplane_cmd()
    .arg("submit")
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid spec"));
}

#[test]
fn submit_rejects_storage_classes_that_are_not_names() {
  let env = TestEnv::new();
  let path = env.write_file(
    "quoted.yaml",
    "apiVersion: controlplane.openstack.org/v1beta1\nkind: ControlPlane\nmetadata:\n  name: overcloud\n  namespace: openstack\nspec:\n  storageClass: 'fa\"st'\n",
  );

  env
    .ctlplane_cmd()
    .arg("submit")
    .arg(&path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid storage class"));
}
