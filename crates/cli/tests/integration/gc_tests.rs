//! Orphan collection integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn gc_with_empty_store_succeeds() {
  let env = TestEnv::new();

  env
    .ctlplane_cmd()
    .arg("gc")
    .assert()
    .success()
    .stdout(predicate::str::contains("Orphan collection complete"));
}

#[test]
fn gc_dry_run_reports_without_deleting() {
  let env = TestEnv::new();

  env
    .ctlplane_cmd()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn gc_keeps_children_of_live_parents() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();

  let result = env.json(&["gc"]);
  assert_eq!(result["stats"]["owned"], 8);
  assert_eq!(result["stats"]["deleted"], 0);
}

#[test]
fn gc_removes_children_of_deleted_parents() {
  let env = TestEnv::new();
  env.submit("controlplane.yaml");
  env.ctlplane_cmd().args(["reconcile", "openstack/overcloud"]).assert().success();
  env.ctlplane_cmd().args(["delete", "openstack/overcloud"]).assert().success();

  let result = env.json(&["gc"]);
  assert_eq!(result["stats"]["deleted"], 8);
  assert_eq!(result["dry_run"], false);

  let children = env.json(&["gc"]);
  assert_eq!(children["stats"]["scanned"], 0);
}
