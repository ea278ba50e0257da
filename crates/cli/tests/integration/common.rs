//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// The component templates shipped with the repository.
pub fn shipped_templates() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("..")
    .join("..")
    .join("bindata")
}

/// Isolated test environment.
///
/// Each test gets its own temporary store; templates come from the repository.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Store path (isolated per test).
  pub fn store_path(&self) -> PathBuf {
    self.temp.path().join("store")
  }

  /// Write a file relative to the temp directory and return its path.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Get a pre-configured Command for the ctlplane binary.
  ///
  /// Sets `CTLPLANE_STORE` and `CTLPLANE_TEMPLATES` so nothing outside the
  /// temp directory is touched.
  pub fn ctlplane_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ctlplane");
    cmd.env("CTLPLANE_STORE", self.store_path());
    cmd.env("CTLPLANE_TEMPLATES", shipped_templates());
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Submit a fixture and assert success.
  pub fn submit(&self, fixture: &str) {
    self
      .ctlplane_cmd()
      .arg("submit")
      .arg(fixture_path(fixture))
      .assert()
      .success();
  }

  /// Run a command with `-o json` and parse its stdout.
  pub fn json(&self, args: &[&str]) -> serde_json::Value {
    let output = self.ctlplane_cmd().args(args).args(["-o", "json"]).output().unwrap();
    assert!(
      output.status.success(),
      "command {:?} failed: {}",
      args,
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }
}
