//! Default filesystem locations.
//!
//! Each location can be overridden by an environment variable; the CLI lets
//! flags override both.

use std::path::PathBuf;

use crate::consts::{APP_NAME, DEFAULT_TEMPLATE_ROOT, STORE_ENV, TEMPLATES_ENV};

fn env_path(name: &str) -> Option<PathBuf> {
  std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory, if it can be determined.
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  env_path("USERPROFILE")
}

/// Returns the user's home directory, if it can be determined.
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  env_path("HOME")
}

/// Returns the directory for data files for the application.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  env_path("APPDATA")
    .or_else(|| home_dir().map(|home| home.join("AppData").join("Roaming")))
    .unwrap_or_else(|| PathBuf::from("."))
    .join(APP_NAME)
}

/// Returns the directory for data files for the application.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  env_path("XDG_DATA_HOME")
    .or_else(|| home_dir().map(|home| home.join(".local").join("share")))
    .unwrap_or_else(|| PathBuf::from("."))
    .join(APP_NAME)
}

/// Root of the file-backed resource store.
pub fn store_dir() -> PathBuf {
  env_path(STORE_ENV).unwrap_or_else(|| data_dir().join("store"))
}

/// Root of the component template directories.
pub fn templates_dir() -> PathBuf {
  env_path(TEMPLATES_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_ROOT))
}
