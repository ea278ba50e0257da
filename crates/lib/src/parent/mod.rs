//! Parent resources.
//!
//! A parent is the single top-level object that drives one reconciliation.
//! Two kinds exist: [`ControlPlane`], whose children are rendered from
//! templates, and [`OpenStackClient`], whose single Deployment is built in
//! code.

mod types;

pub use types::*;
