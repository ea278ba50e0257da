//! ctlplane-lib: reconciliation core for the control plane operator.
//!
//! This crate turns a parent object into the ordered set of child resources
//! it implies and drives a resource store toward that set:
//! - `parent`: the `ControlPlane` and `OpenStackClient` parent kinds
//! - `context`: defaulting and the flat render context
//! - `render`: template expansion into typed manifests
//! - `ownership`: owner references and ownership labels
//! - `apply`: idempotent create-or-update against a `ResourceStore`
//! - `pipeline`: ordered expand, tag and apply of every component
//! - `controller`: per-parent reconciliation entry points
//! - `store`: in-memory and file-backed resource stores
//! - `gc`: removal of children whose owner is gone

pub mod apply;
pub mod consts;
pub mod context;
pub mod controller;
pub mod gc;
pub mod manifest;
pub mod ownership;
pub mod parent;
pub mod paths;
pub mod pipeline;
pub mod placeholder;
pub mod render;
pub mod store;
pub mod util;
