//! Reconcile controllers.
//!
//! A controller is handed a parent key whenever something relevant may have
//! changed, possibly spuriously. Each call reads the parent, derives the full
//! desired set of children and applies it. Nothing is carried over between
//! calls, so a reconcile that failed halfway is repaired by the next one.

mod client;
mod controlplane;
mod types;

pub use client::{OpenStackClientReconciler, client_deployment};
pub use controlplane::ControlPlaneReconciler;
pub use types::*;
