//! Resource manifests.
//!
//! Manifests are produced by template expansion, stamped with ownership and
//! handed to the apply engine. The body is a typed union over the resource
//! families this operator manages, with an opaque fallback.

mod body;
mod merge;
mod types;

pub use body::*;
pub use types::*;
