//! Render context construction.
//!
//! A [`ControlPlane`] spec is sparse: sections may be missing and counts may
//! be zero. [`build_context`] normalizes it into the flat variable map the
//! templates are written against.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parent::{ControlPlane, ControlPlaneSpec};
use crate::placeholder::Resolver;

/// A single template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
  Int(u32),
  Str(String),
}

impl fmt::Display for ContextValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ContextValue::Int(n) => write!(f, "{n}"),
      ContextValue::Str(s) => f.write_str(s),
    }
  }
}

impl From<u32> for ContextValue {
  fn from(value: u32) -> Self {
    ContextValue::Int(value)
  }
}

impl From<String> for ContextValue {
  fn from(value: String) -> Self {
    ContextValue::Str(value)
  }
}

impl From<&str> for ContextValue {
  fn from(value: &str) -> Self {
    ContextValue::Str(value.to_string())
  }
}

/// Flat, ordered map of template variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderContext(BTreeMap<String, ContextValue>);

impl RenderContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ContextValue>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&ContextValue> {
    self.0.get(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
    self.0.iter()
  }
}

impl Resolver for RenderContext {
  fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
    self.0.get(name).map(|value| match value {
      ContextValue::Str(s) => Cow::Borrowed(s.as_str()),
      ContextValue::Int(n) => Cow::Owned(n.to_string()),
    })
  }
}

/// Fill in defaults. Returns a new spec; the input is left untouched.
///
/// The message bus must always run, so the interconnect replica count is
/// raised to at least one. All other counts pass through.
pub fn with_defaults(spec: &ControlPlaneSpec) -> ControlPlaneSpec {
  let mut spec = spec.clone();
  spec.interconnect.replicas = spec.interconnect.replicas.max(1);
  spec
}

/// Build the variable map for a parent, applying [`with_defaults`] first.
pub fn build_context(parent: &ControlPlane) -> RenderContext {
  let spec = with_defaults(&parent.spec);
  let mut ctx = RenderContext::new();

  ctx.insert("Namespace", parent.metadata.namespace.clone().unwrap_or_default());
  ctx.insert("StorageClass", spec.storage_class.clone().unwrap_or_default());

  ctx.insert("KeystoneReplicas", spec.keystone.replicas);
  ctx.insert("GlanceReplicas", spec.glance.replicas);
  ctx.insert("PlacementReplicas", spec.placement.replicas);
  ctx.insert("InterconnectReplicas", spec.interconnect.replicas);
  ctx.insert("NeutronAPIReplicas", spec.neutron.replicas);

  ctx.insert("CinderAPIReplicas", spec.cinder.api_replicas);
  ctx.insert("CinderBackupReplicas", spec.cinder.backup_replicas);
  ctx.insert("CinderSchedulerReplicas", spec.cinder.scheduler_replicas);
  ctx.insert("CinderVolumeReplicas", spec.cinder.volume_replicas);

  ctx.insert("NovaAPIReplicas", spec.nova.api_replicas);
  ctx.insert("NovaConductorReplicas", spec.nova.conductor_replicas);
  ctx.insert("NovaMetadataReplicas", spec.nova.metadata_replicas);
  ctx.insert("NovaNoVNCProxyReplicas", spec.nova.novncproxy_replicas);
  ctx.insert("NovaSchedulerReplicas", spec.nova.scheduler_replicas);

  ctx
}
