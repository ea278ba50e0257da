//! Manifest types.
//!
//! A manifest is one self-describing resource document: `apiVersion`, `kind`,
//! `metadata` and a body. Documents are read from templates and written to the
//! store as JSON objects; in memory the body is a typed [`ManifestBody`] so the
//! apply engine can tell the fields this operator manages apart from the fields
//! other actors write.
//!
//! # Example
//!
//! ```
//! use ctlplane_lib::manifest::Manifest;
//!
//! let manifest: Manifest = serde_json::from_value(serde_json::json!({
//!   "apiVersion": "v1",
//!   "kind": "ConfigMap",
//!   "metadata": { "name": "settings", "namespace": "openstack" },
//!   "data": { "debug": "true" }
//! }))
//! .unwrap();
//!
//! assert_eq!(manifest.key().to_string(), "ConfigMap/openstack/settings");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use super::body::ManifestBody;
use crate::util::hash::Hashable;

/// Kinds that live outside any namespace.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
  "Namespace",
  "ClusterRole",
  "ClusterRoleBinding",
  "CustomResourceDefinition",
  "StorageClass",
  "PersistentVolume",
  "PriorityClass",
];

/// Errors raised when a document does not describe a valid manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("document is not an object")]
  NotAnObject,

  #[error("missing required field '{0}'")]
  MissingField(&'static str),

  #[error("invalid field '{field}': {source}")]
  InvalidField {
    field: &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error("{kind} has an empty name")]
  EmptyName { kind: String },

  #[error("{kind}/{name} is namespaced but has no namespace")]
  MissingNamespace { kind: String, name: String },

  #[error("{kind}/{name} is cluster-scoped but sets namespace '{namespace}'")]
  UnexpectedNamespace {
    kind: String,
    name: String,
    namespace: String,
  },
}

/// Whether a kind lives in a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
  Namespaced,
  Cluster,
}

impl Scope {
  pub fn for_kind(kind: &str) -> Self {
    if CLUSTER_SCOPED_KINDS.contains(&kind) {
      Scope::Cluster
    } else {
      Scope::Namespaced
    }
  }
}

/// Store address of a resource: `(kind, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
  pub kind: String,
  pub namespace: Option<String>,
  pub name: String,
}

impl ResourceKey {
  pub fn namespaced(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      namespace: Some(namespace.into()),
      name: name.into(),
    }
  }

  pub fn cluster(kind: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      namespace: None,
      name: name.into(),
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.namespace {
      Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
      None => write!(f, "{}/{}", self.kind, self.name),
    }
  }
}

/// Back-pointer from a child to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
  pub api_version: String,
  pub kind: String,
  pub name: String,
  pub uid: String,
  #[serde(default)]
  pub controller: bool,
  #[serde(default)]
  pub block_owner_deletion: bool,
}

/// Object metadata shared by every manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub namespace: Option<String>,

  /// Assigned by the store on create.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uid: Option<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub annotations: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub owner_references: Vec<OwnerReference>,
}

/// A single resource document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Manifest {
  pub api_version: String,
  pub kind: String,
  pub metadata: ObjectMeta,
  pub body: ManifestBody,
}

impl Hashable for Manifest {}

impl Manifest {
  pub fn scope(&self) -> Scope {
    Scope::for_kind(&self.kind)
  }

  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  pub fn namespace(&self) -> Option<&str> {
    self.metadata.namespace.as_deref()
  }

  pub fn key(&self) -> ResourceKey {
    ResourceKey {
      kind: self.kind.clone(),
      namespace: self.metadata.namespace.clone(),
      name: self.metadata.name.clone(),
    }
  }

  /// Check the name and scope invariants.
  pub fn validate(&self) -> Result<(), ManifestError> {
    if self.metadata.name.is_empty() {
      return Err(ManifestError::EmptyName {
        kind: self.kind.clone(),
      });
    }

    match (self.scope(), &self.metadata.namespace) {
      (Scope::Namespaced, None) => Err(ManifestError::MissingNamespace {
        kind: self.kind.clone(),
        name: self.metadata.name.clone(),
      }),
      (Scope::Namespaced, Some(ns)) if ns.is_empty() => Err(ManifestError::MissingNamespace {
        kind: self.kind.clone(),
        name: self.metadata.name.clone(),
      }),
      (Scope::Cluster, Some(ns)) => Err(ManifestError::UnexpectedNamespace {
        kind: self.kind.clone(),
        name: self.metadata.name.clone(),
        namespace: ns.clone(),
      }),
      _ => Ok(()),
    }
  }
}

fn take_string(fields: &mut Map<String, Value>, field: &'static str) -> Result<String, ManifestError> {
  let value = fields.remove(field).ok_or(ManifestError::MissingField(field))?;
  let value: String = serde_json::from_value(value).map_err(|source| ManifestError::InvalidField { field, source })?;
  if value.is_empty() {
    return Err(ManifestError::MissingField(field));
  }
  Ok(value)
}

impl TryFrom<Value> for Manifest {
  type Error = ManifestError;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    let Value::Object(mut fields) = value else {
      return Err(ManifestError::NotAnObject);
    };

    let api_version = take_string(&mut fields, "apiVersion")?;
    let kind = take_string(&mut fields, "kind")?;
    let metadata = fields.remove("metadata").ok_or(ManifestError::MissingField("metadata"))?;
    let metadata: ObjectMeta =
      serde_json::from_value(metadata).map_err(|source| ManifestError::InvalidField {
        field: "metadata",
        source,
      })?;
    let body = ManifestBody::from_fields(&api_version, &kind, fields)?;

    let manifest = Manifest {
      api_version,
      kind,
      metadata,
      body,
    };
    manifest.validate()?;
    Ok(manifest)
  }
}

impl Manifest {
  /// The document form: body fields plus `apiVersion`, `kind` and `metadata`.
  pub fn to_value(&self) -> Result<Value, serde_json::Error> {
    let mut fields = self.body.clone().into_fields()?;
    fields.insert("apiVersion".to_string(), Value::String(self.api_version.clone()));
    fields.insert("kind".to_string(), Value::String(self.kind.clone()));
    fields.insert("metadata".to_string(), serde_json::to_value(&self.metadata)?);
    Ok(Value::Object(fields))
  }
}

impl Serialize for Manifest {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_value().map_err(S::Error::custom)?.serialize(serializer)
  }
}
