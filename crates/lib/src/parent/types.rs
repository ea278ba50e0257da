use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::consts::API_VERSION;
use crate::manifest::{CustomBody, Manifest, ManifestBody, ObjectMeta, ResourceKey};
use crate::ownership::OwnerIdentity;
use crate::util::hash::Hashable;

/// Errors raised when a stored object cannot be read as a parent.
#[derive(Debug, Error)]
pub enum ParentError {
  #[error("expected a {expected}, found {found}")]
  WrongKind { expected: &'static str, found: String },

  #[error("{key} has no uid; it was not read back from a store")]
  MissingUid { key: ResourceKey },

  #[error("invalid spec for {key}: {source}")]
  InvalidSpec {
    key: ResourceKey,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid storage class '{value}' for {key}: expected a lowercase DNS subdomain name")]
  InvalidStorageClass { key: ResourceKey, value: String },

  #[error("failed to encode the spec of {key}: {source}")]
  EncodeSpec {
    key: ResourceKey,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid parent key '{0}': expected <namespace>/<name>")]
  InvalidKey(String),
}

/// Identity of a parent object: `<namespace>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentKey {
  pub namespace: String,
  pub name: String,
}

impl ParentKey {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      namespace: namespace.into(),
      name: name.into(),
    }
  }

  /// Store key of the parent object of the given kind.
  pub fn resource_key(&self, kind: &str) -> ResourceKey {
    ResourceKey::namespaced(kind, &self.namespace, &self.name)
  }
}

impl fmt::Display for ParentKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.namespace, self.name)
  }
}

impl FromStr for ParentKey {
  type Err = ParentError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('/') {
      Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() && !name.contains('/') => {
        Ok(Self::new(namespace, name))
      }
      _ => Err(ParentError::InvalidKey(s.to_string())),
    }
  }
}

/// A top-level object that owns a set of children.
pub trait Parent: Sized {
  /// The kind the parent is stored under.
  const KIND: &'static str;

  fn from_manifest(manifest: &Manifest) -> Result<Self, ParentError>;

  fn metadata(&self) -> &ObjectMeta;

  /// Ownership of the children this parent produces.
  fn owner(&self) -> Result<OwnerIdentity, ParentError> {
    let metadata = self.metadata();
    let namespace = metadata.namespace.clone().unwrap_or_default();
    let uid = metadata.uid.clone().ok_or_else(|| ParentError::MissingUid {
      key: ResourceKey::namespaced(Self::KIND, &namespace, &metadata.name),
    })?;

    Ok(OwnerIdentity {
      api_version: API_VERSION.to_string(),
      kind: Self::KIND.to_string(),
      uid,
      namespace,
      name: metadata.name.clone(),
    })
  }
}

/// Read the `spec` of a parent manifest, tolerating a missing spec.
fn decode_spec<T: DeserializeOwned>(manifest: &Manifest, expected: &'static str) -> Result<T, ParentError> {
  if manifest.kind != expected {
    return Err(ParentError::WrongKind {
      expected,
      found: manifest.kind.clone(),
    });
  }

  let spec = match &manifest.body {
    ManifestBody::Custom(body) => body.spec.clone(),
    ManifestBody::Opaque(fields) => fields.get("spec").cloned().unwrap_or(Value::Null),
    _ => Value::Null,
  };
  let spec = if spec.is_null() { Value::Object(Map::new()) } else { spec };

  serde_json::from_value(spec).map_err(|source| ParentError::InvalidSpec {
    key: manifest.key(),
    source,
  })
}

fn parent_manifest<T: Serialize>(kind: &str, metadata: &ObjectMeta, spec: &T) -> Result<Manifest, ParentError> {
  let spec = serde_json::to_value(spec).map_err(|source| ParentError::EncodeSpec {
    key: ResourceKey {
      kind: kind.to_string(),
      namespace: metadata.namespace.clone(),
      name: metadata.name.clone(),
    },
    source,
  })?;

  Ok(Manifest {
    api_version: API_VERSION.to_string(),
    kind: kind.to_string(),
    metadata: metadata.clone(),
    body: ManifestBody::Custom(CustomBody { spec, rest: Map::new() }),
  })
}

/// Settings for a component with a single replica count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSpec {
  #[serde(default)]
  pub replicas: u32,
}

impl ReplicaSpec {
  pub const fn new(replicas: u32) -> Self {
    Self { replicas }
  }
}

/// Cinder runs four independently scaled services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CinderSpec {
  #[serde(rename = "cinderAPIReplicas")]
  pub api_replicas: u32,
  #[serde(rename = "cinderBackupReplicas")]
  pub backup_replicas: u32,
  #[serde(rename = "cinderSchedulerReplicas")]
  pub scheduler_replicas: u32,
  #[serde(rename = "cinderVolumeReplicas")]
  pub volume_replicas: u32,
}

/// Nova runs five independently scaled services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NovaSpec {
  #[serde(rename = "novaAPIReplicas")]
  pub api_replicas: u32,
  #[serde(rename = "novaConductorReplicas")]
  pub conductor_replicas: u32,
  #[serde(rename = "novaMetadataReplicas")]
  pub metadata_replicas: u32,
  #[serde(rename = "novaNoVNCProxyReplicas")]
  pub novncproxy_replicas: u32,
  #[serde(rename = "novaSchedulerReplicas")]
  pub scheduler_replicas: u32,
}

/// Desired state of a control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlPlaneSpec {
  /// Storage class for storage claims.
  #[serde(alias = "storage_class", skip_serializing_if = "Option::is_none")]
  pub storage_class: Option<String>,
  pub keystone: ReplicaSpec,
  pub glance: ReplicaSpec,
  pub placement: ReplicaSpec,
  /// AMQ Interconnect message bus.
  pub interconnect: ReplicaSpec,
  pub neutron: ReplicaSpec,
  pub cinder: CinderSpec,
  pub nova: NovaSpec,
}

impl Hashable for ControlPlaneSpec {}

/// Longest name a DNS subdomain may have.
const MAX_SUBDOMAIN_LEN: usize = 253;

/// Lowercase alphanumerics, `-` and `.`, starting and ending alphanumeric.
///
/// Templates paste the storage class into a quoted scalar, so anything outside
/// this alphabet could change the rendered document.
fn is_dns_subdomain(value: &str) -> bool {
  let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
  value.len() <= MAX_SUBDOMAIN_LEN
    && value.starts_with(alnum)
    && value.ends_with(alnum)
    && value.chars().all(|c| alnum(c) || c == '-' || c == '.')
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPlane {
  pub metadata: ObjectMeta,
  pub spec: ControlPlaneSpec,
}

impl ControlPlane {
  pub fn to_manifest(&self) -> Result<Manifest, ParentError> {
    parent_manifest(Self::KIND, &self.metadata, &self.spec)
  }
}

impl Parent for ControlPlane {
  const KIND: &'static str = "ControlPlane";

  fn from_manifest(manifest: &Manifest) -> Result<Self, ParentError> {
    let spec: ControlPlaneSpec = decode_spec(manifest, Self::KIND)?;
    if let Some(class) = &spec.storage_class
      && !class.is_empty()
      && !is_dns_subdomain(class)
    {
      return Err(ParentError::InvalidStorageClass {
        key: manifest.key(),
        value: class.clone(),
      });
    }

    Ok(Self {
      metadata: manifest.metadata.clone(),
      spec,
    })
  }

  fn metadata(&self) -> &ObjectMeta {
    &self.metadata
  }
}

/// Desired state of the admin client pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenStackClientSpec {
  /// Config map holding `clouds.yaml`.
  #[serde(rename = "openStackConfigMap")]
  pub config_map: String,
  /// Secret holding `secure.yaml`.
  #[serde(rename = "openStackConfigSecret")]
  pub config_secret: String,
  #[serde(rename = "containerImage")]
  pub container_image: String,
}

impl Hashable for OpenStackClientSpec {}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenStackClient {
  pub metadata: ObjectMeta,
  pub spec: OpenStackClientSpec,
}

impl OpenStackClient {
  pub fn to_manifest(&self) -> Result<Manifest, ParentError> {
    parent_manifest(Self::KIND, &self.metadata, &self.spec)
  }
}

impl Parent for OpenStackClient {
  const KIND: &'static str = "OpenStackClient";

  fn from_manifest(manifest: &Manifest) -> Result<Self, ParentError> {
    Ok(Self {
      metadata: manifest.metadata.clone(),
      spec: decode_spec(manifest, Self::KIND)?,
    })
  }

  fn metadata(&self) -> &ObjectMeta {
    &self.metadata
  }
}
