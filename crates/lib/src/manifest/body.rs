//! Typed manifest bodies.
//!
//! Each variant covers one family of resources this operator produces. The
//! fields the operator manages are typed; everything else is kept verbatim in
//! an `extra`/`rest` map so that values written by other actors (the store
//! assigning a `clusterIP`, a scheduler filling in `nodeName`, a `status`
//! block) survive an update untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::ManifestError;

/// API groups served by the cluster itself rather than by an operator.
const CORE_GROUPS: &[&str] = &["apps", "batch", "policy", "autoscaling"];

/// The body of a manifest: every top-level field except `apiVersion`,
/// `kind` and `metadata`.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestBody {
  /// `apps/v1` Deployment.
  Deployment(DeploymentBody),
  /// `v1` ConfigMap.
  ConfigMap(ConfigMapBody),
  /// `v1` Service.
  Service(ServiceBody),
  /// A custom resource served by another operator; `spec` is its contract.
  Custom(CustomBody),
  /// Anything else, passed through as-is.
  Opaque(Map<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentBody {
  pub spec: DeploymentSpec,
  pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub replicas: Option<u32>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub selector: Option<LabelSelector>,

  #[serde(default)]
  pub template: PodTemplateSpec,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub match_labels: BTreeMap<String, String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
  #[serde(default)]
  pub metadata: TemplateMeta,

  #[serde(default)]
  pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub namespace: Option<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
  #[serde(default)]
  pub containers: Vec<Container>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub volumes: Vec<Volume>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub command: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvVar>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub volume_mounts: Vec<VolumeMount>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
  pub name: String,
  pub mount_path: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sub_path: Option<String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub config_map: Option<ConfigMapVolumeSource>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub secret: Option<SecretVolumeSource>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapVolumeSource {
  pub name: String,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
  pub secret_name: String,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMapBody {
  pub data: BTreeMap<String, String>,
  pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceBody {
  pub spec: ServiceSpec,
  pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<ServicePort>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub selector: BTreeMap<String, String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  pub port: u16,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_port: Option<Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protocol: Option<String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomBody {
  pub spec: Value,
  pub rest: Map<String, Value>,
}

fn is_core_api(api_version: &str) -> bool {
  match api_version.split_once('/') {
    None => true,
    Some((group, _)) => CORE_GROUPS.contains(&group) || group.ends_with(".k8s.io"),
  }
}

fn take_typed<T: serde::de::DeserializeOwned + Default>(
  fields: &mut Map<String, Value>,
  field: &'static str,
) -> Result<T, ManifestError> {
  match fields.remove(field) {
    None | Some(Value::Null) => Ok(T::default()),
    Some(value) => serde_json::from_value(value).map_err(|source| ManifestError::InvalidField { field, source }),
  }
}

fn put_typed<T: Serialize>(fields: &mut Map<String, Value>, field: &str, value: &T) -> Result<(), serde_json::Error> {
  fields.insert(field.to_string(), serde_json::to_value(value)?);
  Ok(())
}

impl ManifestBody {
  /// Classify and parse the remaining top-level fields of a document.
  pub fn from_fields(api_version: &str, kind: &str, mut fields: Map<String, Value>) -> Result<Self, ManifestError> {
    match (api_version, kind) {
      ("apps/v1", "Deployment") => {
        let spec = take_typed(&mut fields, "spec")?;
        Ok(ManifestBody::Deployment(DeploymentBody { spec, rest: fields }))
      }
      ("v1", "ConfigMap") => {
        let data = take_typed(&mut fields, "data")?;
        Ok(ManifestBody::ConfigMap(ConfigMapBody { data, rest: fields }))
      }
      ("v1", "Service") => {
        let spec = take_typed(&mut fields, "spec")?;
        Ok(ManifestBody::Service(ServiceBody { spec, rest: fields }))
      }
      _ if !is_core_api(api_version) => match fields.remove("spec") {
        Some(spec) => Ok(ManifestBody::Custom(CustomBody { spec, rest: fields })),
        None => Ok(ManifestBody::Opaque(fields)),
      },
      _ => Ok(ManifestBody::Opaque(fields)),
    }
  }

  /// Flatten back into top-level document fields.
  pub fn into_fields(self) -> Result<Map<String, Value>, serde_json::Error> {
    match self {
      ManifestBody::Deployment(DeploymentBody { spec, mut rest }) => {
        put_typed(&mut rest, "spec", &spec)?;
        Ok(rest)
      }
      ManifestBody::ConfigMap(ConfigMapBody { data, mut rest }) => {
        if !data.is_empty() {
          put_typed(&mut rest, "data", &data)?;
        }
        Ok(rest)
      }
      ManifestBody::Service(ServiceBody { spec, mut rest }) => {
        put_typed(&mut rest, "spec", &spec)?;
        Ok(rest)
      }
      ManifestBody::Custom(CustomBody { spec, mut rest }) => {
        rest.insert("spec".to_string(), spec);
        Ok(rest)
      }
      ManifestBody::Opaque(fields) => Ok(fields),
    }
  }

  /// Short variant name for logs.
  pub fn variant(&self) -> &'static str {
    match self {
      ManifestBody::Deployment(_) => "deployment",
      ManifestBody::ConfigMap(_) => "configmap",
      ManifestBody::Service(_) => "service",
      ManifestBody::Custom(_) => "custom",
      ManifestBody::Opaque(_) => "opaque",
    }
  }
}
