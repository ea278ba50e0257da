//! Owned-field merge.
//!
//! [`Manifest::merge_owned`] overlays the fields this operator manages from a
//! desired manifest onto the copy currently held by the store. The result is
//! what an update would write; when it fingerprints the same as the stored copy
//! there is nothing to do.
//!
//! Owned fields:
//! - metadata: the desired labels and annotations (merged, desired wins) and
//!   the desired owner references (replacing any reference with the same uid
//!   and any other controller reference)
//! - Deployment: replicas, selector, pod template labels/name/namespace,
//!   containers (matched by name) and volumes (matched by name)
//! - ConfigMap: data
//! - Service: ports and selector
//! - Custom and opaque bodies: every key present in the desired document,
//!   merged recursively through objects
//!
//! Everything else on the stored object is kept.
//!
//! [`Manifest::replace_owned`] is the variant for parents, whose `spec` is
//! authored in full by whoever submits them.

use serde_json::{Map, Value};

use super::body::{ConfigMapBody, Container, CustomBody, DeploymentBody, ManifestBody, Volume};
use super::types::{Manifest, OwnerReference};

impl Manifest {
  /// Return `self` (the stored copy) with the owned fields of `desired` applied.
  pub fn merge_owned(&self, desired: &Manifest) -> Manifest {
    let mut merged = self.clone();
    merged.api_version = desired.api_version.clone();

    merged
      .metadata
      .labels
      .extend(desired.metadata.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
      .metadata
      .annotations
      .extend(desired.metadata.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    merge_owner_references(&mut merged.metadata.owner_references, &desired.metadata.owner_references);

    merged.body = self.body.merge_owned(&desired.body);
    merged
  }

  /// Like [`Manifest::merge_owned`], but a custom body's desired `spec`
  /// replaces the stored one whole. Keys missing from the desired spec are
  /// gone from the result.
  pub fn replace_owned(&self, desired: &Manifest) -> Manifest {
    let mut merged = self.merge_owned(desired);
    if let (ManifestBody::Custom(body), ManifestBody::Custom(wanted)) = (&mut merged.body, &desired.body) {
      body.spec = wanted.spec.clone();
    }
    merged
  }
}

fn merge_owner_references(current: &mut Vec<OwnerReference>, desired: &[OwnerReference]) {
  for reference in desired {
    current.retain(|existing| existing.uid != reference.uid && !(reference.controller && existing.controller));
    current.push(reference.clone());
  }
}

impl ManifestBody {
  /// Overlay the owned fields of `desired` onto `self`.
  ///
  /// Bodies of different variants share nothing, so the desired body wins
  /// outright.
  pub fn merge_owned(&self, desired: &ManifestBody) -> ManifestBody {
    match (self, desired) {
      (ManifestBody::Deployment(current), ManifestBody::Deployment(desired)) => {
        ManifestBody::Deployment(merge_deployment(current, desired))
      }
      (ManifestBody::ConfigMap(current), ManifestBody::ConfigMap(desired)) => ManifestBody::ConfigMap(ConfigMapBody {
        data: desired.data.clone(),
        rest: merge_maps(&current.rest, &desired.rest),
      }),
      (ManifestBody::Service(current), ManifestBody::Service(desired)) => {
        let mut merged = current.clone();
        merged.spec.ports = desired.spec.ports.clone();
        merged.spec.selector = desired.spec.selector.clone();
        merged.rest = merge_maps(&current.rest, &desired.rest);
        ManifestBody::Service(merged)
      }
      (ManifestBody::Custom(current), ManifestBody::Custom(desired)) => ManifestBody::Custom(CustomBody {
        spec: merge_values(&current.spec, &desired.spec),
        rest: merge_maps(&current.rest, &desired.rest),
      }),
      (ManifestBody::Opaque(current), ManifestBody::Opaque(desired)) => ManifestBody::Opaque(merge_maps(current, desired)),
      (_, desired) => desired.clone(),
    }
  }
}

fn merge_deployment(current: &DeploymentBody, desired: &DeploymentBody) -> DeploymentBody {
  let mut merged = current.clone();
  let spec = &mut merged.spec;
  let wanted = &desired.spec;

  spec.replicas = wanted.replicas;
  spec.selector = wanted.selector.clone();

  let meta = &mut spec.template.metadata;
  meta.labels = wanted.template.metadata.labels.clone();
  meta.name = wanted.template.metadata.name.clone();
  meta.namespace = wanted.template.metadata.namespace.clone();

  let pod = &mut spec.template.spec;
  pod.containers = merge_named(
    &pod.containers,
    &wanted.template.spec.containers,
    |c| &c.name,
    merge_container,
  );
  pod.volumes = merge_named(&pod.volumes, &wanted.template.spec.volumes, |v| &v.name, merge_volume);

  merged.rest = merge_maps(&current.rest, &desired.rest);
  merged
}

fn merge_container(current: &Container, desired: &Container) -> Container {
  Container {
    name: desired.name.clone(),
    image: desired.image.clone(),
    command: desired.command.clone(),
    env: desired.env.clone(),
    volume_mounts: desired.volume_mounts.clone(),
    extra: merge_maps(&current.extra, &desired.extra),
  }
}

fn merge_volume(current: &Volume, desired: &Volume) -> Volume {
  Volume {
    name: desired.name.clone(),
    config_map: desired.config_map.clone(),
    secret: desired.secret.clone(),
    extra: merge_maps(&current.extra, &desired.extra),
  }
}

/// The desired list, in desired order, with each entry merged onto the
/// stored entry of the same name when there is one.
fn merge_named<T, K, F>(current: &[T], desired: &[T], key: K, merge: F) -> Vec<T>
where
  T: Clone,
  K: Fn(&T) -> &String,
  F: Fn(&T, &T) -> T,
{
  desired
    .iter()
    .map(|wanted| match current.iter().find(|existing| key(existing) == key(wanted)) {
      Some(existing) => merge(existing, wanted),
      None => wanted.clone(),
    })
    .collect()
}

fn merge_maps(current: &Map<String, Value>, desired: &Map<String, Value>) -> Map<String, Value> {
  let mut merged = current.clone();
  for (key, value) in desired {
    let next = match merged.get(key) {
      Some(existing) => merge_values(existing, value),
      None => value.clone(),
    };
    merged.insert(key.clone(), next);
  }
  merged
}

/// Objects merge key by key, anything else is replaced by the desired value.
fn merge_values(current: &Value, desired: &Value) -> Value {
  match (current, desired) {
    (Value::Object(current), Value::Object(desired)) => Value::Object(merge_maps(current, desired)),
    (_, desired) => desired.clone(),
  }
}
