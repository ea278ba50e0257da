use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::types::{ReconcileError, ReconcileOutcome};
use crate::apply::ApplyOptions;
use crate::manifest::{
  ConfigMapVolumeSource, Container, DeploymentBody, DeploymentSpec, EnvVar, LabelSelector, Manifest, ManifestBody,
  ObjectMeta, PodSpec, PodTemplateSpec, SecretVolumeSource, TemplateMeta, Volume, VolumeMount,
};
use crate::parent::{OpenStackClient, Parent, ParentKey};
use crate::pipeline::Pipeline;
use crate::store::ResourceStore;
use crate::util::hash::Hashable;

const APP_LABEL: &str = "openstackclient";
const CONTAINER_NAME: &str = "openstackclient";
const CONFIG_VOLUME: &str = "openstack-config";
const SECRET_VOLUME: &str = "openstack-config-secret";

/// The admin client Deployment for `client`.
pub fn client_deployment(client: &OpenStackClient) -> Manifest {
  let labels: BTreeMap<String, String> = [("app".to_string(), APP_LABEL.to_string())].into();
  let name = client.metadata.name.clone();
  let namespace = client.metadata.namespace.clone();

  let container = Container {
    name: CONTAINER_NAME.to_string(),
    image: Some(client.spec.container_image.clone()),
    command: vec!["sleep".to_string(), "infinity".to_string()],
    env: vec![EnvVar {
      name: "OS_CLOUD".to_string(),
      value: Some("default".to_string()),
      ..Default::default()
    }],
    volume_mounts: vec![
      VolumeMount {
        name: CONFIG_VOLUME.to_string(),
        mount_path: "/etc/openstack/clouds.yaml".to_string(),
        sub_path: Some("clouds.yaml".to_string()),
        ..Default::default()
      },
      VolumeMount {
        name: SECRET_VOLUME.to_string(),
        mount_path: "/etc/openstack/secure.yaml".to_string(),
        sub_path: Some("secure.yaml".to_string()),
        ..Default::default()
      },
    ],
    ..Default::default()
  };

  let volumes = vec![
    Volume {
      name: CONFIG_VOLUME.to_string(),
      config_map: Some(ConfigMapVolumeSource {
        name: client.spec.config_map.clone(),
        ..Default::default()
      }),
      ..Default::default()
    },
    Volume {
      name: SECRET_VOLUME.to_string(),
      secret: Some(SecretVolumeSource {
        secret_name: client.spec.config_secret.clone(),
        ..Default::default()
      }),
      ..Default::default()
    },
  ];

  let spec = DeploymentSpec {
    replicas: Some(1),
    selector: Some(LabelSelector {
      match_labels: labels.clone(),
      ..Default::default()
    }),
    template: PodTemplateSpec {
      metadata: TemplateMeta {
        name: Some(name.clone()),
        namespace: namespace.clone(),
        labels,
        ..Default::default()
      },
      spec: PodSpec {
        containers: vec![container],
        volumes,
        ..Default::default()
      },
    },
    ..Default::default()
  };

  Manifest {
    api_version: "apps/v1".to_string(),
    kind: "Deployment".to_string(),
    metadata: ObjectMeta {
      name,
      namespace,
      ..Default::default()
    },
    body: ManifestBody::Deployment(DeploymentBody {
      spec,
      ..Default::default()
    }),
  }
}

/// Keeps the admin client Deployment of an [`OpenStackClient`] in place.
pub struct OpenStackClientReconciler<S: ?Sized> {
  store: Arc<S>,
  options: ApplyOptions,
}

impl<S> OpenStackClientReconciler<S>
where
  S: ResourceStore + ?Sized,
{
  pub fn new(store: Arc<S>, options: ApplyOptions) -> Self {
    Self { store, options }
  }

  pub async fn load(&self, key: &ParentKey) -> Result<Option<OpenStackClient>, ReconcileError> {
    let resource_key = key.resource_key(OpenStackClient::KIND);
    let stored = self
      .store
      .get(&resource_key)
      .await
      .map_err(|source| ReconcileError::Load {
        key: resource_key,
        source,
      })?;

    Ok(stored.map(|s| OpenStackClient::from_manifest(&s.manifest)).transpose()?)
  }

  pub fn plan(&self, client: &OpenStackClient) -> Result<Pipeline, ReconcileError> {
    let owner = client.owner()?;
    let mut pipeline = Pipeline::new();
    pipeline.push(APP_LABEL, vec![client_deployment(client)])?;
    Ok(pipeline.tag(&owner))
  }

  pub async fn reconcile(&self, key: &ParentKey) -> Result<ReconcileOutcome, ReconcileError> {
    info!(parent = %key, store = self.store.backend_name(), "reconciling openstack client");

    let Some(client) = self.load(key).await? else {
      info!(parent = %key, "openstack client not found, nothing to do");
      return Ok(ReconcileOutcome::parent_missing());
    };

    info!(parent = %key, secret = %client.spec.config_secret, "using openstack config secret");
    let spec_hash = client.spec.compute_hash()?;
    let summary = self.plan(&client)?.apply(&*self.store, &self.options).await?;

    Ok(ReconcileOutcome {
      parent_found: true,
      requeue_after: None,
      summary,
      spec_hash: Some(spec_hash),
    })
  }
}
