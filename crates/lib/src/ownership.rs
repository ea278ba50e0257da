//! Ownership tagging.
//!
//! Every child carries three labels naming its parent, so the full set of
//! children can be listed with one label query. Children in the parent's own
//! namespace also carry a controller owner reference; references cannot
//! cross namespaces, so children elsewhere rely on the labels alone.

use serde::{Deserialize, Serialize};

use crate::consts::{OWNER_NAME_LABEL, OWNER_NAMESPACE_LABEL, OWNER_UID_LABEL};
use crate::manifest::{Manifest, OwnerReference};
use crate::store::{LabelSelector, ResourceStore, StoreError, StoredResource};

/// The parent a child belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerIdentity {
  pub api_version: String,
  pub kind: String,
  pub uid: String,
  pub namespace: String,
  pub name: String,
}

impl OwnerIdentity {
  /// The three ownership labels.
  pub fn labels(&self) -> LabelSelector {
    [
      (OWNER_UID_LABEL, &self.uid),
      (OWNER_NAMESPACE_LABEL, &self.namespace),
      (OWNER_NAME_LABEL, &self.name),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.clone()))
    .collect()
  }

  /// Label selector matching every child of this owner.
  pub fn selector(&self) -> LabelSelector {
    self.labels()
  }

  pub fn owner_reference(&self) -> OwnerReference {
    OwnerReference {
      api_version: self.api_version.clone(),
      kind: self.kind.clone(),
      name: self.name.clone(),
      uid: self.uid.clone(),
      controller: true,
      block_owner_deletion: true,
    }
  }
}

/// Mark `manifest` as owned by `owner`.
///
/// Same-namespace children get exactly one controller reference, replacing
/// any other controller reference. Labels are merged in with ours winning.
pub fn tag(mut manifest: Manifest, owner: &OwnerIdentity) -> Manifest {
  if manifest.namespace() == Some(owner.namespace.as_str()) {
    let refs = &mut manifest.metadata.owner_references;
    refs.retain(|r| !r.controller && r.uid != owner.uid);
    refs.push(owner.owner_reference());
  }

  manifest.metadata.labels.extend(owner.labels());
  manifest
}

/// Owner uid recorded on a child, from its labels or its controller reference.
pub fn owner_uid(manifest: &Manifest) -> Option<&str> {
  manifest
    .metadata
    .labels
    .get(OWNER_UID_LABEL)
    .map(String::as_str)
    .or_else(|| {
      manifest
        .metadata
        .owner_references
        .iter()
        .find(|r| r.controller)
        .map(|r| r.uid.as_str())
    })
}

/// Every stored child of `owner`.
pub async fn children<S>(store: &S, owner: &OwnerIdentity) -> Result<Vec<StoredResource>, StoreError>
where
  S: ResourceStore + ?Sized,
{
  store.list(&owner.selector()).await
}
