use std::time::Duration;

/// Application name, used for data directories.
pub const APP_NAME: &str = "ctlplane";

/// Length of the truncated hashes used for display.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// API version of the parent resources.
pub const API_VERSION: &str = "controlplane.openstack.org/v1beta1";

/// Label holding the owner's uid.
pub const OWNER_UID_LABEL: &str = "controlplane.openstack.org/uid";

/// Label holding the owner's namespace.
pub const OWNER_NAMESPACE_LABEL: &str = "controlplane.openstack.org/namespace";

/// Label holding the owner's name.
pub const OWNER_NAME_LABEL: &str = "controlplane.openstack.org/name";

/// Environment variable overriding the store directory.
pub const STORE_ENV: &str = "CTLPLANE_STORE";

/// Environment variable overriding the template root.
pub const TEMPLATES_ENV: &str = "CTLPLANE_TEMPLATES";

/// Template root used when nothing else is configured.
pub const DEFAULT_TEMPLATE_ROOT: &str = "./bindata";

/// Number of times a version conflict is retried inside a single apply.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 1;

/// How long a file store operation waits for another holder of the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
