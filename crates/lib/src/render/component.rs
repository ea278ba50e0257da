use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A sub-component of the control plane, rendered from its own template directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
  Mariadb,
  Interconnect,
  Keystone,
  Glance,
  Placement,
  Neutron,
  Cinder,
  Nova,
}

impl Component {
  /// Default expansion order. Dependencies come first: the database and the
  /// message bus, then identity, then the services that register with it.
  pub const ALL: [Component; 8] = [
    Component::Mariadb,
    Component::Interconnect,
    Component::Keystone,
    Component::Glance,
    Component::Placement,
    Component::Neutron,
    Component::Cinder,
    Component::Nova,
  ];

  /// Directory under the template root holding this component's templates.
  pub fn dir_name(self) -> &'static str {
    match self {
      Component::Mariadb => "mariadb",
      Component::Interconnect => "interconnect",
      Component::Keystone => "keystone",
      Component::Glance => "glance",
      Component::Placement => "placement",
      Component::Neutron => "neutron",
      Component::Cinder => "cinder",
      Component::Nova => "nova",
    }
  }
}

impl fmt::Display for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

impl FromStr for Component {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Component::ALL
      .into_iter()
      .find(|c| c.dir_name().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("unknown component '{s}'"))
  }
}
