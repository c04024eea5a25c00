//! Catalogue of backend resources and their cache policy.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

/// Resources exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ResourceKind {
  Roles,
  Properties,
  Owners,
  Clients,
  Employees,
  Users,
  Appointments,
  Contracts,
  Payments,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 9] = [
    ResourceKind::Roles,
    ResourceKind::Properties,
    ResourceKind::Owners,
    ResourceKind::Clients,
    ResourceKind::Employees,
    ResourceKind::Users,
    ResourceKind::Appointments,
    ResourceKind::Contracts,
    ResourceKind::Payments,
  ];

  /// Path segment under the API base url.
  pub fn path(&self) -> &'static str {
    match self {
      ResourceKind::Roles => "roles",
      ResourceKind::Properties => "propiedades",
      ResourceKind::Owners => "propietarios",
      ResourceKind::Clients => "clientes",
      ResourceKind::Employees => "empleados",
      ResourceKind::Users => "usuarios",
      ResourceKind::Appointments => "citas-visita",
      ResourceKind::Contracts => "contratos",
      ResourceKind::Payments => "pagos",
    }
  }

  /// Default time-to-live of the cached listing, `None` for uncached resources.
  ///
  /// Tuned by how often each resource is written: roles almost never,
  /// owners occasionally, properties constantly.
  pub fn default_ttl(&self) -> Option<Duration> {
    match self {
      ResourceKind::Roles => Some(Duration::from_secs(30 * 60)),
      ResourceKind::Owners => Some(Duration::from_secs(5 * 60)),
      ResourceKind::Properties => Some(Duration::from_secs(2 * 60)),
      _ => None,
    }
  }

  pub fn is_cached(&self) -> bool {
    self.default_ttl().is_some()
  }

  /// Key of the persisted cache slot.
  pub fn cache_key(&self) -> String {
    format!("{}_cache", self.path())
  }

  /// Resources that keep a cache slot.
  pub fn cached() -> impl Iterator<Item = ResourceKind> {
    Self::ALL.into_iter().filter(|r| r.is_cached())
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ResourceKind::Roles => "roles",
      ResourceKind::Properties => "properties",
      ResourceKind::Owners => "owners",
      ResourceKind::Clients => "clients",
      ResourceKind::Employees => "employees",
      ResourceKind::Users => "users",
      ResourceKind::Appointments => "appointments",
      ResourceKind::Contracts => "contracts",
      ResourceKind::Payments => "payments",
    };
    f.write_str(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_policy() {
    assert_eq!(ResourceKind::Roles.default_ttl(), Some(Duration::from_secs(1800)));
    assert_eq!(ResourceKind::Owners.default_ttl(), Some(Duration::from_secs(300)));
    assert_eq!(ResourceKind::Properties.default_ttl(), Some(Duration::from_secs(120)));
    assert_eq!(ResourceKind::Appointments.default_ttl(), None);
  }

  #[test]
  fn test_cache_keys() {
    assert_eq!(ResourceKind::Roles.cache_key(), "roles_cache");
    assert_eq!(ResourceKind::Properties.cache_key(), "propiedades_cache");
    assert_eq!(ResourceKind::Owners.cache_key(), "propietarios_cache");
  }

  #[test]
  fn test_cached_resources() {
    let cached: Vec<_> = ResourceKind::cached().collect();
    assert_eq!(
      cached,
      vec![ResourceKind::Roles, ResourceKind::Properties, ResourceKind::Owners]
    );
  }
}
