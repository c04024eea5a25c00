use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

use crate::api::ResourceKind;

/// Default backend url, the local development server.
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Turn off to send every read to the backend
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// SQLite file holding the cache slots (defaults to the data directory)
  pub path: Option<PathBuf>,
  /// Per-resource ttl overrides, in seconds
  #[serde(default)]
  pub ttl_secs: TtlOverrides,
}

fn default_true() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      ttl_secs: TtlOverrides::default(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtlOverrides {
  pub roles: Option<u64>,
  pub properties: Option<u64>,
  pub owners: Option<u64>,
}

impl CacheConfig {
  /// Effective ttl for `kind`; `None` when caching is off or the resource is never cached.
  pub fn ttl_for(&self, kind: ResourceKind) -> Option<Duration> {
    if !self.enabled {
      return None;
    }
    let default = kind.default_ttl()?;
    let override_secs = match kind {
      ResourceKind::Roles => self.ttl_secs.roles,
      ResourceKind::Properties => self.ttl_secs.properties,
      ResourceKind::Owners => self.ttl_secs.owners,
      _ => None,
    };
    Some(override_secs.map(Duration::from_secs).unwrap_or(default))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Also write logs to this file
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./brokerdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/brokerdesk/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("brokerdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("brokerdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks BROKERDESK_TOKEN first, then BROKERDESK_API_TOKEN as fallback.
  /// No token means requests go out unauthenticated.
  pub fn get_api_token() -> Option<String> {
    std::env::var("BROKERDESK_TOKEN")
      .or_else(|_| std::env::var("BROKERDESK_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.url, "http://127.0.0.1:8000/api");
    assert_eq!(config.api.timeout_secs, 10);
    assert!(config.cache.enabled);
    assert_eq!(
      config.cache.ttl_for(ResourceKind::Properties),
      Some(Duration::from_secs(120))
    );
  }

  #[test]
  fn test_parse_partial_file() {
    let config = Config::parse(
      r#"
api:
  url: https://inmobiliaria.example.com/api
cache:
  ttl_secs:
    owners: 60
logging:
  file: /tmp/brokerdesk.log
"#,
    )
    .unwrap();

    assert_eq!(config.api.url, "https://inmobiliaria.example.com/api");
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.cache.ttl_for(ResourceKind::Owners), Some(Duration::from_secs(60)));
    assert_eq!(
      config.cache.ttl_for(ResourceKind::Roles),
      Some(Duration::from_secs(1800))
    );
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/brokerdesk.log")));
  }

  #[test]
  fn test_disabled_cache_has_no_ttl() {
    let config = Config::parse("cache:\n  enabled: false\n").unwrap();
    assert_eq!(config.cache.ttl_for(ResourceKind::Roles), None);
  }

  #[test]
  fn test_uncached_resource_ignores_overrides() {
    let config = CacheConfig::default();
    assert_eq!(config.ttl_for(ResourceKind::Payments), None);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("\n").unwrap();
    assert!(config.cache.enabled);
  }

  #[test]
  fn test_missing_explicit_path_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brokerdesk.yaml");
    std::fs::write(&path, "api:\n  timeout_secs: 3\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.api.timeout_secs, 3);
  }
}
