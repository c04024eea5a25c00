//! Core types for the caching system.

use serde::{Deserialize, Serialize};

/// A cached payload together with the moment it was written.
///
/// Persisted as `{"data": ..., "storedAt": <epoch-millis>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  #[serde(rename = "storedAt")]
  pub stored_at: i64,
}

impl<T> CacheEntry<T> {
  pub fn new(data: T, stored_at: i64) -> Self {
    Self { data, stored_at }
  }

  /// Milliseconds elapsed since the entry was written. Negative under clock skew.
  ///
  /// `None` when the stored timestamp is so far off that the age does not fit.
  pub fn age_millis(&self, now_millis: i64) -> Option<i64> {
    now_millis.checked_sub(self.stored_at)
  }

  /// An entry stays valid while its age does not exceed the ttl.
  /// An age that cannot be computed counts as expired.
  pub fn is_fresh(&self, now_millis: i64, ttl_millis: i64) -> bool {
    self
      .age_millis(now_millis)
      .is_some_and(|age| age <= ttl_millis)
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from a still-valid cache entry
  Cache,
}
