//! Time-boxed cache slot that sits between a resource service and the network.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::storage::KeyValueStore;
use super::traits::{CacheEntry, CacheResult};

/// One persisted slot holding a JSON payload and its write time.
///
/// Reads past the ttl behave as a miss and drop the slot. Every storage
/// or decoding failure is absorbed here: callers only ever see a hit or a
/// miss, and a failed write is logged and forgotten.
pub struct TtlCache<S: KeyValueStore + ?Sized> {
  store: Arc<S>,
  key: String,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore + ?Sized> TtlCache<S> {
  /// Create a cache for `key` expiring entries older than `ttl`.
  pub fn new(store: Arc<S>, key: impl Into<String>, ttl: Duration) -> Self {
    Self {
      store,
      key: key.into(),
      ttl,
      clock: Arc::new(SystemClock),
    }
  }

  /// Replace the time source.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn ttl_millis(&self) -> i64 {
    i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
  }

  /// Return the cached data if present and still valid.
  pub fn get<T: DeserializeOwned>(&self) -> Option<T> {
    let raw = match self.store.get(&self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %self.key, error = %e, "Failed to read cache slot");
        return None;
      }
    };

    let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        debug!(key = %self.key, error = %e, "Discarding unreadable cache entry");
        self.remove_quietly();
        return None;
      }
    };

    let now = self.clock.now_millis();
    if !entry.is_fresh(now, self.ttl_millis()) {
      debug!(key = %self.key, age_ms = ?entry.age_millis(now), "Cache entry expired");
      self.remove_quietly();
      return None;
    }

    debug!(key = %self.key, "Cache hit");
    Some(entry.data)
  }

  /// Store `data` stamped with the current time, replacing any previous entry.
  pub fn set<T: Serialize>(&self, data: &T) {
    let entry = CacheEntry::new(data, self.clock.now_millis());
    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key = %self.key, error = %e, "Failed to serialize cache entry");
        return;
      }
    };

    match self.store.set(&self.key, &raw) {
      Ok(()) => debug!(key = %self.key, "Cache entry stored"),
      Err(e) => warn!(key = %self.key, error = %e, "Failed to write cache slot"),
    }
  }

  /// Drop the entry, whether or not one exists.
  pub fn clear(&self) {
    match self.store.remove(&self.key) {
      Ok(()) => debug!(key = %self.key, "Cache cleared"),
      Err(e) => warn!(key = %self.key, error = %e, "Failed to clear cache slot"),
    }
  }

  /// Age of a currently valid entry. Does not touch the slot.
  pub fn age(&self) -> Option<Duration> {
    let raw = self.store.get(&self.key).ok().flatten()?;
    let entry: CacheEntry<serde_json::Value> = serde_json::from_str(&raw).ok()?;
    let now = self.clock.now_millis();
    if !entry.is_fresh(now, self.ttl_millis()) {
      return None;
    }
    let age = entry
      .age_millis(now)
      .and_then(|age| u64::try_from(age).ok())
      .unwrap_or(0);
    Some(Duration::from_millis(age))
  }

  /// Read-through fetch.
  ///
  /// 1. Check cache - if valid, return immediately
  /// 2. Otherwise call the fetcher
  /// 3. On success store the result, on failure return the error untouched
  pub async fn fetch_with<T, E, F, Fut>(&self, fetcher: F) -> Result<CacheResult<T>, E>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(data) = self.get::<T>() {
      return Ok(CacheResult::from_cache(data));
    }

    debug!(key = %self.key, "Cache miss, fetching from network");
    let data = fetcher().await?;
    self.set(&data);
    Ok(CacheResult::from_network(data))
  }

  fn remove_quietly(&self) {
    if let Err(e) = self.store.remove(&self.key) {
      warn!(key = %self.key, error = %e, "Failed to remove cache slot");
    }
  }
}

impl<S: KeyValueStore + ?Sized> Clone for TtlCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      key: self.key.clone(),
      ttl: self.ttl,
      clock: Arc::clone(&self.clock),
    }
  }
}

/// Render an entry age the way status output shows it.
pub fn age_display(age: Duration) -> String {
  let minutes = age.as_secs() / 60;
  if minutes < 1 {
    "just now".to_string()
  } else if minutes < 60 {
    format!("{}m ago", minutes)
  } else if minutes < 1440 {
    let hours = minutes / 60;
    if minutes % 60 >= 30 {
      // Round up: 1h 30m+ becomes 2h
      format!("{}h ago", hours + 1)
    } else {
      format!("{}h ago", hours)
    }
  } else {
    let days = minutes / 1440;
    if (minutes % 1440) / 60 >= 12 {
      format!("{}d ago", days + 1)
    } else {
      format!("{}d ago", days)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::cache::storage::MemoryStore;
  use crate::cache::traits::CacheSource;
  use color_eyre::eyre::eyre;
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicU32, Ordering};

  const KEY: &str = "roles_cache";

  fn cache_with(ttl: Duration) -> (Arc<MemoryStore>, Arc<ManualClock>, TtlCache<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let cache = TtlCache::new(store.clone(), KEY, ttl).with_clock(clock.clone());
    (store, clock, cache)
  }

  /// Store whose writes always fail, like a full quota.
  struct FullStore;

  impl KeyValueStore for FullStore {
    fn get(&self, _key: &str) -> color_eyre::Result<Option<String>> {
      Err(eyre!("storage unavailable"))
    }

    fn set(&self, _key: &str, _value: &str) -> color_eyre::Result<()> {
      Err(eyre!("quota exceeded"))
    }

    fn remove(&self, _key: &str) -> color_eyre::Result<()> {
      Err(eyre!("storage unavailable"))
    }
  }

  #[test]
  fn test_entry_valid_through_ttl_then_removed() {
    let (store, clock, cache) = cache_with(Duration::from_secs(30 * 60));
    cache.set(&json!([{"id_rol": 1}]));

    clock.set(30 * 60 * 1000);
    assert_eq!(cache.get::<Value>(), Some(json!([{"id_rol": 1}])));

    clock.advance(1);
    assert_eq!(cache.get::<Value>(), None);
    assert!(store.is_empty());
  }

  #[test]
  fn test_set_writes_stored_at() {
    let (store, clock, cache) = cache_with(Duration::from_secs(60));
    clock.set(1_234);
    cache.set(&vec![1, 2, 3]);

    let raw = store.get(KEY).unwrap().unwrap();
    assert_eq!(raw, r#"{"data":[1,2,3],"storedAt":1234}"#);
  }

  #[test]
  fn test_corrupted_entry_degrades_to_miss() {
    let (store, _clock, cache) = cache_with(Duration::from_secs(60));
    store.set(KEY, "{not json").unwrap();

    assert_eq!(cache.get::<Value>(), None);
    assert_eq!(store.get(KEY).unwrap(), None);

    // A second read is still a clean miss
    assert_eq!(cache.get::<Value>(), None);
  }

  #[test]
  fn test_entry_of_wrong_shape_degrades_to_miss() {
    let (store, _clock, cache) = cache_with(Duration::from_secs(60));
    store.set(KEY, r#"{"data":[1],"timestamp":0}"#).unwrap();

    assert_eq!(cache.get::<Vec<i32>>(), None);
    assert!(store.is_empty());
  }

  #[test]
  fn test_entry_with_extreme_timestamp_degrades_to_miss() {
    let (store, clock, cache) = cache_with(Duration::from_secs(60));
    clock.set(1_000);
    store
      .set(KEY, r#"{"data":[1],"storedAt":-9223372036854775808}"#)
      .unwrap();

    assert_eq!(cache.age(), None);
    assert_eq!(cache.get::<Value>(), None);
    assert!(store.is_empty());
  }

  #[test]
  fn test_clear_is_idempotent() {
    let (store, _clock, cache) = cache_with(Duration::from_secs(60));
    cache.set(&json!([]));
    cache.clear();
    cache.clear();
    assert!(store.is_empty());
    assert_eq!(cache.get::<Value>(), None);
  }

  #[test]
  fn test_storage_failures_are_swallowed() {
    let cache = TtlCache::new(Arc::new(FullStore), KEY, Duration::from_secs(60));
    cache.set(&json!([1]));
    cache.clear();
    assert_eq!(cache.get::<Value>(), None);
    assert_eq!(cache.age(), None);
  }

  #[test]
  fn test_age_reports_without_mutating() {
    let (store, clock, cache) = cache_with(Duration::from_secs(300));
    assert_eq!(cache.age(), None);

    cache.set(&json!([]));
    clock.set(90_000);
    assert_eq!(cache.age(), Some(Duration::from_secs(90)));

    clock.set(300_001);
    assert_eq!(cache.age(), None);
    // Expired entries are only dropped by the read path
    assert!(!store.is_empty());
  }

  #[tokio::test]
  async fn test_fetch_with_calls_network_once() {
    let (_store, clock, cache) = cache_with(Duration::from_secs(120));
    let counter = AtomicU32::new(0);
    let calls = &counter;

    let fetch = move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, String>(json!([{"id": 1}]))
    };

    let first = cache.fetch_with(fetch).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);

    clock.set(60_000);
    let second = cache.fetch_with(fetch).await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, json!([{"id": 1}]));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fetch_with_error_leaves_slot_empty() {
    let (store, _clock, cache) = cache_with(Duration::from_secs(120));

    let result = cache
      .fetch_with(|| async { Err::<Value, _>("boom".to_string()) })
      .await;

    assert_eq!(result.unwrap_err(), "boom");
    assert!(store.is_empty());
  }

  #[test]
  fn test_age_display() {
    assert_eq!(age_display(Duration::from_secs(10)), "just now");
    assert_eq!(age_display(Duration::from_secs(5 * 60)), "5m ago");
    assert_eq!(age_display(Duration::from_secs(90 * 60)), "2h ago");
    assert_eq!(age_display(Duration::from_secs(65 * 60)), "1h ago");
    assert_eq!(age_display(Duration::from_secs(36 * 3600)), "2d ago");
  }
}
