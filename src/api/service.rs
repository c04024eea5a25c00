//! Resource services: REST CRUD with a read-through cache on the unfiltered listing.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheResult, Clock, KeyValueStore, SystemClock, TtlCache};
use crate::config::CacheConfig;

use super::client::ApiClient;
use super::resource::ResourceKind;
use super::types::{Filters, Owner, Property, Role};
use super::ApiError;

/// CRUD access to one backend resource.
///
/// When a cache is attached, `get_all` reads through it and every
/// successful mutation clears it. Failed mutations leave it alone.
pub struct ResourceService<T, S: KeyValueStore + ?Sized = dyn KeyValueStore> {
  client: ApiClient,
  kind: ResourceKind,
  cache: Option<TtlCache<S>>,
  _records: PhantomData<fn() -> T>,
}

impl<T, S> ResourceService<T, S>
where
  T: Serialize + DeserializeOwned,
  S: KeyValueStore + ?Sized,
{
  pub fn uncached(client: ApiClient, kind: ResourceKind) -> Self {
    Self {
      client,
      kind,
      cache: None,
      _records: PhantomData,
    }
  }

  pub fn cached(client: ApiClient, kind: ResourceKind, cache: TtlCache<S>) -> Self {
    Self {
      client,
      kind,
      cache: Some(cache),
      _records: PhantomData,
    }
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn cache(&self) -> Option<&TtlCache<S>> {
    self.cache.as_ref()
  }

  /// Full listing, tagged with where it came from.
  pub async fn load_all(&self, cancel: &CancellationToken) -> Result<CacheResult<Vec<T>>, ApiError> {
    let path = self.kind.path();
    match self.cache {
      Some(ref cache) => {
        cache
          .fetch_with(|| self.client.list(path, &[], cancel))
          .await
      }
      None => {
        let data = self.client.list(path, &[], cancel).await?;
        Ok(CacheResult::from_network(data))
      }
    }
  }

  /// Full listing, from cache when a valid entry exists.
  pub async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<T>, ApiError> {
    self.load_all(cancel).await.map(|result| result.data)
  }

  /// Filtered listing. Never reads or writes the cache slot, which only
  /// ever holds the unfiltered listing.
  pub async fn get_filtered(
    &self,
    filters: &Filters,
    cancel: &CancellationToken,
  ) -> Result<Vec<T>, ApiError> {
    if filters.is_empty() {
      return self.get_all(cancel).await;
    }
    self
      .client
      .list(self.kind.path(), filters.as_pairs(), cancel)
      .await
  }

  pub async fn get_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<T, ApiError> {
    self.client.fetch(self.kind.path(), id, cancel).await
  }

  /// GET a sub-resource such as `citas-visita/hoy` or `contratos/<id>/resumen`.
  pub async fn get_nested<R: DeserializeOwned>(
    &self,
    segments: &[&str],
    cancel: &CancellationToken,
  ) -> Result<R, ApiError> {
    let mut path = Vec::with_capacity(segments.len() + 1);
    path.push(self.kind.path());
    path.extend_from_slice(segments);
    self.client.get(&path, &[], cancel).await
  }

  /// The listing is cleared as soon as the backend accepts the write, even
  /// when the response body then fails to decode.
  pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<T, ApiError> {
    let accepted = self.client.create(self.kind.path(), body).await?;
    self.invalidate();
    accepted.decode()
  }

  pub async fn update<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<T, ApiError> {
    let accepted = self.client.update(self.kind.path(), id, body).await?;
    self.invalidate();
    accepted.decode()
  }

  /// Delete a record, returning whatever the backend answered with.
  pub async fn delete(&self, id: &str) -> Result<Value, ApiError> {
    let accepted = self.client.delete(self.kind.path(), id).await?;
    self.invalidate();
    accepted.decode()
  }

  /// Drop the cached listing, if this resource has one.
  pub fn invalidate(&self) {
    if let Some(ref cache) = self.cache {
      debug!(resource = %self.kind, "Invalidating cached listing");
      cache.clear();
    }
  }
}

impl<S: KeyValueStore + ?Sized> ResourceService<Owner, S> {
  /// Search owners by CI, names or email, over the (cached) full listing.
  pub async fn search(&self, term: &str, cancel: &CancellationToken) -> Result<Vec<Owner>, ApiError> {
    let owners = self.get_all(cancel).await?;
    Ok(owners.into_iter().filter(|o| o.matches(term)).collect())
  }
}

impl<T, S: KeyValueStore + ?Sized> Clone for ResourceService<T, S> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      kind: self.kind,
      cache: self.cache.clone(),
      _records: PhantomData,
    }
  }
}

/// All resource services, sharing one HTTP client and one cache store.
#[derive(Clone)]
pub struct Services {
  client: ApiClient,
  store: Arc<dyn KeyValueStore>,
  cache_config: CacheConfig,
  clock: Arc<dyn Clock>,
}

impl Services {
  pub fn new(client: ApiClient, store: Arc<dyn KeyValueStore>, cache_config: CacheConfig) -> Self {
    Self {
      client,
      store,
      cache_config,
      clock: Arc::new(SystemClock),
    }
  }

  /// Replace the time source used by every cache slot.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Cache slot for `kind`, or `None` when the resource is uncached or caching is off.
  pub fn cache_for(&self, kind: ResourceKind) -> Option<TtlCache<dyn KeyValueStore>> {
    let ttl = self.cache_config.ttl_for(kind)?;
    Some(TtlCache::new(Arc::clone(&self.store), kind.cache_key(), ttl).with_clock(Arc::clone(&self.clock)))
  }

  /// Service for `kind` with records of type `T`.
  pub fn service<T>(&self, kind: ResourceKind) -> ResourceService<T>
  where
    T: Serialize + DeserializeOwned,
  {
    match self.cache_for(kind) {
      Some(cache) => ResourceService::cached(self.client.clone(), kind, cache),
      None => ResourceService::uncached(self.client.clone(), kind),
    }
  }

  pub fn roles(&self) -> ResourceService<Role> {
    self.service(ResourceKind::Roles)
  }

  pub fn properties(&self) -> ResourceService<Property> {
    self.service(ResourceKind::Properties)
  }

  pub fn owners(&self) -> ResourceService<Owner> {
    self.service(ResourceKind::Owners)
  }

  /// Untyped access, records as raw JSON.
  pub fn raw(&self, kind: ResourceKind) -> ResourceService<Value> {
    self.service(kind)
  }

  /// Load the listings forms pick from, as one batch sharing `cancel`.
  ///
  /// Any failure fails the whole batch; nothing partial is returned.
  pub async fn load_lookups(&self, cancel: &CancellationToken) -> Result<Lookups, ApiError> {
    let (roles, properties, owners) = (self.roles(), self.properties(), self.owners());
    let (roles, properties, owners) = futures::try_join!(
      roles.get_all(cancel),
      properties.get_all(cancel),
      owners.get_all(cancel)
    )?;
    Ok(Lookups {
      roles,
      properties,
      owners,
    })
  }
}

/// Reference data loaded together by `Services::load_lookups`.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
  pub roles: Vec<Role>,
  pub properties: Vec<Property>,
  pub owners: Vec<Owner>,
}
