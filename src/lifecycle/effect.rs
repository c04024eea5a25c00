//! Dependency-keyed data fetching for screens.
//!
//! An `Effect<D, T, E>` owns a fetcher closure and the dependencies it was
//! last run with. Mounting starts a run; changing the dependencies closes
//! the running scope and starts a new one; unmounting closes the scope for
//! good. Results flow back over a channel and are applied by `poll()` (from
//! a tick loop) or `changed().await`.
//!
//! # Example
//!
//! ```ignore
//! let props = services.properties();
//! let mut effect = Effect::new(PropertyFilter::default(), move |filter, cancel| {
//!   let props = props.clone();
//!   let filters = Filters::from(filter);
//!   async move { props.get_filtered(&filters, &cancel).await }
//! });
//!
//! effect.mount();
//! while effect.is_loading() {
//!   effect.changed().await;
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{Cancellable, FetchScope, Settled};

/// A boxed future resolving to the fetch result
type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// A factory creating one fetch per run
type FetcherFn<D, T, E> = Box<dyn Fn(&D, CancellationToken) -> BoxFuture<T, E> + Send + Sync>;

pub struct Effect<D, T, E> {
  fetcher: FetcherFn<D, T, E>,
  deps: D,
  data: T,
  loading: bool,
  error: Option<String>,
  error_reported: bool,
  mounted: bool,
  scope: Option<FetchScope>,
  receiver: Option<mpsc::UnboundedReceiver<Settled<T, E>>>,
}

impl<D, T, E> Effect<D, T, E>
where
  D: PartialEq,
  T: Default + Send + 'static,
  E: Cancellable + Display + Send + 'static,
{
  /// Create an unmounted effect. `data` starts at `T::default()`.
  ///
  /// The fetcher receives the current dependencies and the token of the
  /// run; every request it issues should observe that token.
  pub fn new<F, Fut>(deps: D, fetcher: F) -> Self
  where
    F: Fn(&D, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    Self {
      fetcher: Box::new(move |deps, cancel| Box::pin(fetcher(deps, cancel))),
      deps,
      data: T::default(),
      loading: false,
      error: None,
      error_reported: false,
      mounted: false,
      scope: None,
      receiver: None,
    }
  }

  pub fn data(&self) -> &T {
    &self.data
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// Message of the last failure, if the latest run failed.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Hand out the failure message once, for a one-shot notification.
  pub fn take_error(&mut self) -> Option<String> {
    if self.error_reported {
      return None;
    }
    let message = self.error.clone()?;
    self.error_reported = true;
    Some(message)
  }

  pub fn deps(&self) -> &D {
    &self.deps
  }

  pub fn is_mounted(&self) -> bool {
    self.mounted
  }

  /// Start the first run. No-op when already mounted.
  pub fn mount(&mut self) {
    if self.mounted {
      return;
    }
    self.mounted = true;
    self.start();
  }

  /// Replace the dependencies, restarting only when they changed.
  ///
  /// Returns `true` when a new run was started.
  pub fn set_deps(&mut self, deps: D) -> bool {
    if self.deps == deps {
      return false;
    }
    self.deps = deps;
    if !self.mounted {
      return false;
    }
    self.start();
    true
  }

  /// Supersede any pending run with a fresh one.
  pub fn refetch(&mut self) {
    if self.mounted {
      self.start();
    }
  }

  /// Close the scope. Pending results are dropped silently.
  pub fn unmount(&mut self) {
    self.mounted = false;
    self.loading = false;
    self.teardown();
  }

  /// Apply a pending result without blocking.
  ///
  /// Returns `true` if the state changed. Call this from a tick loop.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(settled) => self.apply(Some(settled)),
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => self.apply(None),
    }
  }

  /// Wait for the pending run to settle and apply it.
  ///
  /// Returns `false` immediately when nothing is pending.
  pub async fn changed(&mut self) -> bool {
    let settled = match &mut self.receiver {
      Some(rx) => rx.recv().await,
      None => return false,
    };
    self.apply(settled)
  }

  fn apply(&mut self, settled: Option<Settled<T, E>>) -> bool {
    self.receiver = None;
    self.loading = false;

    match settled {
      Some(Settled::Ready(data)) => {
        self.data = data;
        self.error = None;
      }
      Some(Settled::Failed(e)) => {
        error!("Fetch failed: {}", e);
        self.data = T::default();
        self.error = Some(e.to_string());
        self.error_reported = false;
      }
      // Cancelled while live, or the task went away without a result
      Some(Settled::Discarded) | None => {
        debug!("Fetch ended without a result");
      }
    }
    true
  }

  fn start(&mut self) {
    // At most one outstanding run: close the previous one first
    self.teardown();

    let scope = FetchScope::open();
    let guard = scope.guard();
    let (tx, rx) = mpsc::unbounded_channel();
    let future = (self.fetcher)(&self.deps, scope.token());

    tokio::spawn(async move {
      let settled = guard.settle(future.await);
      if matches!(settled, Settled::Discarded) && !guard.is_live() {
        return;
      }
      // Receiver may already be gone
      let _ = tx.send(settled);
    });

    self.scope = Some(scope);
    self.receiver = Some(rx);
    self.loading = true;
  }

  fn teardown(&mut self) {
    if let Some(scope) = self.scope.take() {
      scope.close();
    }
    self.receiver = None;
  }
}

impl<D: std::fmt::Debug, T: std::fmt::Debug, E> std::fmt::Debug for Effect<D, T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Effect")
      .field("deps", &self.deps)
      .field("data", &self.data)
      .field("loading", &self.loading)
      .field("error", &self.error)
      .field("mounted", &self.mounted)
      .finish_non_exhaustive()
  }
}
