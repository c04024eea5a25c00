use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Cancellable;

/// Outcome of a request as seen by the screen that issued it.
#[derive(Debug)]
pub enum Settled<T, E> {
  /// Result arrived while the scope was live
  Ready(T),
  /// Genuine failure while the scope was live
  Failed(E),
  /// Cancelled, or arrived after the scope closed. Nothing to do.
  Discarded,
}

/// One effect run: a cancellation token plus a liveness flag.
///
/// Closing happens exactly once, either through `close()` or on drop.
#[derive(Debug)]
pub struct FetchScope {
  token: CancellationToken,
  live: Arc<AtomicBool>,
}

impl FetchScope {
  pub fn open() -> Self {
    Self {
      token: CancellationToken::new(),
      live: Arc::new(AtomicBool::new(true)),
    }
  }

  /// Token to pass to every request of this run.
  pub fn token(&self) -> CancellationToken {
    self.token.clone()
  }

  /// Read side of the liveness flag for spawned work.
  pub fn guard(&self) -> LivenessGuard {
    LivenessGuard {
      live: Arc::clone(&self.live),
    }
  }

  pub fn is_live(&self) -> bool {
    self.live.load(Ordering::SeqCst)
  }

  /// Mark the scope dead, then cancel in-flight requests.
  pub fn close(&self) {
    if self.live.swap(false, Ordering::SeqCst) {
      self.token.cancel();
    }
  }
}

impl Drop for FetchScope {
  fn drop(&mut self) {
    self.close();
  }
}

/// Cloneable view of a scope's liveness.
#[derive(Debug, Clone)]
pub struct LivenessGuard {
  live: Arc<AtomicBool>,
}

impl LivenessGuard {
  pub fn is_live(&self) -> bool {
    self.live.load(Ordering::SeqCst)
  }

  /// Classify a finished request.
  ///
  /// Anything arriving after close is discarded without logging, and a
  /// cancellation-kind error is never a failure.
  pub fn settle<T, E: Cancellable>(&self, result: Result<T, E>) -> Settled<T, E> {
    if !self.is_live() {
      return Settled::Discarded;
    }
    match result {
      Ok(data) => Settled::Ready(data),
      Err(e) if e.is_cancelled() => {
        debug!("Request cancelled");
        Settled::Discarded
      }
      Err(e) => Settled::Failed(e),
    }
  }
}
