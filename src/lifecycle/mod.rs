//! Request lifecycle for screens that fetch data.
//!
//! A screen opens a `FetchScope` per effect run: one cancellation token
//! shared by every request of the run, plus a liveness flag. Closing the
//! scope (on unmount or when dependencies change) cancels the token and
//! flips the flag, so late results are dropped instead of applied.
//!
//! `Effect` packages that convention into a reusable helper exposing
//! `{data, loading, error}`.

mod effect;
mod scope;

pub use effect::Effect;
pub use scope::{FetchScope, LivenessGuard, Settled};

/// Errors that can tell an intentional stop apart from a failure.
pub trait Cancellable {
  fn is_cancelled(&self) -> bool;
}

impl Cancellable for color_eyre::Report {
  fn is_cancelled(&self) -> bool {
    self
      .downcast_ref::<crate::api::ApiError>()
      .is_some_and(|e| e.is_cancelled())
  }
}
