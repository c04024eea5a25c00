//! Persisted time-to-live cache for slow-changing reference data.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Keeps one JSON slot per resource type in a `KeyValueStore`
//! - Expires slots by elapsed time, dropping them lazily on read
//! - Degrades every storage or decoding failure to a cache miss

mod clock;
mod storage;
mod traits;
mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use storage::{KeyValueStore, MemoryStore, NoopStore, SqliteStore};
pub use traits::{CacheEntry, CacheResult, CacheSource};
pub use ttl::{age_display, TtlCache};
