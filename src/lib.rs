//! Client library for the real-estate brokerage backend.
//!
//! - `api`: REST client, typed records and per-resource services
//! - `cache`: TTL cache over a pluggable key/value store
//! - `lifecycle`: cancellable fetch scopes and the `Effect` helper
//! - `config`: YAML configuration and the API token
//! - `logging`: tracing subscriber setup (stderr plus optional file)

pub mod api;
pub mod cache;
pub mod config;
pub mod lifecycle;
pub mod logging;
