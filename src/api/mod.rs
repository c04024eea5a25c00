//! REST client module for the brokerage backend.
//!
//! This module provides the `ApiClient` for talking to the backend and
//! `ResourceService` wrappers that put a TTL cache in front of the
//! slow-changing listings (roles, properties, owners).
//!
//! Reads take a `CancellationToken` and settle with `ApiError::Cancelled`
//! when it fires.

pub mod client;
pub mod error;
pub mod resource;
pub mod service;
pub mod types;

pub use client::{Accepted, ApiClient};
pub use error::ApiError;
pub use resource::ResourceKind;
pub use service::{Lookups, ResourceService, Services};
pub use types::{AppointmentFilter, Filters, Owner, Property, PropertyFilter, Role};
