//! Caseload core: client-side data access for a special-education caseload
//! and billing tool.
//!
//! This crate holds the shared, UI-agnostic pieces:
//! - `cache`: TTL-bounded, single-flight `CachedLoader` for reference collections
//! - `sync`: interval-gated, single-flight `SyncGate` for idempotent jobs
//! - `store`: the `RemoteStore` trait, its REST client and the fallback dataset
//! - `roster` / `billing`: per-screen views over the shared caches
//! - `registry`: composition root wiring everything to one store

pub mod billing;
pub mod cache;
pub mod config;
pub mod models;
pub mod registry;
pub mod roster;
pub mod store;
pub mod sync;
pub mod utils;

pub use billing::{ClaimsReader, ClaimsSnapshot};
pub use cache::{CachedData, CachedLoader};
pub use config::{Config, RemoteConfig};
pub use registry::{CacheStatus, Registry, StoreMode};
pub use roster::{Roster, RosterState};
pub use store::{FallbackStore, RemoteStore, RestClient, StoreError};
pub use sync::SyncGate;
