//! Remote data store access.
//!
//! The loaders and the billing gate only ever see the `RemoteStore` trait:
//! full-snapshot reads of each collection, single-record mutations, and the
//! idempotent billing draft generation job.
//!
//! - `RestClient`: PostgREST-over-HTTP implementation for the hosted database
//! - `FallbackStore`: deterministic in-memory dataset used when no remote
//!   store is configured

pub mod client;
pub mod error;
pub mod fallback;

pub use client::RestClient;
pub use error::StoreError;
pub use fallback::FallbackStore;

use async_trait::async_trait;

use crate::models::{Authorization, BillingClaim, NewStudent, Student, StudentUpdate, Teacher};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All students, ordered by name.
    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;

    /// All teachers, ordered by name.
    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError>;

    /// All authorizations, ordered by authorization number.
    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError>;

    /// All billing claims, newest session first.
    async fn list_claims(&self) -> Result<Vec<BillingClaim>, StoreError>;

    async fn create_student(&self, student: &NewStudent) -> Result<Student, StoreError>;

    async fn update_student(&self, id: &str, update: &StudentUpdate) -> Result<Student, StoreError>;

    async fn delete_student(&self, id: &str) -> Result<(), StoreError>;

    /// Upsert a draft claim for every completed session that lacks one.
    /// Safe to call repeatedly.
    async fn generate_billing_drafts(&self) -> Result<(), StoreError>;
}
