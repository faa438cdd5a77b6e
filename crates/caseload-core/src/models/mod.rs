//! Data models for case-management records.
//!
//! This module contains the rows read from the remote store:
//!
//! - `Student`, `Teacher`: roster records with create/update payloads
//! - `Authorization`: payer authorizations for billable services
//! - `BillingClaim`: billing drafts and claims generated from sessions

pub mod billing;
pub mod person;

pub use billing::{Authorization, BillingClaim, ClaimStatus, ServiceInfo, StudentRef};
pub use person::{NewStudent, Student, StudentUpdate, Teacher};

/// A row that can live in a cached, name-ordered collection snapshot.
pub trait Record: Clone + Send + Sync + 'static {
    /// Primary key.
    fn id(&self) -> &str;

    /// Natural ordering key of the collection.
    fn sort_key(&self) -> &str;
}
