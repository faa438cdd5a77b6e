//! Interval-gated, single-flight execution of idempotent background jobs.
//!
//! `SyncGate` wraps a side-effecting routine (billing draft generation) so
//! that bursts of callers trigger at most one run, and successful runs are
//! not repeated until a configured interval has passed.

pub mod gate;

pub use gate::SyncGate;
