//! Utility functions for keeping collection snapshots ordered.

pub mod order;

pub use order::{cmp_ignore_case, remove_record, sort_records, upsert_record};
