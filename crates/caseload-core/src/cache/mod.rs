//! In-memory read-through caching for slow-changing reference collections.
//!
//! This module provides `CachedLoader`, a generic single-key loader that
//! memoizes one async fetch for a time-to-live window and coalesces
//! concurrent callers onto a single outstanding request.
//!
//! Cache state lives only as long as the loader; nothing is persisted.

pub mod loader;

pub use loader::CachedLoader;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A successfully loaded value and when it was loaded.
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Monotonic load time used for TTL checks.
    pub(crate) loaded_at: Instant,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            loaded_at: Instant::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        format_age_minutes(self.age_minutes())
    }
}

/// Render an age in minutes as "just now", "5m ago", "2h ago" or "3d ago".
/// Hours and days round up from the half mark.
pub fn format_age_minutes(minutes: i64) -> String {
    match minutes {
        // Negative ages come from clock skew
        i64::MIN..=0 => "just now".to_string(),
        1..=59 => format!("{}m ago", minutes),
        60..=1439 => {
            let hours = minutes / 60 + i64::from(minutes % 60 >= 30);
            format!("{}h ago", hours)
        }
        _ => {
            let days = minutes / 1440 + i64::from(minutes % 1440 >= 720);
            format!("{}d ago", days)
        }
    }
}
