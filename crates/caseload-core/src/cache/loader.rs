//! Single-key memoizing loader with request coalescing.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::CachedData;
use crate::store::StoreError;

type Fetcher<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    generation: u64,
    fetch: SharedFetch<T, E>,
}

struct CacheEntry<T, E> {
    data: Option<CachedData<T>>,
    in_flight: Option<InFlight<T, E>>,
    /// Bumped every time a fetch starts.
    generation: u64,
    /// Bumped by `clear()`; fetches started in an older epoch never write data.
    epoch: u64,
}

impl<T, E> CacheEntry<T, E> {
    fn empty() -> Self {
        Self {
            data: None,
            in_flight: None,
            generation: 0,
            epoch: 0,
        }
    }

    fn fresh(&self, ttl: Duration, now: Instant) -> Option<&CachedData<T>> {
        self.data
            .as_ref()
            .filter(|cached| now.saturating_duration_since(cached.loaded_at) < ttl)
    }
}

fn lock_entry<T, E>(entry: &Mutex<CacheEntry<T, E>>) -> MutexGuard<'_, CacheEntry<T, E>> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record the outcome of the fetch identified by `generation`.
///
/// Data is only written for a success that belongs to the current epoch; the
/// in-flight slot is only released if it still holds this fetch.
fn settle<T: Clone, E>(
    entry: &Mutex<CacheEntry<T, E>>,
    generation: u64,
    epoch: u64,
    result: Option<&Result<T, E>>,
) {
    let mut entry = lock_entry(entry);
    if let Some(Ok(value)) = result {
        if entry.epoch == epoch {
            entry.data = Some(CachedData::new(value.clone()));
        }
    }
    if entry
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.generation == generation)
    {
        entry.in_flight = None;
    }
}

/// A time-boxed, request-deduplicating cache in front of one async fetch.
///
/// At most one fetch is outstanding per loader. Concurrent callers join the
/// outstanding fetch and all observe its result. A failed fetch leaves the last
/// good value in place and is never replayed from the cache.
///
/// The wrapped fetch runs on its own tokio task, so it completes (and populates
/// the cache) even if every caller awaiting it is dropped. There is no timeout:
/// a fetch that never resolves keeps every joiner waiting, so wrap the fetch in
/// `tokio::time::timeout` before handing it over if latency must be bounded.
pub struct CachedLoader<T, E = StoreError> {
    name: &'static str,
    ttl: Duration,
    fetcher: Fetcher<T, E>,
    entry: Arc<Mutex<CacheEntry<T, E>>>,
}

impl<T, E> CachedLoader<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + std::fmt::Display + 'static,
{
    /// Create a loader around `fetcher`. The fetcher is invoked once per cache
    /// miss; it must only build the future, never call back into this loader.
    pub fn new<F, Fut>(name: &'static str, ttl: Duration, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            name,
            ttl,
            fetcher: Arc::new(move || fetcher().boxed()),
            entry: Arc::new(Mutex::new(CacheEntry::empty())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value while it is fresh, otherwise fetch it.
    ///
    /// `force` skips the freshness check but still joins a fetch that is
    /// already running instead of starting a second one.
    pub async fn load(&self, force: bool) -> Result<T, E> {
        let fetch = {
            let mut entry = lock_entry(&self.entry);

            if !force {
                if let Some(cached) = entry.fresh(self.ttl, Instant::now()) {
                    debug!(loader = self.name, "Cache hit");
                    return Ok(cached.data.clone());
                }
            }

            if let Some(in_flight) = &entry.in_flight {
                debug!(loader = self.name, force, "Joining in-flight fetch");
                in_flight.fetch.clone()
            } else {
                self.start_fetch(&mut entry)
            }
        };

        fetch.await
    }

    /// Claim the in-flight slot and spawn the fetch. Runs under the entry lock.
    fn start_fetch(&self, entry: &mut CacheEntry<T, E>) -> SharedFetch<T, E> {
        entry.generation += 1;
        let generation = entry.generation;
        let epoch = entry.epoch;
        debug!(loader = self.name, generation, "Starting fetch");

        let request = (self.fetcher)();
        let state = Arc::clone(&self.entry);
        let name = self.name;
        let task = tokio::spawn(async move {
            let result = request.await;
            if let Err(ref e) = result {
                warn!(loader = name, error = %e, "Fetch failed, keeping last good data");
            }
            settle(&state, generation, epoch, Some(&result));
            result
        });

        let state = Arc::clone(&self.entry);
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(loader = name, error = %e, "Fetch task aborted");
                    settle::<T, E>(&state, generation, epoch, None);
                    Err(E::from(e))
                }
            }
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        fetch
    }

    /// Overwrite the cached value without a round trip, stamping it as fresh.
    ///
    /// An outstanding fetch is left running; whichever finishes last wins.
    pub fn set(&self, value: T) {
        let mut entry = lock_entry(&self.entry);
        entry.data = Some(CachedData::new(value));
        debug!(loader = self.name, "Cache seeded");
    }

    /// Reset to the empty state. The next `load` always fetches, and a fetch
    /// that was running when `clear` was called will not repopulate the cache.
    pub fn clear(&self) {
        let mut entry = lock_entry(&self.entry);
        entry.data = None;
        entry.in_flight = None;
        entry.epoch += 1;
        debug!(loader = self.name, "Cache cleared");
    }

    /// Last successfully loaded value, fresh or not. Never triggers a fetch.
    pub fn peek(&self) -> Option<CachedData<T>> {
        lock_entry(&self.entry).data.clone()
    }

    pub fn is_fresh(&self) -> bool {
        lock_entry(&self.entry)
            .fresh(self.ttl, Instant::now())
            .is_some()
    }

    pub fn is_loading(&self) -> bool {
        lock_entry(&self.entry).in_flight.is_some()
    }

    /// Human-readable age of the cached value, `None` if nothing is cached.
    pub fn age_display(&self) -> Option<String> {
        lock_entry(&self.entry)
            .data
            .as_ref()
            .map(CachedData::age_display)
    }
}

// ============================================================================
// Tests
// ============================================================================
