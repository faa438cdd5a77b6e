//! Reactive roster handles for the view layer.
//!
//! A `Roster` is what a screen holds: it reads a collection through the shared
//! loader, publishes `RosterState` on a watch channel for rendering, and splices
//! local mutations into both its own state and the shared cache so other
//! screens see them without waiting for the TTL to lapse.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::CachedLoader;
use crate::models::{NewStudent, Record, Student, StudentUpdate};
use crate::store::{RemoteStore, StoreError};
use crate::utils::{remove_record, upsert_record};

pub(crate) type CollectionFetch<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, StoreError>> + Send + Sync>;

/// Where a roster reads from.
pub(crate) enum RosterSource<T> {
    /// Shared read-through cache.
    Cached(Arc<CachedLoader<Vec<T>>>),
    /// Straight to the store, used with the fallback dataset.
    Direct(CollectionFetch<T>),
}

/// Snapshot published to subscribers after every change.
#[derive(Debug, Clone)]
pub struct RosterState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for RosterState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            updated_at: None,
        }
    }
}

pub struct Roster<T: Record> {
    name: &'static str,
    source: RosterSource<T>,
    store: Arc<dyn RemoteStore>,
    state: watch::Sender<RosterState<T>>,
}

impl<T: Record> Roster<T> {
    pub(crate) fn new(name: &'static str, source: RosterSource<T>, store: Arc<dyn RemoteStore>) -> Self {
        let (state, _) = watch::channel(RosterState::default());
        Self {
            name,
            source,
            store,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RosterState<T>> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> RosterState<T> {
        self.state.borrow().clone()
    }

    /// Read the collection and publish it.
    ///
    /// On failure the error is published alongside the previous items. If this
    /// roster has nothing to show yet, the last good value from the shared cache
    /// is used instead, however old.
    pub async fn load(&self, force: bool) -> Result<Vec<T>, StoreError> {
        self.state.send_modify(|state| state.loading = true);

        let result = match &self.source {
            RosterSource::Cached(loader) => loader.load(force).await,
            RosterSource::Direct(fetch) => fetch().await,
        };

        match result {
            Ok(items) => {
                debug!(roster = self.name, count = items.len(), "Roster loaded");
                self.state.send_modify(|state| {
                    state.items = items.clone();
                    state.loading = false;
                    state.error = None;
                    state.updated_at = Some(Utc::now());
                });
                Ok(items)
            }
            Err(e) => {
                warn!(roster = self.name, error = %e, "Failed to load roster");
                let stale = match &self.source {
                    RosterSource::Cached(loader) => loader.peek(),
                    RosterSource::Direct(_) => None,
                };
                self.state.send_modify(|state| {
                    if state.items.is_empty() {
                        if let Some(stale) = stale {
                            state.items = stale.data;
                            state.updated_at = Some(stale.cached_at);
                        }
                    }
                    state.loading = false;
                    state.error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    /// Drop the shared cache and fetch again.
    pub async fn refresh(&self) -> Result<Vec<T>, StoreError> {
        if let RosterSource::Cached(loader) = &self.source {
            loader.clear();
        }
        self.load(true).await
    }

    /// Apply `edit` to the current collection and publish the result.
    ///
    /// The shared cache is only updated when it already holds a full snapshot;
    /// seeding it from a roster that never loaded would cache a partial list.
    fn splice(&self, edit: impl FnOnce(&mut Vec<T>)) {
        let base = match &self.source {
            RosterSource::Cached(loader) => loader.peek().map(|cached| cached.data),
            RosterSource::Direct(_) => None,
        };
        let seed_cache = base.is_some();

        let mut snapshot = Vec::new();
        self.state.send_modify(|state| {
            if let Some(base) = base {
                state.items = base;
            }
            edit(&mut state.items);
            state.error = None;
            state.updated_at = Some(Utc::now());
            snapshot = state.items.clone();
        });

        if let (RosterSource::Cached(loader), true) = (&self.source, seed_cache) {
            loader.set(snapshot);
        }
    }

    fn publish_error(&self, error: &StoreError) {
        let message = error.to_string();
        self.state.send_modify(|state| state.error = Some(message));
    }
}

impl Roster<Student> {
    pub async fn create(&self, student: &NewStudent) -> Result<Student, StoreError> {
        match self.store.create_student(student).await {
            Ok(created) => {
                self.splice(|items| upsert_record(items, created.clone()));
                Ok(created)
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    pub async fn update(&self, id: &str, update: &StudentUpdate) -> Result<Student, StoreError> {
        match self.store.update_student(id, update).await {
            Ok(updated) => {
                self.splice(|items| upsert_record(items, updated.clone()));
                Ok(updated)
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self.store.delete_student(id).await {
            Ok(()) => {
                self.splice(|items| {
                    remove_record(items, id);
                });
                Ok(())
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
