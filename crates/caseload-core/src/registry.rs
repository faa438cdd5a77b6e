//! Composition root for the data-access layer.
//!
//! The registry is built once at startup and owns one `CachedLoader` per
//! reference collection and one `SyncGate` for billing draft generation. They
//! live as long as the registry; screens get cheap `Roster`/`ClaimsReader`
//! handles that share them.
//!
//! When no remote store is configured the registry runs against
//! `FallbackStore` and rosters read it directly, bypassing the caches.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use crate::billing::ClaimsReader;
use crate::cache::{format_age_minutes, CachedLoader};
use crate::config::Config;
use crate::models::{Authorization, Record, Student, Teacher};
use crate::roster::{CollectionFetch, Roster, RosterSource};
use crate::store::{FallbackStore, RemoteStore, RestClient, StoreError};
use crate::sync::SyncGate;

/// Which store the registry is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Remote,
    Fallback,
}

struct Collection<T> {
    loader: Arc<CachedLoader<Vec<T>>>,
    fetch: CollectionFetch<T>,
}

impl<T: Record> Collection<T> {
    fn new<F>(name: &'static str, config: &Config, store: &Arc<dyn RemoteStore>, list: F) -> Self
    where
        F: for<'a> Fn(&'a dyn RemoteStore) -> BoxFuture<'a, Result<Vec<T>, StoreError>>
            + Send
            + Sync
            + 'static,
    {
        let store = Arc::clone(store);
        let list = Arc::new(list);
        let fetch: CollectionFetch<T> = Arc::new(move || {
            let store = Arc::clone(&store);
            let list = Arc::clone(&list);
            async move { list(store.as_ref()).await }.boxed()
        });

        let loader_fetch = Arc::clone(&fetch);
        let loader = Arc::new(CachedLoader::new(name, config.cache_ttl(), move || {
            loader_fetch()
        }));

        Self { loader, fetch }
    }

    fn source(&self, mode: StoreMode) -> RosterSource<T> {
        match mode {
            StoreMode::Remote => RosterSource::Cached(Arc::clone(&self.loader)),
            StoreMode::Fallback => RosterSource::Direct(Arc::clone(&self.fetch)),
        }
    }
}

/// Per-collection cache ages for status display.
#[derive(Debug, Default, Clone)]
pub struct CacheStatus {
    pub students: Option<String>,
    pub teachers: Option<String>,
    pub authorizations: Option<String>,
    pub last_draft_sync: Option<String>,
}

impl CacheStatus {
    pub fn draft_sync_age(&self) -> String {
        self.last_draft_sync
            .clone()
            .unwrap_or_else(|| "never".to_string())
    }
}

pub struct Registry {
    mode: StoreMode,
    store: Arc<dyn RemoteStore>,
    students: Collection<Student>,
    teachers: Collection<Teacher>,
    authorizations: Collection<Authorization>,
    drafts: Arc<SyncGate>,
}

impl Registry {
    /// Wire the registry to the store described by `config`, falling back to
    /// the static dataset when the remote store is not configured.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        match config.remote() {
            Some(remote) => {
                info!(url = %remote.url, "Using remote store");
                let client = RestClient::new(&remote)?;
                Ok(Self::new(Arc::new(client), StoreMode::Remote, config))
            }
            None => {
                info!("Remote store not configured, using fallback dataset");
                Ok(Self::new(
                    Arc::new(FallbackStore::new()),
                    StoreMode::Fallback,
                    config,
                ))
            }
        }
    }

    pub fn new(store: Arc<dyn RemoteStore>, mode: StoreMode, config: &Config) -> Self {
        debug!(
            ?mode,
            ttl_secs = config.cache_ttl().as_secs(),
            sync_interval_secs = config.draft_sync_interval().as_secs(),
            "Building registry"
        );

        let students = Collection::new("students", config, &store, |s| s.list_students());
        let teachers = Collection::new("teachers", config, &store, |s| s.list_teachers());
        let authorizations =
            Collection::new("authorizations", config, &store, |s| s.list_authorizations());

        let gate_store = Arc::clone(&store);
        let drafts = Arc::new(SyncGate::new(
            "billing-drafts",
            config.draft_sync_interval(),
            move || {
                let store = Arc::clone(&gate_store);
                async move { store.generate_billing_drafts().await }
            },
        ));

        Self {
            mode,
            store,
            students,
            teachers,
            authorizations,
            drafts,
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn students(&self) -> Roster<Student> {
        Roster::new("students", self.students.source(self.mode), Arc::clone(&self.store))
    }

    pub fn teachers(&self) -> Roster<Teacher> {
        Roster::new("teachers", self.teachers.source(self.mode), Arc::clone(&self.store))
    }

    pub fn authorizations(&self) -> Roster<Authorization> {
        Roster::new(
            "authorizations",
            self.authorizations.source(self.mode),
            Arc::clone(&self.store),
        )
    }

    pub fn claims(&self) -> ClaimsReader {
        ClaimsReader::new(Arc::clone(&self.store), Arc::clone(&self.drafts))
    }

    pub fn students_loader(&self) -> &Arc<CachedLoader<Vec<Student>>> {
        &self.students.loader
    }

    pub fn teachers_loader(&self) -> &Arc<CachedLoader<Vec<Teacher>>> {
        &self.teachers.loader
    }

    pub fn authorizations_loader(&self) -> &Arc<CachedLoader<Vec<Authorization>>> {
        &self.authorizations.loader
    }

    pub fn draft_sync(&self) -> &Arc<SyncGate> {
        &self.drafts
    }

    /// Drop every cached collection (e.g. after switching accounts).
    pub fn clear_all(&self) {
        self.students.loader.clear();
        self.teachers.loader.clear();
        self.authorizations.loader.clear();
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            students: self.students.loader.age_display(),
            teachers: self.teachers.loader.age_display(),
            authorizations: self.authorizations.loader.age_display(),
            last_draft_sync: self.drafts.last_run_at().map(|at| {
                format_age_minutes((chrono::Utc::now() - at).num_minutes())
            }),
        }
    }
}
