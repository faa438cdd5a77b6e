//! Interval-gated single-flight runner for idempotent routines.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::store::StoreError;

type Routine<E> = Arc<dyn Fn() -> BoxFuture<'static, Result<(), E>> + Send + Sync>;
type SharedRun<E> = Shared<BoxFuture<'static, Result<(), E>>>;

struct Running<E> {
    generation: u64,
    run: SharedRun<E>,
}

struct GateState<E> {
    /// End of the last successful run (monotonic clock).
    last_run_at: Option<Instant>,
    /// Same moment on the wall clock, for display.
    last_run_wall: Option<DateTime<Utc>>,
    running: Option<Running<E>>,
    generation: u64,
}

fn lock_state<E>(state: &Mutex<GateState<E>>) -> MutexGuard<'_, GateState<E>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish<E>(state: &Mutex<GateState<E>>, generation: u64, succeeded: bool) {
    let mut state = lock_state(state);
    if succeeded {
        state.last_run_at = Some(Instant::now());
        state.last_run_wall = Some(Utc::now());
    }
    if state
        .running
        .as_ref()
        .is_some_and(|running| running.generation == generation)
    {
        state.running = None;
    }
}

/// Runs an idempotent routine at most once per interval, never concurrently.
///
/// Every caller that arrives while a run is in progress (forced or not) awaits
/// that run and receives its outcome. The interval is measured from the end of
/// the last successful run; a failed run does not count, so the next call is
/// eligible to retry immediately.
pub struct SyncGate<E = StoreError> {
    name: &'static str,
    interval: Duration,
    routine: Routine<E>,
    state: Arc<Mutex<GateState<E>>>,
}

impl<E> SyncGate<E>
where
    E: Clone + Send + Sync + From<JoinError> + std::fmt::Display + 'static,
{
    pub fn new<F, Fut>(name: &'static str, interval: Duration, routine: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            name,
            interval,
            routine: Arc::new(move || routine().boxed()),
            state: Arc::new(Mutex::new(GateState {
                last_run_at: None,
                last_run_wall: None,
                running: None,
                generation: 0,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the routine unless it ran successfully within the interval.
    ///
    /// `force` skips the interval check but never starts a second concurrent run.
    pub async fn run_gated(&self, force: bool) -> Result<(), E> {
        let run = {
            let mut state = lock_state(&self.state);

            if let Some(running) = &state.running {
                debug!(gate = self.name, force, "Joining running sync");
                running.run.clone()
            } else if !force && self.within_interval(&state) {
                debug!(gate = self.name, "Sync skipped, last run is recent");
                return Ok(());
            } else {
                self.start_run(&mut state)
            }
        };

        run.await
    }

    fn within_interval(&self, state: &GateState<E>) -> bool {
        state
            .last_run_at
            .is_some_and(|at| Instant::now().saturating_duration_since(at) < self.interval)
    }

    /// Claim the running slot and spawn the routine. Runs under the state lock.
    fn start_run(&self, state: &mut GateState<E>) -> SharedRun<E> {
        state.generation += 1;
        let generation = state.generation;
        debug!(gate = self.name, generation, "Starting sync");

        let routine = (self.routine)();
        let shared_state = Arc::clone(&self.state);
        let name = self.name;
        let task = tokio::spawn(async move {
            let result = routine.await;
            match result {
                Ok(()) => info!(gate = name, "Sync completed"),
                Err(ref e) => warn!(gate = name, error = %e, "Sync failed"),
            }
            finish(&shared_state, generation, result.is_ok());
            result
        });

        let shared_state = Arc::clone(&self.state);
        let run = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(gate = name, error = %e, "Sync task aborted");
                    finish(&shared_state, generation, false);
                    Err(E::from(e))
                }
            }
        }
        .boxed()
        .shared();

        state.running = Some(Running {
            generation,
            run: run.clone(),
        });
        run
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.state).running.is_some()
    }

    /// Wall-clock end of the last successful run.
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        lock_state(&self.state).last_run_wall
    }

    /// Whether an unforced call would start a run right now.
    pub fn is_due(&self) -> bool {
        let state = lock_state(&self.state);
        state.running.is_none() && !self.within_interval(&state)
    }
}

// ============================================================================
// Tests
// ============================================================================
