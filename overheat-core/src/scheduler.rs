//! Fixed-interval driver for a [`RunCycle`].
//!
//! At most one cycle runs at a time. A scheduled tick that finds a cycle in
//! flight is skipped; a manual trigger waits for the in-flight cycle and then
//! runs. With [`Scheduler::with_lock_dir`] the exclusion extends to every
//! process sharing the data directory, through an advisory lock on
//! [`LOCK_FILE`].

use crate::{
    cycle::{CycleReport, RunCycle},
    error::{CycleError, SchedulerError, StoreError},
};
use fd_lock::RwLock as FileLock;
use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error, info, warn};

/// Lock file held for the duration of every cycle.
pub const LOCK_FILE: &str = "cycle.lock";

/// How often a queued trigger re-checks a lock held by another process.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What a scheduled tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed,
    /// Another cycle was still running.
    Skipped,
}

/// In-process run guard, optionally carrying the cross-process lock file.
type RunGuard = Mutex<Option<FileLock<File>>>;

pub struct Scheduler {
    cycle: Arc<dyn RunCycle>,
    running: Arc<RunGuard>,
    started: AtomicBool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn log_outcome(result: Result<CycleReport, CycleError>) -> TickOutcome {
    match result {
        Ok(report) => {
            if !report.warnings.is_empty() {
                warn!(warnings = ?report.warnings, "cycle completed with persistence warnings");
            }
            TickOutcome::Completed
        }
        Err(CycleError::Busy) => {
            warn!("previous check cycle still running, skipping tick");
            TickOutcome::Skipped
        }
        Err(error) => {
            error!(%error, "scheduled check cycle failed, next tick will retry");
            TickOutcome::Failed
        }
    }
}

/// Run `cycle` while holding the run guard and, if configured, the lock file.
///
/// With `queue` the call waits for both; otherwise it returns
/// [`CycleError::Busy`] as soon as either is held elsewhere.
async fn run_exclusive(
    cycle: &dyn RunCycle,
    running: &RunGuard,
    queue: bool,
) -> Result<CycleReport, CycleError> {
    let mut local = if queue {
        running.lock().await
    } else {
        running.try_lock().map_err(|_| CycleError::Busy)?
    };

    let Some(lock_file) = local.as_mut() else {
        return cycle.run().await;
    };

    let _held = loop {
        match lock_file.try_write() {
            Ok(held) => break held,
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                if !queue {
                    return Err(CycleError::Busy);
                }
                debug!("check cycle running in another process, waiting");
                tokio::time::sleep(LOCK_POLL_INTERVAL).await;
            }
            Err(error) => return Err(CycleError::Lock(error)),
        }
    };

    cycle.run().await
}

async fn tick(cycle: &dyn RunCycle, running: &RunGuard) -> TickOutcome {
    log_outcome(run_exclusive(cycle, running, false).await)
}

impl Scheduler {
    pub fn new(cycle: Arc<dyn RunCycle>) -> Self {
        Self {
            cycle,
            running: Arc::new(Mutex::new(None)),
            started: AtomicBool::new(false),
        }
    }

    /// Also exclude cycles of other processes using `dir`, by holding an
    /// advisory lock on `dir/cycle.lock` for the whole cycle.
    pub fn with_lock_dir(mut self, dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StoreError::Write { path, source })?;

        self.running = Arc::new(Mutex::new(Some(FileLock::new(file))));
        Ok(self)
    }

    /// Run one cycle now, queued strictly behind any in-flight cycle.
    pub async fn trigger(&self) -> Result<CycleReport, CycleError> {
        info!("manual check triggered");
        run_exclusive(self.cycle.as_ref(), &self.running, true).await
    }

    /// Run one cycle unless another is in flight.
    pub async fn try_tick(&self) -> TickOutcome {
        tick(self.cycle.as_ref(), &self.running).await
    }

    /// Start ticking every `period`, first tick one period from now.
    ///
    /// A scheduler can be started once.
    pub fn start(&self, period: Duration) -> Result<SchedulerHandle, SchedulerError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SchedulerError::AlreadyStarted);
        }

        let cycle = Arc::clone(&self.cycle);
        let running = Arc::clone(&self.running);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = period.as_secs(), "scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick(cycle.as_ref(), &running).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("scheduler stopped");
        });

        Ok(SchedulerHandle {
            stop_tx,
            task: Some(task),
        })
    }
}

/// Handle to a started [`Scheduler`]. Dropping it stops the scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop ticking after any in-flight cycle completes. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stop and wait for the scheduler task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                error!(%error, "scheduler task panicked");
            }
        }
    }
}
