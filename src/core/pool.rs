//! Queueless worker pool: direct hand-off admission over a bounded set of
//! lazily created worker threads.
//!
//! There is no task queue anywhere in this module. A submitted task is
//! either placed into a rendezvous cell for a worker that is
//! already parked waiting, or it becomes the initial assignment of a
//! freshly created worker. When neither is possible the admission policy
//! decides: block the submitter until capacity frees up, or delegate to a
//! hand-off executor, or reject.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` around [`PoolCore`] is the consistency
//!   boundary for every admission decision (lifecycle, live/idle counts,
//!   the rendezvous cells)
//! - Two `Condvar`s: `worker_cv` parks idle workers (woken by hand-off or
//!   stop, timed out by keep-alive), `submit_cv` parks blocked submitters
//!   (woken when a worker goes idle, retires, or the pool stops)
//! - No polling: every wait is notification-driven
//! - Clean shutdown: lifecycle flips before any join, so concurrent
//!   submitters fail fast while workers drain

use std::collections::VecDeque;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::PoolRecord;
use crate::core::error::{BindError, HandoffRejected, PoolError, ValidationError};
use crate::core::factory::ThreadFactory;
use crate::core::handoff::{HandoffExecutor, Task};

/// How long `stop` waits for each worker before detaching it.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What a saturated pool does with a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Suspend the submitting thread until a worker frees up.
    Block,
    /// Forward to the bound hand-off executor, or reject when none is bound.
    DelegateOrReject,
}

/// Lifecycle of the pool service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Created but not started; submissions fail as unavailable.
    Down,
    /// Start in progress, dependencies being checked.
    Starting,
    /// Accepting submissions.
    Up,
    /// Stop requested; workers draining, submissions fail as unavailable.
    Stopping,
}

/// How a submission was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Handed directly to a worker that was parked idle.
    Direct,
    /// Became the initial assignment of a freshly created worker.
    NewWorker,
    /// Accepted after the submitter blocked for capacity (blocking policy).
    AfterWait,
    /// Forwarded to the hand-off executor (delegate policy).
    Delegated,
}

/// Snapshot of pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Worker threads currently alive (busy or idle).
    pub live_workers: usize,
    /// Worker threads currently parked waiting for work.
    pub idle_workers: usize,
    /// Tasks accepted by this pool's own workers.
    pub submitted_tasks: u64,
    /// Tasks that ran to completion.
    pub completed_tasks: u64,
    /// Tasks that panicked while running.
    pub failed_tasks: u64,
    /// Tasks forwarded to the hand-off executor.
    pub delegated_tasks: u64,
    /// Submissions rejected at admission (saturated or hand-off refusal).
    pub rejected_tasks: u64,
}

/// Lock-free task counters backing `PoolStats` totals.
#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    delegated: AtomicU64,
    rejected: AtomicU64,
}

/// Mutable pool state; every field is guarded by the single core mutex.
struct PoolCore {
    lifecycle: PoolState,
    /// Worker threads alive, including busy ones. Never exceeds the bound.
    live: usize,
    /// Workers parked in the rendezvous wait.
    idle: usize,
    /// In-flight hand-offs. Invariant: never longer than `idle`, so every
    /// entry has a parked worker committed to take it; this is what keeps
    /// the pool queueless.
    handoffs: VecDeque<Task>,
    workers: Vec<JoinHandle<()>>,
}

/// State shared between the pool handle and its worker threads.
struct PoolShared {
    name: String,
    max_threads: usize,
    keep_alive: Duration,
    policy: AdmissionPolicy,
    core: Mutex<PoolCore>,
    /// Parks idle workers; notified on hand-off and on stop.
    worker_cv: Condvar,
    /// Parks blocked submitters; notified when a worker goes idle,
    /// retires, or the pool stops.
    submit_cv: Condvar,
    counters: PoolCounters,
}

/// A bounded, queueless worker pool.
///
/// Constructed `Down` from a validated [`PoolRecord`] (or directly via
/// [`QueuelessPool::new`]), wired with a [`ThreadFactory`] and optionally a
/// [`HandoffExecutor`], then started. Workers are created lazily by
/// admission, up to `max_threads`, and retire after `keep_alive` idle time,
/// down to zero.
pub struct QueuelessPool {
    shared: Arc<PoolShared>,
    thread_factory: Mutex<Option<Arc<dyn ThreadFactory>>>,
    handoff: Mutex<Option<Arc<dyn HandoffExecutor>>>,
}

impl std::fmt::Debug for QueuelessPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuelessPool")
            .field("name", &self.shared.name)
            .field("max_threads", &self.shared.max_threads)
            .field("keep_alive", &self.shared.keep_alive)
            .finish_non_exhaustive()
    }
}

impl QueuelessPool {
    /// Create a pool in the `Down` state.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `max_threads` is zero; the bound
    /// is validated here as well as at resolution so directly constructed
    /// pools honor the same invariant.
    pub fn new(
        name: impl Into<String>,
        max_threads: usize,
        keep_alive: Duration,
        policy: AdmissionPolicy,
    ) -> Result<Self, ValidationError> {
        if max_threads == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max-threads",
                constraint: "must be greater than zero",
            });
        }
        Ok(Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                max_threads,
                keep_alive,
                policy,
                core: Mutex::new(PoolCore {
                    lifecycle: PoolState::Down,
                    live: 0,
                    idle: 0,
                    handoffs: VecDeque::new(),
                    workers: Vec::new(),
                }),
                worker_cv: Condvar::new(),
                submit_cv: Condvar::new(),
                counters: PoolCounters::default(),
            }),
            thread_factory: Mutex::new(None),
            handoff: Mutex::new(None),
        })
    }

    /// Create a pool from a validated configuration record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the record's bound is invalid.
    pub fn from_record(record: &PoolRecord) -> Result<Self, ValidationError> {
        let policy = if record.blocking {
            AdmissionPolicy::Block
        } else {
            AdmissionPolicy::DelegateOrReject
        };
        Self::new(&record.name, record.max_threads, record.keep_alive, policy)
    }

    /// The pool's service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The admission policy fixed at construction.
    #[must_use]
    pub fn policy(&self) -> AdmissionPolicy {
        self.shared.policy
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.shared.core.lock().lifecycle
    }

    /// Bind the thread factory. Called exactly once, before start.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::AlreadyInjected`] on a second bind.
    pub fn bind_thread_factory(&self, factory: Arc<dyn ThreadFactory>) -> Result<(), BindError> {
        let mut slot = self.thread_factory.lock();
        if slot.is_some() {
            return Err(BindError::AlreadyInjected {
                service: self.shared.name.clone(),
                dependency: "thread-factory".into(),
            });
        }
        *slot = Some(factory);
        Ok(())
    }

    /// Bind the hand-off executor. Only valid for delegate-or-reject pools,
    /// and only once.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::UnusableDependency`] for blocking pools and
    /// [`BindError::AlreadyInjected`] on a second bind.
    pub fn bind_handoff_executor(
        &self,
        executor: Arc<dyn HandoffExecutor>,
    ) -> Result<(), BindError> {
        if self.shared.policy == AdmissionPolicy::Block {
            return Err(BindError::UnusableDependency {
                service: self.shared.name.clone(),
                dependency: "handoff-executor".into(),
            });
        }
        let mut slot = self.handoff.lock();
        if slot.is_some() {
            return Err(BindError::AlreadyInjected {
                service: self.shared.name.clone(),
                dependency: "handoff-executor".into(),
            });
        }
        *slot = Some(executor);
        Ok(())
    }

    /// Transition `Down` → `Starting` → `Up`.
    ///
    /// Workers are created lazily by admission, so start only has to check
    /// that the required thread factory was bound.
    ///
    /// # Errors
    ///
    /// [`BindError::MissingThreadFactory`] when no factory was bound,
    /// [`BindError::AlreadyStarted`] when the pool already left `Down`.
    pub fn start(&self) -> Result<(), BindError> {
        if self.thread_factory.lock().is_none() {
            return Err(BindError::MissingThreadFactory(self.shared.name.clone()));
        }
        let mut core = self.shared.core.lock();
        if core.lifecycle != PoolState::Down {
            return Err(BindError::AlreadyStarted(self.shared.name.clone()));
        }
        core.lifecycle = PoolState::Starting;
        core.lifecycle = PoolState::Up;
        info!(
            pool = %self.shared.name,
            max_threads = self.shared.max_threads,
            policy = ?self.shared.policy,
            "queueless pool started"
        );
        Ok(())
    }

    /// Submit a task for execution.
    ///
    /// # Errors
    ///
    /// See [`PoolError`]; every failure is reported synchronously and the
    /// pool keeps operating.
    pub fn submit<F>(&self, task: F) -> Result<Admission, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(task))
    }

    /// Submit an already-boxed task. See [`QueuelessPool::submit`].
    ///
    /// # Errors
    ///
    /// See [`PoolError`].
    pub fn submit_boxed(&self, task: Task) -> Result<Admission, PoolError> {
        let mut core = self.shared.core.lock();
        if core.lifecycle != PoolState::Up {
            return Err(PoolError::Unavailable(self.shared.name.clone()));
        }

        // Direct hand-off: a parked worker is free to take this task.
        if core.idle > core.handoffs.len() {
            core.handoffs.push_back(task);
            self.shared.worker_cv.notify_one();
            self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
            debug!(pool = %self.shared.name, "task handed to idle worker");
            return Ok(Admission::Direct);
        }

        // Grow the pool: the task becomes the new worker's first assignment.
        if core.live < self.shared.max_threads {
            self.spawn_worker(&mut core, task)?;
            self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
            return Ok(Admission::NewWorker);
        }

        match self.shared.policy {
            AdmissionPolicy::Block => self.wait_for_capacity(core, task),
            AdmissionPolicy::DelegateOrReject => {
                drop(core);
                self.delegate(task)
            }
        }
    }

    /// Saturated blocking admission: park until a worker frees up or
    /// headroom appears, then re-run the admission decision.
    fn wait_for_capacity(
        &self,
        mut core: MutexGuard<'_, PoolCore>,
        task: Task,
    ) -> Result<Admission, PoolError> {
        debug!(pool = %self.shared.name, "pool saturated, submitter blocking");
        // The task moves out exactly once; the Option satisfies the borrow
        // checker across wait iterations.
        let mut task = Some(task);
        loop {
            self.shared.submit_cv.wait(&mut core);
            if core.lifecycle != PoolState::Up {
                return Err(PoolError::Stopping(self.shared.name.clone()));
            }
            if core.idle > core.handoffs.len() {
                if let Some(task) = task.take() {
                    core.handoffs.push_back(task);
                    self.shared.worker_cv.notify_one();
                    self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(Admission::AfterWait);
                }
            }
            if core.live < self.shared.max_threads {
                if let Some(task) = task.take() {
                    self.spawn_worker(&mut core, task)?;
                    self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(Admission::AfterWait);
                }
            }
        }
    }

    /// Saturated delegate-or-reject admission.
    fn delegate(&self, task: Task) -> Result<Admission, PoolError> {
        let handoff = self.handoff.lock().clone();
        match handoff {
            Some(executor) => match executor.execute(task) {
                Ok(()) => {
                    self.shared.counters.delegated.fetch_add(1, Ordering::Relaxed);
                    debug!(pool = %self.shared.name, "task delegated to hand-off executor");
                    Ok(Admission::Delegated)
                }
                Err(rejected) => {
                    self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(pool = %self.shared.name, "hand-off executor rejected task");
                    Err(PoolError::HandoffRejected(rejected))
                }
            },
            None => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(pool = %self.shared.name, "submission rejected, pool saturated");
                Err(PoolError::Saturated(self.shared.name.clone()))
            }
        }
    }

    /// Create a worker with `task` as its initial assignment. Caller holds
    /// the core lock and has verified headroom.
    fn spawn_worker(&self, core: &mut PoolCore, task: Task) -> Result<(), PoolError> {
        let factory = self
            .thread_factory
            .lock()
            .clone()
            .ok_or_else(|| PoolError::Unavailable(self.shared.name.clone()))?;
        core.live += 1;
        let shared = Arc::clone(&self.shared);
        match factory.spawn(Box::new(move || worker_main(&shared, task))) {
            Ok(handle) => {
                // retired workers leave finished handles behind; prune them
                // so the vec stays bounded by the live count
                core.workers.retain(|worker| !worker.is_finished());
                core.workers.push(handle);
                debug!(pool = %self.shared.name, live = core.live, "admission grew the pool");
                Ok(())
            }
            Err(err) => {
                core.live -= 1;
                Err(PoolError::Spawn(err))
            }
        }
    }

    /// Initiate graceful shutdown: release blocked submitters, drain
    /// workers, return to `Down`.
    ///
    /// Each worker is joined with a bounded wait and detached if it does
    /// not exit in time, so a long-running task cannot hang shutdown.
    /// Calling `stop` on a pool that is not `Up` is a no-op.
    pub fn stop(&self) {
        let workers = {
            let mut core = self.shared.core.lock();
            if core.lifecycle != PoolState::Up {
                return;
            }
            core.lifecycle = PoolState::Stopping;
            self.shared.worker_cv.notify_all();
            self.shared.submit_cv.notify_all();
            mem::take(&mut core.workers)
        };
        info!(pool = %self.shared.name, workers = workers.len(), "stopping queueless pool");
        for handle in workers {
            join_with_timeout(handle, STOP_JOIN_TIMEOUT, &self.shared.name);
        }
        self.shared.core.lock().lifecycle = PoolState::Down;
        info!(pool = %self.shared.name, "queueless pool stopped");
    }

    /// Snapshot current utilization.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let core = self.shared.core.lock();
        PoolStats {
            live_workers: core.live,
            idle_workers: core.idle,
            submitted_tasks: self.shared.counters.submitted.load(Ordering::Relaxed),
            completed_tasks: self.shared.counters.completed.load(Ordering::Relaxed),
            failed_tasks: self.shared.counters.failed.load(Ordering::Relaxed),
            delegated_tasks: self.shared.counters.delegated.load(Ordering::Relaxed),
            rejected_tasks: self.shared.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Drop for QueuelessPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join: workers observe the state flip at
        // their next idle point and exit on their own. Explicit stop() is
        // required for a drained shutdown.
        let mut core = self.shared.core.lock();
        if core.lifecycle == PoolState::Up {
            core.lifecycle = PoolState::Stopping;
            self.shared.worker_cv.notify_all();
            self.shared.submit_cv.notify_all();
            debug!(pool = %self.shared.name, "pool dropped without stop, detaching workers");
        }
    }
}

/// A running pool is itself a hand-off capability, so one pool's overflow
/// can be another pool's intake.
impl HandoffExecutor for QueuelessPool {
    fn execute(&self, task: Task) -> Result<(), HandoffRejected> {
        self.submit_boxed(task).map(|_| ()).map_err(|err| {
            warn!(pool = %self.shared.name, %err, "chained pool could not admit delegated task");
            HandoffRejected
        })
    }
}

/// Worker thread body: run the initial assignment, then park for hand-offs
/// until keep-alive expires or the pool stops.
fn worker_main(shared: &Arc<PoolShared>, initial: Task) {
    debug!(pool = %shared.name, "worker thread started");
    run_task(shared, initial);
    loop {
        let mut core = shared.core.lock();
        core.idle += 1;
        // a worker just became available; wake one blocked submitter
        shared.submit_cv.notify_one();
        let idle_deadline = Instant::now().checked_add(shared.keep_alive);
        let next = loop {
            if core.lifecycle != PoolState::Up {
                break None;
            }
            if let Some(task) = core.handoffs.pop_front() {
                break Some(task);
            }
            match idle_deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break None;
                    }
                    let _ = shared.worker_cv.wait_for(&mut core, deadline - now);
                }
                // keep-alive too large to represent; park indefinitely
                None => shared.worker_cv.wait(&mut core),
            }
        };
        core.idle -= 1;
        match next {
            Some(task) => {
                drop(core);
                run_task(shared, task);
            }
            None => {
                core.live -= 1;
                shared.submit_cv.notify_all();
                drop(core);
                debug!(pool = %shared.name, "worker thread retiring");
                return;
            }
        }
    }
}

/// Run one task, containing panics so the worker (and the live-count
/// accounting behind `max_threads`) survives.
fn run_task(shared: &PoolShared, task: Task) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        shared.counters.failed.fetch_add(1, Ordering::Relaxed);
        error!(pool = %shared.name, "task panicked in worker thread");
    } else {
        shared.counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Join a worker with a bounded wait; detach it if it does not exit in
/// time. The signal travels over a one-shot channel so the join itself can
/// be abandoned.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, pool: &str) {
    let (done_tx, done_rx) = crossbeam_channel::bounded::<bool>(1);
    let waiter = thread::Builder::new()
        .name(format!("{pool}-reaper"))
        .spawn(move || {
            let _ = done_tx.send(handle.join().is_ok());
        });
    let Ok(waiter) = waiter else {
        warn!(pool, "could not spawn reaper thread, detaching worker");
        return;
    };
    match done_rx.recv_timeout(timeout) {
        Ok(true) => {
            let _ = waiter.join();
        }
        Ok(false) => {
            let _ = waiter.join();
            warn!(pool, "worker thread panicked before shutdown");
        }
        Err(_) => {
            warn!(pool, ?timeout, "worker did not exit in time, detaching");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::factory::NamedThreadFactory;

    fn factory() -> Arc<dyn ThreadFactory> {
        Arc::new(NamedThreadFactory::new("test"))
    }

    #[test]
    fn zero_bound_is_rejected() {
        let err = QueuelessPool::new("p", 0, Duration::from_secs(1), AdmissionPolicy::Block)
            .expect_err("zero max-threads must not construct");
        assert!(matches!(
            err,
            ValidationError::OutOfRange {
                field: "max-threads",
                ..
            }
        ));
    }

    #[test]
    fn submit_before_start_is_unavailable() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_secs(1), AdmissionPolicy::Block).unwrap();
        let err = pool.submit(|| {}).expect_err("down pool must not accept");
        assert!(matches!(err, PoolError::Unavailable(_)));
    }

    #[test]
    fn start_requires_thread_factory() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_secs(1), AdmissionPolicy::Block).unwrap();
        assert!(matches!(
            pool.start(),
            Err(BindError::MissingThreadFactory(_))
        ));
        pool.bind_thread_factory(factory()).unwrap();
        pool.start().unwrap();
        assert_eq!(pool.state(), PoolState::Up);
    }

    #[test]
    fn double_start_is_rejected() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_secs(1), AdmissionPolicy::Block).unwrap();
        pool.bind_thread_factory(factory()).unwrap();
        pool.start().unwrap();
        assert!(matches!(pool.start(), Err(BindError::AlreadyStarted(_))));
    }

    #[test]
    fn factory_binds_exactly_once() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_secs(1), AdmissionPolicy::Block).unwrap();
        pool.bind_thread_factory(factory()).unwrap();
        assert!(matches!(
            pool.bind_thread_factory(factory()),
            Err(BindError::AlreadyInjected { .. })
        ));
    }

    #[test]
    fn blocking_pool_refuses_handoff_binding() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_secs(1), AdmissionPolicy::Block).unwrap();
        let err = pool
            .bind_handoff_executor(Arc::new(crate::core::handoff::CallerRunsExecutor))
            .expect_err("blocking pools have no hand-off slot");
        assert!(matches!(err, BindError::UnusableDependency { .. }));
    }

    #[test]
    fn from_record_selects_policy() {
        let record = PoolRecord {
            name: "p".into(),
            max_threads: 2,
            keep_alive: Duration::from_millis(10),
            blocking: false,
            thread_factory: None,
            handoff_executor: None,
        };
        let pool = QueuelessPool::from_record(&record).unwrap();
        assert_eq!(pool.policy(), AdmissionPolicy::DelegateOrReject);
        assert_eq!(pool.name(), "p");
    }

    #[test]
    fn stop_is_idempotent_and_returns_to_down() {
        let pool =
            QueuelessPool::new("p", 1, Duration::from_millis(10), AdmissionPolicy::Block).unwrap();
        pool.bind_thread_factory(factory()).unwrap();
        pool.start().unwrap();
        pool.stop();
        assert_eq!(pool.state(), PoolState::Down);
        pool.stop();
        assert_eq!(pool.state(), PoolState::Down);
    }
}
