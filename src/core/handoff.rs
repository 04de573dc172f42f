//! Hand-off executor seam for tasks a saturated pool cannot admit.

use crate::core::error::HandoffRejected;

/// A unit of work submitted to a pool: runs once on some worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An overflow service that takes responsibility for tasks a non-blocking
/// pool cannot admit immediately.
///
/// The delegating pool forwards the task synchronously and takes no further
/// responsibility for its fate: whether the executor runs it inline, queues
/// it, or rejects it is this service's policy. A rejection is surfaced to
/// the original submitter.
pub trait HandoffExecutor: Send + Sync {
    /// Take responsibility for `task`, or reject it.
    ///
    /// # Errors
    ///
    /// Returns [`HandoffRejected`] when this executor declines the task; the
    /// task is dropped.
    fn execute(&self, task: Task) -> Result<(), HandoffRejected>;
}

/// Hand-off executor that runs every task inline on the submitting thread.
///
/// The simplest useful overflow policy: saturation degrades into
/// caller-runs instead of rejection. Mostly of interest to tests and small
/// deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerRunsExecutor;

impl HandoffExecutor for CallerRunsExecutor {
    fn execute(&self, task: Task) -> Result<(), HandoffRejected> {
        task();
        Ok(())
    }
}
