//! Thread factory seam and the default named-thread implementation.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::core::handoff::Task;

/// Producer of worker threads for a pool.
///
/// Bound into a pool as a named service before the pool starts; the pool
/// calls it every time admission decides to grow. Implementations control
/// naming, stack size, and any per-thread setup.
pub trait ThreadFactory: Send + Sync {
    /// Spawn a new thread running `body`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] when the OS refuses to create
    /// the thread.
    fn spawn(&self, body: Task) -> io::Result<JoinHandle<()>>;
}

/// Default thread factory producing threads named `{prefix}-{n}`.
///
/// Each factory owns its own counter, so a factory scoped to one pool's
/// name never shares thread identities with another pool's.
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    counter: AtomicUsize,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    /// Create a factory whose threads are named `{prefix}-{n}`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
            stack_size: None,
        }
    }

    /// Set an explicit stack size for produced threads.
    #[must_use]
    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    fn next_name(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{id}", self.prefix)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, body: Task) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(self.next_name());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn(body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn threads_are_named_sequentially() {
        let factory = NamedThreadFactory::new("ingest");
        let (tx, rx) = mpsc::channel();

        for _ in 0..2 {
            let tx = tx.clone();
            let handle = factory
                .spawn(Box::new(move || {
                    let name = thread::current().name().map(str::to_owned);
                    let _ = tx.send(name);
                }))
                .expect("spawn");
            handle.join().expect("join");
        }

        let mut names: Vec<_> = rx.try_iter().flatten().collect();
        names.sort();
        assert_eq!(names, vec!["ingest-0".to_string(), "ingest-1".to_string()]);
    }

    #[test]
    fn factories_do_not_share_counters() {
        let a = NamedThreadFactory::new("a");
        let b = NamedThreadFactory::new("b");
        assert_eq!(a.next_name(), "a-0");
        assert_eq!(b.next_name(), "b-0");
        assert_eq!(a.next_name(), "a-1");
    }
}
