/*!
 * Worker-pool primitives shared by batch translation and batch evaluation.
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared flag that stops the scheduling of new units.
///
/// Units already handed to a backend run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Clamp a configured worker count to something a semaphore can use
pub fn effective_concurrency(configured: usize, work_items: usize) -> usize {
    configured.max(1).min(work_items.max(1))
}

/// Counts finished work items and reports them to a callback
#[derive(Clone)]
pub struct ProgressCounter {
    done: Arc<AtomicUsize>,
    total: usize,
    callback: Arc<dyn Fn(usize, usize) + Send + Sync>,
}

impl ProgressCounter {
    pub fn new(total: usize, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        Self {
            done: Arc::new(AtomicUsize::new(0)),
            total,
            callback: Arc::new(callback),
        }
    }

    /// Mark one item finished and report progress
    pub fn tick(&self) -> usize {
        let current = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        (self.callback)(current, self.total);
        current
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProgressCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCounter")
            .field("done", &self.done())
            .field("total", &self.total)
            .finish()
    }
}
