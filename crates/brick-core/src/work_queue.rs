//! Lock-free work queue for distributing files across parallel workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free queue of independent work items.
///
/// Workers call [`claim`](WorkQueue::claim) to atomically take the next item;
/// each item is handed out exactly once. Items that are already complete
/// can be split off at construction time with [`partition`](WorkQueue::partition).
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    /// Create queue from all items
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Split `items` into a queue of pending work and the items `is_done` accepts.
    ///
    /// Relative order is preserved on both sides.
    pub fn partition(items: Vec<T>, is_done: impl Fn(&T) -> bool) -> (Self, Vec<T>) {
        let (done, pending): (Vec<T>, Vec<T>) = items.into_iter().partition(|item| is_done(item));
        log::debug!("{} items queued, {} already done", pending.len(), done.len());
        (Self::new(pending), done)
    }

    /// Claim the next item along with its queue position (lock-free)
    pub fn claim(&self) -> Option<(usize, &T)> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(|item| (i, item))
    }

    /// Total items in queue
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items not yet claimed
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }
}
