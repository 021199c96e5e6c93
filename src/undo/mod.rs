//! Undoable mutation hand-off.
//!
//! Components issuing undoable mutations push deferred actions onto a
//! process-wide FIFO queue; a single consumer (the notification layer, see
//! [`UndoWindow`]) takes each one and decides whether to commit or undo it.
//! Producers and the consumer never reference each other directly.

mod window;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub use window::{UndoOutcome, UndoWindow};

/// A deferred mutation awaiting the user's decision.
///
/// Running it with `is_undo = false` commits (issues the network call);
/// with `is_undo = true` it rolls the optimistic write back. Consumed on
/// run, so each entry executes at most once.
pub struct UndoableMutation {
    action: Box<dyn FnOnce(bool) + Send>,
}

impl UndoableMutation {
    pub fn new(action: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            action: Box::new(action),
        }
    }

    pub fn run(self, is_undo: bool) {
        (self.action)(is_undo)
    }

    pub fn commit(self) {
        self.run(false)
    }

    pub fn undo(self) {
        self.run(true)
    }
}

impl fmt::Debug for UndoableMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoableMutation").finish_non_exhaustive()
    }
}

/// FIFO queue of pending undoable mutations.
///
/// Cloning yields another handle to the same queue; the application
/// context owns one and hands clones to every engine.
#[derive(Clone, Default)]
pub struct UndoableMutationQueue {
    mutations: Arc<Mutex<VecDeque<UndoableMutation>>>,
}

impl UndoableMutationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the tail.
    pub fn add_mutation(&self, mutation: UndoableMutation) {
        self.mutations.lock().push_back(mutation);
    }

    /// Remove and return the head entry, if any.
    pub fn take_mutation(&self) -> Option<UndoableMutation> {
        self.mutations.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.mutations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.lock().is_empty()
    }
}

impl fmt::Debug for UndoableMutationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoableMutationQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording(log: &Arc<Mutex<Vec<(usize, bool)>>>, index: usize) -> UndoableMutation {
        let log = Arc::clone(log);
        UndoableMutation::new(move |is_undo| log.lock().push((index, is_undo)))
    }

    #[test]
    fn test_take_from_empty_queue() {
        let queue = UndoableMutationQueue::new();
        assert!(queue.take_mutation().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = UndoableMutationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for index in 1..=3 {
            queue.add_mutation(recording(&log, index));
        }
        assert_eq!(queue.len(), 3);

        while let Some(mutation) = queue.take_mutation() {
            mutation.commit();
        }

        assert_eq!(*log.lock(), vec![(1, false), (2, false), (3, false)]);
        assert!(queue.take_mutation().is_none());
    }

    #[test]
    fn test_clones_share_the_queue() {
        let producer = UndoableMutationQueue::new();
        let consumer = producer.clone();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        producer.add_mutation(UndoableMutation::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        consumer.take_mutation().unwrap().undo();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(producer.is_empty());
    }

    #[test]
    fn test_undo_passes_flag() {
        let queue = UndoableMutationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.add_mutation(recording(&log, 7));

        queue.take_mutation().unwrap().undo();
        assert_eq!(*log.lock(), vec![(7, true)]);
    }
}
