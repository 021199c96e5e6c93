//! Timed undo window: the consumer side of the undoable queue.
//!
//! Mirrors the notification that offers an "Undo" button: the head entry
//! is committed once the window elapses, unless the user asks to undo it
//! first.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use super::UndoableMutationQueue;
use crate::config::UndoConfig;

/// How a pending undoable mutation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The window elapsed (or the undo signal was dropped): committed.
    Committed,
    /// The user asked to undo before the window elapsed.
    Undone,
}

/// Drains an [`UndoableMutationQueue`] one entry at a time.
#[derive(Debug, Clone)]
pub struct UndoWindow {
    queue: UndoableMutationQueue,
    timeout: Duration,
}

impl UndoWindow {
    pub fn new(queue: UndoableMutationQueue, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    pub fn from_config(queue: UndoableMutationQueue, config: &UndoConfig) -> Self {
        Self::new(queue, config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the head entry.
    ///
    /// Waits for either `undo` to fire or the window to elapse. Returns
    /// `None` when the queue is empty. A dropped `undo` sender does not
    /// count as an undo request.
    pub async fn settle_next(&self, undo: oneshot::Receiver<()>) -> Option<UndoOutcome> {
        let mutation = self.queue.take_mutation()?;

        let outcome = tokio::select! {
            Ok(()) = undo => UndoOutcome::Undone,
            _ = tokio::time::sleep(self.timeout) => UndoOutcome::Committed,
        };

        debug!(outcome = ?outcome, "Undo window closed");
        mutation.run(outcome == UndoOutcome::Undone);
        Some(outcome)
    }

    /// Commit every pending entry immediately. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut count = 0;
        while let Some(mutation) = self.queue.take_mutation() {
            mutation.commit();
            count += 1;
        }
        if count > 0 {
            debug!(count, "Flushed pending undoable mutations");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::UndoableMutation;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn queue_with_recorder() -> (UndoableMutationQueue, Arc<Mutex<Vec<bool>>>) {
        let queue = UndoableMutationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&log);
        queue.add_mutation(UndoableMutation::new(move |is_undo| {
            recorder.lock().push(is_undo)
        }));
        (queue, log)
    }

    #[tokio::test]
    async fn test_window_elapses_and_commits() {
        let (queue, log) = queue_with_recorder();
        let window = UndoWindow::new(queue, Duration::from_millis(10));
        let (_keep_open, undo) = oneshot::channel();

        let outcome = window.settle_next(undo).await;

        assert_eq!(outcome, Some(UndoOutcome::Committed));
        assert_eq!(*log.lock(), vec![false]);
    }

    #[tokio::test]
    async fn test_undo_signal_wins_over_timeout() {
        let (queue, log) = queue_with_recorder();
        let window = UndoWindow::new(queue, Duration::from_secs(60));
        let (trigger, undo) = oneshot::channel();
        trigger.send(()).unwrap();

        let outcome = window.settle_next(undo).await;

        assert_eq!(outcome, Some(UndoOutcome::Undone));
        assert_eq!(*log.lock(), vec![true]);
    }

    #[tokio::test]
    async fn test_dropped_signal_commits() {
        let (queue, log) = queue_with_recorder();
        let window = UndoWindow::new(queue, Duration::from_millis(10));
        let (trigger, undo) = oneshot::channel::<()>();
        drop(trigger);

        assert_eq!(window.settle_next(undo).await, Some(UndoOutcome::Committed));
        assert_eq!(*log.lock(), vec![false]);
    }

    #[tokio::test]
    async fn test_empty_queue_yields_nothing() {
        let window = UndoWindow::new(UndoableMutationQueue::new(), Duration::from_millis(10));
        let (_trigger, undo) = oneshot::channel();
        assert_eq!(window.settle_next(undo).await, None);
    }

    #[test]
    fn test_flush_commits_everything() {
        let (queue, log) = queue_with_recorder();
        let recorder = Arc::clone(&log);
        queue.add_mutation(UndoableMutation::new(move |is_undo| {
            recorder.lock().push(is_undo)
        }));
        let window = UndoWindow::new(queue.clone(), Duration::from_secs(1));

        assert_eq!(window.flush(), 2);
        assert_eq!(*log.lock(), vec![false, false]);
        assert!(queue.is_empty());
    }
}
