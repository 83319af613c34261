//! Single-shot completion channel.
//!
//! Capture backends report "finished" from callbacks or watcher threads. The
//! waiting side holds a [`oneshot::Receiver`]; the notifying side holds a
//! [`Completion`] that resolves it at most once, however many times it is hit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// Resolving half of a single-shot completion.
#[derive(Debug)]
pub struct Completion<T> {
    completed: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

/// Create a completion and the receiver it resolves.
pub fn completion<T>() -> (Completion<T>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            completed: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        },
        rx,
    )
}

impl<T> Completion<T> {
    /// Resolve with `value`.
    ///
    /// Returns `false` and drops `value` if already resolved.
    pub fn complete(&self, value: T) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            // A dropped receiver means nobody is waiting any more
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}
