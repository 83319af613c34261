//! Operator abort flag.
//!
//! Signal handlers set the flag; the stop-condition evaluator checks it on
//! every wake-up, so an abort is observed within one poll quantum and the
//! chunk is stopped in an orderly way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "abort requested" flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an orderly stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
