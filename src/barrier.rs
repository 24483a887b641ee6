//! One-shot countdown latch that runs an action when the count reaches zero.
//!
//! Stages use it to close a shared output stream only after every one of their
//! `N` workers has finished writing to it, no matter which worker finishes last.
//! See [`CompletionBarrier::closing`].
//!
//! Invariants:
//! - the action runs exactly once, on the `expected`-th call to [`signal`](CompletionBarrier::signal),
//!   and never earlier;
//! - surplus signals are ignored (and logged);
//! - a barrier dropped before reaching its count never runs its action, and does
//!   not release what the action captured either. A stream guarded by an
//!   unfinished barrier therefore stays open rather than ending with partial data.

use crate::error::EngineError;
use crate::stream::RecordSender;
use anyhow::Result;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

type Action = Box<dyn FnOnce() + Send>;

pub struct CompletionBarrier {
    expected: usize,
    observed: AtomicUsize,
    action: Mutex<Option<Action>>,
}

impl CompletionBarrier {
    /// Create a latch that runs `action` after `expected` signals.
    ///
    /// # Errors
    /// [`EngineError::InvalidSignalCount`] when `expected` is zero.
    pub fn new<F>(expected: usize, action: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        if expected == 0 {
            return Err(EngineError::InvalidSignalCount.into());
        }
        Ok(Self {
            expected,
            observed: AtomicUsize::new(0),
            action: Mutex::new(Some(Box::new(action))),
        })
    }

    /// Create a latch that closes `target` after `expected` signals.
    ///
    /// The barrier keeps `target` alive until then. Hand out clones of the sender
    /// to the producers; as long as each producer drops its clone before
    /// signalling, the stream closes exactly when the last signal lands.
    ///
    /// ```
    /// use kvflow::{channel, CompletionBarrier, TryRecv};
    ///
    /// let (tx, rx) = channel::<u8>(0);
    /// let barrier = CompletionBarrier::closing(tx, 2).unwrap();
    /// barrier.signal();
    /// assert_eq!(rx.try_recv(), TryRecv::Empty);
    /// barrier.signal();
    /// assert_eq!(rx.try_recv(), TryRecv::Closed);
    /// ```
    pub fn closing<V: Send + 'static>(target: RecordSender<V>, expected: usize) -> Result<Self> {
        Self::new(expected, move || drop(target))
    }

    /// Record one completion. Safe to call from any number of threads.
    pub fn signal(&self) {
        let seen = self.observed.fetch_add(1, Ordering::AcqRel) + 1;
        if seen < self.expected {
            trace!(seen, expected = self.expected, "barrier signalled");
            return;
        }
        if seen > self.expected {
            warn!(seen, expected = self.expected, "surplus signal on a completed barrier; ignoring");
            return;
        }
        let action = self
            .action
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(action) = action {
            trace!(expected = self.expected, "barrier complete");
            action();
        }
    }

    /// Number of signals the barrier waits for.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Signals still missing before the action runs.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.expected
            .saturating_sub(self.observed.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }
}

impl Drop for CompletionBarrier {
    fn drop(&mut self) {
        let pending = self
            .action
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(action) = pending {
            // an unfinished latch must not release its captures (that would close the stream)
            std::mem::forget(action);
        }
    }
}

impl fmt::Debug for CompletionBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("expected", &self.expected)
            .field("observed", &self.observed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
