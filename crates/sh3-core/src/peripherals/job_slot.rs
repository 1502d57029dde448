use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::CoreError;

#[derive(Debug)]
struct SlotState<T> {
    job: Option<T>,
    busy: bool,
    stopped: bool,
}

/// Single-slot handoff between a producer and one worker.
///
/// At most one job is in flight: [`JobSlot::submit`] blocks from the moment a
/// job is accepted until the worker calls [`JobSlot::complete`] for it, so
/// everything the worker did before completing happens-before the next
/// submit returns.
#[derive(Debug)]
pub struct JobSlot<T> {
    state: Mutex<SlotState<T>>,
    changed: Condvar,
}

impl<T> Default for JobSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobSlot<T> {
    /// Creates an idle slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                job: None,
                busy: false,
                stopped: false,
            }),
            changed: Condvar::new(),
        }
    }

    // Every update is a single field store; the state is valid after a panic.
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `job` to the worker, first waiting for the previous one to complete.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CompositorStopped`] once the slot is shut down.
    pub fn submit(&self, job: T) -> Result<(), CoreError> {
        let mut state = self
            .changed
            .wait_while(self.lock(), |s| s.busy && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            return Err(CoreError::CompositorStopped);
        }
        state.job = Some(job);
        state.busy = true;
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Parks until a job arrives; `None` once the slot is shut down.
    pub fn take(&self) -> Option<T> {
        let mut state = self
            .changed
            .wait_while(self.lock(), |s| s.job.is_none() && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            return None;
        }
        state.job.take()
    }

    /// Marks the taken job finished and wakes a blocked submitter.
    pub fn complete(&self) {
        self.lock().busy = false;
        self.changed.notify_all();
    }

    /// Blocks until the in-flight job, if any, has completed or the slot
    /// is shut down.
    pub fn wait_idle(&self) {
        drop(
            self.changed
                .wait_while(self.lock(), |s| s.busy && !s.stopped)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Whether a job is queued or being worked on.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Stops the slot and wakes every waiter. Idempotent.
    pub fn shutdown(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
    }

    /// Whether [`JobSlot::shutdown`] was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }
}
