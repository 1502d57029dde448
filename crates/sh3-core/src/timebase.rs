//! Scheduler and interrupt controller, shared between the processor thread
//! and peripherals that signal from their own threads.
//!
//! The processor thread holds the lock for a whole granule and hands
//! `&mut Timebase` to every bus access, so handlers never lock. Other threads
//! go through [`InterruptLine`], which takes the same lock; their requests
//! therefore land between granules, where the loop samples interrupts anyway.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::intc::{InterruptController, InterruptSource};
use crate::scheduler::{EventId, EventKind, EventMode, Scheduler};
use crate::{CoreConfig, CoreError};

/// Event scheduler plus interrupt controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Timebase {
    /// Cycle-deadline scheduler.
    pub scheduler: Scheduler,
    /// Interrupt controller.
    pub intc: InterruptController,
}

impl Timebase {
    /// Creates the pair and the controller's zero-delay wake event.
    #[must_use]
    pub fn new(config: &CoreConfig) -> Self {
        let mut scheduler = Scheduler::new(config.max_granule_cycles);
        let wake = scheduler.create(0, 0, EventMode::OneShot, EventKind::InterruptWake);
        Self {
            scheduler,
            intc: InterruptController::new(wake),
        }
    }

    /// Marks `source` pending.
    pub fn request_interrupt(&mut self, source: InterruptSource) {
        self.intc.set_pending(source, &mut self.scheduler);
    }

    /// Clears `source`'s pending state.
    pub fn clear_interrupt(&mut self, source: InterruptSource) {
        self.intc.clear_pending(source, &mut self.scheduler);
    }

    /// Creates an event and schedules it `ticks * rate` cycles from now.
    pub fn schedule_event(
        &mut self,
        ticks: u64,
        rate: u32,
        mode: EventMode,
        kind: EventKind,
    ) -> EventId {
        let id = self.scheduler.create(ticks, rate, mode, kind);
        self.scheduler.insert(id);
        id
    }

    /// Applies the interrupt-side effect of a `Raise`/`Lower` event.
    ///
    /// Returns `false` for kinds owned by another subsystem.
    pub fn apply_event(&mut self, kind: EventKind) -> bool {
        self.intc.apply_event(kind, &mut self.scheduler)
    }
}

/// Shared handle to a [`Timebase`].
pub type SharedTimebase = Arc<Mutex<Timebase>>;

/// Locks a shared timebase, mapping poisoning to [`CoreError::TimingLockPoisoned`].
///
/// # Errors
///
/// Fails when a thread panicked while holding the lock.
pub fn lock_timebase(shared: &SharedTimebase) -> Result<MutexGuard<'_, Timebase>, CoreError> {
    shared.lock().map_err(|_| CoreError::TimingLockPoisoned)
}

/// Thread-safe interrupt request handle for peripherals outside the processor thread.
#[derive(Debug, Clone)]
pub struct InterruptLine {
    shared: SharedTimebase,
}

impl InterruptLine {
    /// Wraps a shared timebase.
    #[must_use]
    pub const fn new(shared: SharedTimebase) -> Self {
        Self { shared }
    }

    /// Marks `source` pending.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn request(&self, source: InterruptSource) -> Result<(), CoreError> {
        lock_timebase(&self.shared)?.request_interrupt(source);
        Ok(())
    }

    /// Clears `source`.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn clear(&self, source: InterruptSource) -> Result<(), CoreError> {
        lock_timebase(&self.shared)?.clear_interrupt(source);
        Ok(())
    }

    /// Relays a line transition: asserted requests, deasserted clears.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn set_level(&self, source: InterruptSource, asserted: bool) -> Result<(), CoreError> {
        if asserted {
            self.request(source)
        } else {
            self.clear(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{lock_timebase, InterruptLine, Timebase};
    use crate::intc::InterruptSource;
    use crate::scheduler::{EventKind, EventMode};
    use crate::CoreConfig;

    #[test]
    fn interrupt_line_reaches_controller_from_another_thread() {
        let shared = Arc::new(Mutex::new(Timebase::new(&CoreConfig::default())));
        let line = InterruptLine::new(Arc::clone(&shared));
        std::thread::spawn(move || line.request(InterruptSource::Irl1))
            .join()
            .expect("thread")
            .expect("request");
        let timebase = lock_timebase(&shared).expect("lock");
        assert!(timebase.intc.is_pending(InterruptSource::Irl1));
    }

    #[test]
    fn set_level_false_clears() {
        let shared = Arc::new(Mutex::new(Timebase::new(&CoreConfig::default())));
        let line = InterruptLine::new(Arc::clone(&shared));
        line.set_level(InterruptSource::Irl2, true).expect("raise");
        line.set_level(InterruptSource::Irl2, false).expect("clear");
        assert!(!lock_timebase(&shared)
            .expect("lock")
            .intc
            .is_pending(InterruptSource::Irl2));
    }

    #[test]
    fn schedule_event_inserts_immediately() {
        let mut timebase = Timebase::new(&CoreConfig::default());
        let id = timebase.schedule_event(
            10,
            3,
            EventMode::OneShot,
            EventKind::Raise(InterruptSource::Irl0),
        );
        assert_eq!(timebase.scheduler.end_cycle(id), Some(30));
        assert!(timebase.apply_event(EventKind::Raise(InterruptSource::Irl0)));
        assert!(timebase.intc.is_pending(InterruptSource::Irl0));
        assert!(!timebase.apply_event(EventKind::DmaComplete(0)));
        assert!(!timebase.apply_event(EventKind::BlitComplete));
    }
}
