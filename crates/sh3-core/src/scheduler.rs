//! Cycle-deadline event scheduler.
//!
//! Events live in an arena and are chained into a single list sorted by end
//! cycle. The scheduler keeps no free-running clock: the current cycle is
//! derived from the end of the current execution window minus the budget the
//! execution loop has not yet consumed, and it is resynchronized whenever the
//! list changes. Concurrently scheduled events number in the single digits,
//! so insertion is a linear walk.

use crate::intc::InterruptSource;

/// Handle to an event owned by a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EventId(usize);

impl EventId {
    /// Arena index of the event.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Whether an event re-arms itself after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EventMode {
    /// Fires once, then stays disabled until inserted again.
    OneShot,
    /// Re-arms one period after its previous deadline.
    Periodic,
}

/// What happens when an event fires.
///
/// The scheduler only reports the kind; the owner of the affected state
/// performs the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EventKind {
    /// TMU channel counter underflow.
    TimerUnderflow(u8),
    /// DMA channel transfer end.
    DmaComplete(u8),
    /// Compositor job end; waits for the worker, then raises IRL1.
    BlitComplete,
    /// Zero-delay wake ending the current granule so an interrupt is sampled.
    InterruptWake,
    /// Raise an interrupt source.
    Raise(InterruptSource),
    /// Clear an interrupt source.
    Lower(InterruptSource),
}

/// A schedulable deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Event {
    kind: EventKind,
    mode: EventMode,
    enabled: bool,
    count: u64,
    rate: u32,
    start: u64,
    end: u64,
    prev: Option<EventId>,
    next: Option<EventId>,
}

impl Event {
    /// Action reported when the event fires.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// One-shot or periodic.
    #[must_use]
    pub const fn mode(&self) -> EventMode {
        self.mode
    }

    /// Whether the event is currently in the list.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Stored tick count.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Cycles per tick.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Cycle the current period started at.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Cycle the event fires at.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    const fn period(&self) -> u64 {
        self.count.saturating_mul(self.rate as u64)
    }
}

/// Sorted list of cycle deadlines plus the lazily synchronized clock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Scheduler {
    events: Vec<Event>,
    head: Option<EventId>,
    /// Cycle at the last resynchronization.
    cycle: u64,
    /// Cycle at which the current window ends.
    sync_end: u64,
    /// Cycles left in the current window; negative once overrun.
    budget: i64,
    max_granule: u32,
}

impl Scheduler {
    /// Creates an empty scheduler whose windows never exceed `max_granule` cycles.
    #[must_use]
    pub fn new(max_granule: u32) -> Self {
        Self {
            events: Vec::new(),
            head: None,
            cycle: 0,
            sync_end: u64::from(max_granule),
            budget: i64::from(max_granule),
            max_granule,
        }
    }

    /// Creates a disabled event. Events are never destroyed.
    pub fn create(&mut self, count: u64, rate: u32, mode: EventMode, kind: EventKind) -> EventId {
        let id = EventId(self.events.len());
        self.events.push(Event {
            kind,
            mode,
            enabled: false,
            count,
            rate,
            start: 0,
            end: 0,
            prev: None,
            next: None,
        });
        id
    }

    /// Current cycle: window end minus unconsumed budget.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.sync_end.wrapping_add_signed(self.budget.wrapping_neg())
    }

    /// Cycles left before the execution loop should stop at a branch.
    #[must_use]
    pub const fn budget(&self) -> i64 {
        self.budget
    }

    /// Charges `cycles` of execution against the current window.
    #[allow(clippy::missing_const_for_fn)]
    pub fn consume(&mut self, cycles: u32) {
        self.budget = self.budget.saturating_sub(i64::from(cycles));
    }

    /// Returns the event behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this scheduler.
    #[must_use]
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    /// Returns `true` while `id` is in the list.
    #[must_use]
    pub fn is_enabled(&self, id: EventId) -> bool {
        self.events[id.0].enabled
    }

    /// Stored tick count of `id`.
    #[must_use]
    pub fn count(&self, id: EventId) -> u64 {
        self.events[id.0].count
    }

    /// Replaces the stored tick count; takes effect at the next insertion.
    pub fn set_count(&mut self, id: EventId, count: u64) {
        self.events[id.0].count = count;
    }

    /// Cycles per tick of `id`.
    #[must_use]
    pub fn rate(&self, id: EventId) -> u32 {
        self.events[id.0].rate
    }

    /// Replaces the rate divisor; takes effect at the next insertion.
    pub fn set_rate(&mut self, id: EventId, rate: u32) {
        self.events[id.0].rate = rate;
    }

    /// Deadline of `id` if it is scheduled.
    #[must_use]
    pub fn end_cycle(&self, id: EventId) -> Option<u64> {
        let event = &self.events[id.0];
        event.enabled.then_some(event.end)
    }

    /// Iterates the scheduled events in firing order.
    pub fn scheduled(&self) -> impl Iterator<Item = EventId> + '_ {
        std::iter::successors(self.head, |&id| self.events[id.0].next)
    }

    /// Schedules `id` to fire `count * rate` cycles from now.
    ///
    /// An event that is already scheduled is removed first.
    pub fn insert(&mut self, id: EventId) {
        self.remove(id);
        let now = self.now();
        self.cycle = now;
        let event = &mut self.events[id.0];
        event.enabled = true;
        event.start = now;
        event.end = now.saturating_add(event.period());
        self.link(id);
        self.refresh();
    }

    /// Unschedules `id`. Removing an event that is not scheduled does nothing.
    pub fn remove(&mut self, id: EventId) {
        if !self.events[id.0].enabled {
            return;
        }
        self.unlink(id);
        self.events[id.0].enabled = false;
        self.refresh();
    }

    /// Live countdown of `id` in ticks, or the stored count when it is idle.
    #[must_use]
    pub fn read_counter(&self, id: EventId) -> u64 {
        let event = &self.events[id.0];
        if !event.enabled {
            return event.count;
        }
        if event.rate == 0 {
            return 0;
        }
        event.end.saturating_sub(self.now()) / u64::from(event.rate)
    }

    /// Fires every event whose deadline has passed.
    ///
    /// `on_fire` runs before the event is unlinked and may change its count or
    /// schedule other events. Periodic events are re-armed from their previous
    /// deadline so late service does not drift the next one.
    pub fn test(&mut self, mut on_fire: impl FnMut(&mut Self, EventId, EventKind)) {
        let now = self.now();
        self.cycle = now;
        while let Some(id) = self.head {
            let deadline = self.events[id.0].end;
            if deadline > now {
                break;
            }
            let kind = self.events[id.0].kind;
            on_fire(self, id, kind);
            self.remove(id);
            if self.events[id.0].mode == EventMode::Periodic {
                self.rearm(id, deadline);
            }
        }
        self.refresh();
    }

    fn rearm(&mut self, id: EventId, anchor: u64) {
        let event = &mut self.events[id.0];
        let period = event.period();
        if period == 0 {
            log::warn!("dropping periodic event {id:?} ({:?}) with zero period", event.kind);
            return;
        }
        event.enabled = true;
        event.start = anchor;
        event.end = anchor.saturating_add(period);
        self.link(id);
    }

    fn link(&mut self, id: EventId) {
        let end = self.events[id.0].end;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(at) = cursor {
            if self.events[at.0].end > end {
                break;
            }
            prev = Some(at);
            cursor = self.events[at.0].next;
        }
        self.events[id.0].prev = prev;
        self.events[id.0].next = cursor;
        match prev {
            Some(p) => self.events[p.0].next = Some(id),
            None => self.head = Some(id),
        }
        if let Some(n) = cursor {
            self.events[n.0].prev = Some(id);
        }
    }

    fn unlink(&mut self, id: EventId) {
        let Event { prev, next, .. } = self.events[id.0];
        match prev {
            Some(p) => self.events[p.0].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.events[n.0].prev = prev;
        }
        self.events[id.0].prev = None;
        self.events[id.0].next = None;
    }

    /// Starts a new window ending at the next deadline, capped at the granule bound.
    fn refresh(&mut self) {
        let now = self.now();
        self.cycle = now;
        let cap = u64::from(self.max_granule);
        let wait = self
            .head
            .map_or(cap, |id| self.events[id.0].end.saturating_sub(now).min(cap));
        self.sync_end = now + wait;
        self.budget = wait as i64;
    }
}
