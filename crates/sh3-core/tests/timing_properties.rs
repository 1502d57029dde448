//! Property suite for the scheduler and the interrupt controller.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation
)]

use log as _;
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use sh3_core::{
    EventId, EventKind, EventMode, InterruptController, InterruptSource, PriorityRegister,
    Scheduler, StatusRegister,
};
use thiserror as _;

const MAX_GRANULE: u32 = 1 << 16;

fn controller() -> (Scheduler, InterruptController) {
    let mut sched = Scheduler::new(MAX_GRANULE);
    let wake = sched.create(0, 0, EventMode::OneShot, EventKind::InterruptWake);
    (sched, InterruptController::new(wake))
}

fn unblocked(level: u8) -> StatusRegister {
    let mut sr = StatusRegister::from_bits(0x4000_0000);
    sr.set_imask(level);
    sr
}

/// Drains the scheduler up to `until`, returning the events fired in order.
fn run_until(sched: &mut Scheduler, until: u64) -> Vec<(EventId, u64)> {
    let mut fired = Vec::new();
    while sched.now() < until {
        let step = (until - sched.now()).min(u64::from(MAX_GRANULE)) as u32;
        sched.consume(step);
        sched.test(|s, id, _| fired.push((id, s.event(id).end())));
    }
    fired
}

proptest! {
    #[test]
    fn one_shots_fire_in_deadline_order_with_fifo_ties(
        counts in prop::collection::vec(1u64..500, 1..24),
    ) {
        let mut sched = Scheduler::new(MAX_GRANULE);
        let ids: Vec<EventId> = counts
            .iter()
            .map(|&count| {
                let id = sched.create(
                    count,
                    1,
                    EventMode::OneShot,
                    EventKind::Raise(InterruptSource::Irl0),
                );
                sched.insert(id);
                id
            })
            .collect();

        let fired = run_until(&mut sched, 500);

        let mut expected: Vec<(EventId, u64)> =
            ids.iter().copied().zip(counts.iter().copied()).collect();
        expected.sort_by_key(|&(_, count)| count);
        prop_assert_eq!(fired, expected);
        prop_assert!(sched.scheduled().next().is_none());
    }

    #[test]
    fn periodic_deadlines_stay_on_the_grid(
        period in 1u64..2_000,
        chunks in prop::collection::vec(1u32..5_000, 1..32),
    ) {
        let mut sched = Scheduler::new(MAX_GRANULE);
        let id = sched.create(period, 1, EventMode::Periodic, EventKind::Raise(InterruptSource::Irl2));
        sched.insert(id);

        let mut deadlines = Vec::new();
        for chunk in chunks {
            sched.consume(chunk);
            sched.test(|s, _, _| deadlines.push(s.event(id).end()));
        }

        for (k, deadline) in deadlines.iter().enumerate() {
            prop_assert_eq!(*deadline, (k as u64 + 1) * period);
        }
        prop_assert_eq!(deadlines.len() as u64, sched.now() / period);
        prop_assert!(sched.end_cycle(id).is_some_and(|end| end > sched.now()));
    }

    #[test]
    fn budget_never_spans_the_next_deadline(count in 1u64..200_000, spent in 0u32..1_000) {
        let mut sched = Scheduler::new(MAX_GRANULE);
        sched.consume(spent);
        sched.test(|_, _, _| {});
        let id = sched.create(count, 1, EventMode::OneShot, EventKind::Raise(InterruptSource::Irl0));
        sched.insert(id);
        let expected = count.min(u64::from(MAX_GRANULE));
        prop_assert_eq!(sched.budget(), expected as i64);
    }

    #[test]
    fn fire_condition_matches_pending_priorities(
        ipra in any::<u16>(),
        iprc in any::<u16>(),
        pending in any::<u8>(),
        level in 0u8..16,
    ) {
        let (mut sched, mut intc) = controller();
        intc.write_ipr(PriorityRegister::A, ipra, &mut sched);
        intc.write_ipr(PriorityRegister::C, iprc, &mut sched);
        intc.recompute_imask(unblocked(level), &mut sched);
        for (i, source) in InterruptSource::ALL.iter().enumerate() {
            if pending & (1 << i) != 0 {
                intc.set_pending(*source, &mut sched);
            }
        }

        let best = InterruptSource::ALL
            .iter()
            .enumerate()
            .filter(|&(i, source)| pending & (1 << i) != 0 && intc.priority(*source) > level)
            .map(|(_, source)| intc.priority(*source))
            .max();
        prop_assert_eq!(intc.should_fire(), best.is_some());
        let serviced = intc.next_service().map(|vector| intc.priority(vector.source));
        prop_assert_eq!(serviced, best);
    }

    #[test]
    fn remapping_keeps_pending_and_enable_state(
        before in any::<u16>(),
        after in any::<u16>(),
        pending in any::<u8>(),
        disabled in any::<u8>(),
    ) {
        let (mut sched, mut intc) = controller();
        intc.write_ipr(PriorityRegister::C, before, &mut sched);
        for (i, source) in InterruptSource::ALL.iter().enumerate() {
            if pending & (1 << i) != 0 {
                intc.set_pending(*source, &mut sched);
            }
            if disabled & (1 << i) != 0 {
                intc.clear_mask(*source, &mut sched);
            }
        }

        intc.write_ipr(PriorityRegister::C, after, &mut sched);

        for (i, source) in InterruptSource::ALL.iter().enumerate() {
            prop_assert_eq!(intc.is_pending(*source), pending & (1 << i) != 0);
            prop_assert_eq!(intc.is_enabled(*source), disabled & (1 << i) == 0);
        }
        prop_assert_eq!(intc.pending().count_ones(), (pending & 0x7F).count_ones());
    }

    #[test]
    fn threshold_grows_with_level(ipra in any::<u16>(), iprc in any::<u16>()) {
        let (mut sched, mut intc) = controller();
        intc.write_ipr(PriorityRegister::A, ipra, &mut sched);
        intc.write_ipr(PriorityRegister::C, iprc, &mut sched);
        for level in 0u8..15 {
            let low = intc.level_bits(level);
            let high = intc.level_bits(level + 1);
            prop_assert_eq!(low & high, low);
        }
        for source in InterruptSource::ALL {
            let bit = intc.source_bit(source);
            prop_assert_eq!(bit.count_ones(), 1);
            prop_assert_ne!(intc.level_bits(intc.priority(source)) & bit, 0);
        }
    }
}

#[test]
fn blocked_status_register_masks_everything() {
    let (mut sched, mut intc) = controller();
    intc.write_ipr(PriorityRegister::C, 0x0FFF, &mut sched);
    intc.set_pending(InterruptSource::Irl0, &mut sched);
    assert!(!intc.should_fire());

    intc.recompute_imask(unblocked(0), &mut sched);
    assert!(intc.should_fire());
    assert!(sched.scheduled().any(|id| id == intc.wake_event()));
}
