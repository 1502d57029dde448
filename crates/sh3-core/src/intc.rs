//! Interrupt controller: priority-ordered bit assignment, pending/mask
//! bookkeeping and the service decision.
//!
//! Every source owns one bit of the 32-bit pending and mask words. Bits are
//! handed out in ascending priority, so for any two sources the higher bit
//! index has the higher (or equal) priority and plain unsigned comparison of
//! `pending & mask` against `imask` tells whether anything unmasked outranks
//! the processor's current level.

use crate::scheduler::{EventId, EventKind, Scheduler};
use crate::state::StatusRegister;

/// Number of priority levels encoded in SR.IMASK and the IPR nibbles.
pub const PRIORITY_LEVELS: usize = 16;

/// Interrupt sources known to the controller, in declaration order.
///
/// Declaration order is load-bearing: among sources sharing a priority level,
/// later-declared sources receive lower bit indices and therefore lose ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptSource {
    /// External interrupt line 0.
    Irl0,
    /// External interrupt line 1 (compositor completion on this board).
    Irl1,
    /// External interrupt line 2 (vertical blank on this board).
    Irl2,
    /// TMU channel 0 underflow.
    Tuni0,
    /// TMU channel 1 underflow.
    Tuni1,
    /// TMU channel 2 underflow.
    Tuni2,
    /// TMU channel 2 input capture.
    Ticpi2,
}

impl InterruptSource {
    /// All sources in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Irl0,
        Self::Irl1,
        Self::Irl2,
        Self::Tuni0,
        Self::Tuni1,
        Self::Tuni2,
        Self::Ticpi2,
    ];

    /// Number of declared sources.
    pub const COUNT: usize = Self::ALL.len();

    /// Declaration index, also the row in [`SOURCE_TABLE`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Underflow source of a TMU channel.
    #[must_use]
    pub const fn timer_underflow(channel: usize) -> Option<Self> {
        match channel {
            0 => Some(Self::Tuni0),
            1 => Some(Self::Tuni1),
            2 => Some(Self::Tuni2),
            _ => None,
        }
    }

    /// External interrupt line `n`.
    #[must_use]
    pub const fn irl(n: usize) -> Option<Self> {
        match n {
            0 => Some(Self::Irl0),
            1 => Some(Self::Irl1),
            2 => Some(Self::Irl2),
            _ => None,
        }
    }
}

/// The five interrupt priority registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PriorityRegister {
    /// IPRA at `0xFFFF_FEE2`.
    A,
    /// IPRB at `0xFFFF_FEE4`.
    B,
    /// IPRC at `0xA400_0016`.
    C,
    /// IPRD at `0xA400_0018`.
    D,
    /// IPRE at `0xA400_001A`.
    E,
}

impl PriorityRegister {
    /// All registers, A through E.
    pub const ALL: [Self; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Bus address of the register.
    #[must_use]
    pub const fn address(self) -> u32 {
        match self {
            Self::A => 0xFFFF_FEE2,
            Self::B => 0xFFFF_FEE4,
            Self::C => 0xA400_0016,
            Self::D => 0xA400_0018,
            Self::E => 0xA400_001A,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Location of a source's 4-bit priority inside an IPR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriorityField {
    /// Register holding the nibble.
    pub register: PriorityRegister,
    /// Bit position of the nibble's least significant bit.
    pub shift: u8,
}

/// How a source's INTEVT code is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorCode {
    /// Fixed code.
    Fixed(u32),
    /// IRL-style code derived from the source's priority.
    IrlLevel,
}

impl VectorCode {
    /// Resolves the INTEVT code for a source at `priority`.
    #[must_use]
    pub const fn resolve(self, priority: u8) -> u32 {
        match self {
            Self::Fixed(code) => code,
            Self::IrlLevel => (16 - priority as u32) * 0x20 + 0x200,
        }
    }
}

/// Static description of one interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceDescriptor {
    /// The source.
    pub source: InterruptSource,
    /// Where its priority is programmed.
    pub priority: PriorityField,
    /// INTEVT code.
    pub intevt: VectorCode,
    /// INTEVT2 code.
    pub intevt2: u32,
    /// IRR0 bit set when the source is taken, for self-acknowledging lines.
    pub request_flag: Option<u8>,
}

const fn field(register: PriorityRegister, shift: u8) -> PriorityField {
    PriorityField { register, shift }
}

/// Per-source table, indexed by [`InterruptSource::index`].
pub const SOURCE_TABLE: [SourceDescriptor; InterruptSource::COUNT] = [
    SourceDescriptor {
        source: InterruptSource::Irl0,
        priority: field(PriorityRegister::C, 0),
        intevt: VectorCode::IrlLevel,
        intevt2: 0x600,
        request_flag: Some(0),
    },
    SourceDescriptor {
        source: InterruptSource::Irl1,
        priority: field(PriorityRegister::C, 4),
        intevt: VectorCode::IrlLevel,
        intevt2: 0x620,
        request_flag: Some(1),
    },
    SourceDescriptor {
        source: InterruptSource::Irl2,
        priority: field(PriorityRegister::C, 8),
        intevt: VectorCode::IrlLevel,
        intevt2: 0x640,
        request_flag: Some(2),
    },
    SourceDescriptor {
        source: InterruptSource::Tuni0,
        priority: field(PriorityRegister::A, 12),
        intevt: VectorCode::Fixed(0x400),
        intevt2: 0x400,
        request_flag: None,
    },
    SourceDescriptor {
        source: InterruptSource::Tuni1,
        priority: field(PriorityRegister::A, 8),
        intevt: VectorCode::Fixed(0x420),
        intevt2: 0x420,
        request_flag: None,
    },
    SourceDescriptor {
        source: InterruptSource::Tuni2,
        priority: field(PriorityRegister::A, 4),
        intevt: VectorCode::Fixed(0x440),
        intevt2: 0x440,
        request_flag: None,
    },
    SourceDescriptor {
        source: InterruptSource::Ticpi2,
        priority: field(PriorityRegister::A, 4),
        intevt: VectorCode::Fixed(0x460),
        intevt2: 0x460,
        request_flag: None,
    },
];

const fn assert_source_table_order() {
    let mut i = 0;
    while i < SOURCE_TABLE.len() {
        assert!(SOURCE_TABLE[i].source as usize == i);
        i += 1;
    }
}

const _: () = assert_source_table_order();

/// What to load when a pending bit is serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ServiceVector {
    /// Bit index in the pending word.
    pub bit: u8,
    /// Source owning the bit.
    pub source: InterruptSource,
    /// Code written to INTEVT.
    pub intevt: u32,
    /// Code written to INTEVT2.
    pub intevt2: u32,
}

/// Priority-ordered interrupt state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InterruptController {
    pending: u32,
    mask: u32,
    imask: u32,
    source_bit: [u32; InterruptSource::COUNT],
    vectors: [Option<ServiceVector>; 32],
    level_bits: [u32; PRIORITY_LEVELS],
    ipr: [u16; 5],
    irr0: u8,
    sr_imask: u8,
    blocked: bool,
    wake: EventId,
}

impl InterruptController {
    /// Creates a controller with every source unmasked and nothing pending.
    ///
    /// `wake` is the zero-delay one-shot event inserted whenever a serviceable
    /// interrupt appears. The initial state matches SR after reset, which has
    /// BL set.
    #[must_use]
    pub fn new(wake: EventId) -> Self {
        let mut intc = Self {
            pending: 0,
            mask: u32::MAX,
            imask: u32::MAX,
            source_bit: [0; InterruptSource::COUNT],
            vectors: [None; 32],
            level_bits: [0; PRIORITY_LEVELS],
            ipr: [0; 5],
            irr0: 0,
            sr_imask: 15,
            blocked: true,
            wake,
        };
        intc.remap();
        intc.mask = u32::MAX;
        intc
    }

    /// Event inserted to wake the execution loop.
    #[must_use]
    pub const fn wake_event(&self) -> EventId {
        self.wake
    }

    /// Pending word.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.pending
    }

    /// Mask word; a set bit means the source is enabled.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    /// Current masking threshold.
    #[must_use]
    pub const fn imask(&self) -> u32 {
        self.imask
    }

    /// Bit currently assigned to `source`.
    #[must_use]
    pub const fn source_bit(&self, source: InterruptSource) -> u32 {
        self.source_bit[source.index()]
    }

    /// Union of the bits of every source at or below `level`.
    #[must_use]
    pub const fn level_bits(&self, level: u8) -> u32 {
        self.level_bits[(level & 0x0F) as usize]
    }

    /// Whether `source` is pending.
    #[must_use]
    pub const fn is_pending(&self, source: InterruptSource) -> bool {
        self.pending & self.source_bit(source) != 0
    }

    /// Whether `source` is enabled.
    #[must_use]
    pub const fn is_enabled(&self, source: InterruptSource) -> bool {
        self.mask & self.source_bit(source) != 0
    }

    /// Programmed priority of `source`.
    #[must_use]
    pub const fn priority(&self, source: InterruptSource) -> u8 {
        let field = SOURCE_TABLE[source.index()].priority;
        ((self.ipr[field.register.index()] >> field.shift) & 0x0F) as u8
    }

    /// Raw value of an IPR.
    #[must_use]
    pub const fn ipr(&self, register: PriorityRegister) -> u16 {
        self.ipr[register.index()]
    }

    /// Stores an IPR and reassigns bits.
    pub fn write_ipr(&mut self, register: PriorityRegister, value: u16, sched: &mut Scheduler) {
        self.ipr[register.index()] = value;
        self.recompute_interrupt(sched);
    }

    /// IRR0 request flags.
    #[must_use]
    pub const fn irr0(&self) -> u8 {
        self.irr0
    }

    /// Stores IRR0; every IRL whose flag is written as zero stops pending.
    pub fn write_irr0(&mut self, value: u8, sched: &mut Scheduler) {
        self.irr0 = value;
        for line in 0..3 {
            if value & (1 << line) == 0 {
                if let Some(source) = InterruptSource::irl(line) {
                    self.clear_pending(source, sched);
                }
            }
        }
    }

    /// Reassigns bits after a priority change and re-derives `imask`.
    pub fn recompute_interrupt(&mut self, sched: &mut Scheduler) {
        self.remap();
        self.refresh_imask(sched);
    }

    /// Walks levels upward and, within a level, sources in reverse
    /// declaration order, handing out consecutive bits and carrying each
    /// source's pending/mask state to its new bit.
    fn remap(&mut self) {
        let old_pending = self.pending;
        let old_mask = self.mask;
        self.pending = 0;
        self.mask = 0;
        self.vectors = [None; 32];

        let mut next_bit = 0u32;
        for level in 0..PRIORITY_LEVELS {
            for desc in SOURCE_TABLE.iter().rev() {
                let priority = self.priority(desc.source);
                if usize::from(priority) != level {
                    continue;
                }
                let old_bit = self.source_bit[desc.source.index()];
                let new_bit = 1u32 << next_bit;
                if old_pending & old_bit != 0 {
                    self.pending |= new_bit;
                }
                if old_mask & old_bit != 0 {
                    self.mask |= new_bit;
                }
                self.source_bit[desc.source.index()] = new_bit;
                self.vectors[next_bit as usize] = Some(ServiceVector {
                    bit: next_bit as u8,
                    source: desc.source,
                    intevt: desc.intevt.resolve(priority),
                    intevt2: desc.intevt2,
                });
                next_bit += 1;
            }
            self.level_bits[level] = 1u32.checked_shl(next_bit).map_or(u32::MAX, |b| b - 1);
        }
    }

    /// Marks `source` pending.
    pub fn set_pending(&mut self, source: InterruptSource, sched: &mut Scheduler) {
        self.pending |= self.source_bit(source);
        self.check_fire(sched);
    }

    /// Clears `source`'s pending state.
    pub fn clear_pending(&mut self, source: InterruptSource, sched: &mut Scheduler) {
        self.pending &= !self.source_bit(source);
        self.check_fire(sched);
    }

    /// Enables `source`.
    pub fn set_mask(&mut self, source: InterruptSource, sched: &mut Scheduler) {
        self.mask |= self.source_bit(source);
        self.check_fire(sched);
    }

    /// Disables `source`.
    pub fn clear_mask(&mut self, source: InterruptSource, sched: &mut Scheduler) {
        self.mask &= !self.source_bit(source);
        self.check_fire(sched);
    }

    /// Re-derives `imask` from SR.BL and SR.IMASK.
    pub fn recompute_imask(&mut self, sr: StatusRegister, sched: &mut Scheduler) {
        self.blocked = sr.bl();
        self.sr_imask = sr.imask();
        self.refresh_imask(sched);
    }

    fn refresh_imask(&mut self, sched: &mut Scheduler) {
        self.imask = if self.blocked {
            u32::MAX
        } else {
            self.level_bits(self.sr_imask)
        };
        self.check_fire(sched);
    }

    /// Whether some unmasked pending source outranks `imask`.
    #[must_use]
    pub const fn should_fire(&self) -> bool {
        self.pending & self.mask > self.imask
    }

    fn check_fire(&self, sched: &mut Scheduler) {
        if self.should_fire() {
            sched.insert(self.wake);
        }
    }

    /// Highest-priority serviceable source, if the fire condition holds.
    #[must_use]
    pub fn next_service(&self) -> Option<ServiceVector> {
        if !self.should_fire() {
            return None;
        }
        let active = self.pending & self.mask;
        let bit = 31 - active.leading_zeros();
        self.vectors[bit as usize]
    }

    /// Applies a `Raise`/`Lower` event fired by the scheduler.
    ///
    /// Returns `false` for kinds owned by another subsystem.
    pub fn apply_event(&mut self, kind: EventKind, sched: &mut Scheduler) -> bool {
        match kind {
            EventKind::Raise(source) => self.set_pending(source, sched),
            EventKind::Lower(source) => self.clear_pending(source, sched),
            EventKind::InterruptWake => {}
            EventKind::TimerUnderflow(_)
            | EventKind::DmaComplete(_)
            | EventKind::BlitComplete => return false,
        }
        true
    }

    /// Sets the IRR0 flag of a self-acknowledging source being taken.
    pub fn apply_request_flag(&mut self, source: InterruptSource) {
        if let Some(flag) = SOURCE_TABLE[source.index()].request_flag {
            self.irr0 |= 1 << flag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InterruptController, InterruptSource, PriorityRegister, SOURCE_TABLE};
    use crate::scheduler::{EventKind, EventMode, Scheduler};
    use crate::state::StatusRegister;

    fn fixture() -> (Scheduler, InterruptController) {
        let mut sched = Scheduler::new(10_000);
        let wake = sched.create(0, 0, EventMode::OneShot, EventKind::InterruptWake);
        (sched, InterruptController::new(wake))
    }

    fn unblocked(imask: u8) -> StatusRegister {
        let mut sr = StatusRegister::from_bits(0x4000_0000);
        sr.set_imask(imask);
        sr
    }

    #[test]
    fn equal_priorities_give_later_sources_lower_bits() {
        let (_, intc) = fixture();
        let bits: Vec<u32> = InterruptSource::ALL
            .iter()
            .map(|&s| intc.source_bit(s))
            .collect();
        assert_eq!(bits, vec![1 << 6, 1 << 5, 1 << 4, 1 << 3, 1 << 2, 1 << 1, 1 << 0]);
        assert_eq!(intc.level_bits(0), 0x7F);
    }

    #[test]
    fn higher_priority_gets_higher_bit_after_ipr_write() {
        let (mut sched, mut intc) = fixture();
        // TMU0 at level 12, IRL2 at level 3.
        intc.write_ipr(PriorityRegister::A, 0xC000, &mut sched);
        intc.write_ipr(PriorityRegister::C, 0x0300, &mut sched);
        assert_eq!(intc.source_bit(InterruptSource::Tuni0), 1 << 6);
        assert_eq!(intc.source_bit(InterruptSource::Irl2), 1 << 5);
        assert_eq!(intc.level_bits(2), 0x1F);
        assert_eq!(intc.level_bits(3), 0x3F);
        assert_eq!(intc.level_bits(15), 0x7F);
    }

    #[test]
    fn remap_preserves_pending_and_mask_truth() {
        let (mut sched, mut intc) = fixture();
        intc.set_pending(InterruptSource::Tuni1, &mut sched);
        intc.clear_mask(InterruptSource::Irl0, &mut sched);
        intc.write_ipr(PriorityRegister::A, 0x0A00, &mut sched);
        assert!(intc.is_pending(InterruptSource::Tuni1));
        assert!(!intc.is_pending(InterruptSource::Tuni0));
        assert!(!intc.is_enabled(InterruptSource::Irl0));
        assert!(intc.is_enabled(InterruptSource::Tuni1));
        assert_eq!(intc.pending().count_ones(), 1);
    }

    #[test]
    fn level_three_wins_over_level_one() {
        let (mut sched, mut intc) = fixture();
        intc.write_ipr(PriorityRegister::C, 0x0031, &mut sched);
        intc.set_pending(InterruptSource::Irl0, &mut sched);
        intc.set_pending(InterruptSource::Irl1, &mut sched);
        intc.recompute_imask(unblocked(0), &mut sched);
        assert_eq!(intc.imask(), intc.level_bits(0));
        let vector = intc.next_service().expect("serviceable");
        assert_eq!(vector.source, InterruptSource::Irl1);
        assert_eq!(vector.intevt, 0x200 + (16 - 3) * 0x20);
        assert_eq!(vector.intevt2, 0x620);
    }

    #[test]
    fn blocked_sr_masks_everything() {
        let (mut sched, mut intc) = fixture();
        intc.write_ipr(PriorityRegister::C, 0x000F, &mut sched);
        intc.set_pending(InterruptSource::Irl0, &mut sched);
        assert_eq!(intc.imask(), u32::MAX);
        assert_eq!(intc.next_service(), None);
    }

    #[test]
    fn fire_condition_schedules_wake() {
        let (mut sched, mut intc) = fixture();
        intc.write_ipr(PriorityRegister::A, 0x5000, &mut sched);
        intc.recompute_imask(unblocked(4), &mut sched);
        assert!(!sched.is_enabled(intc.wake_event()));
        intc.set_pending(InterruptSource::Tuni0, &mut sched);
        assert!(sched.is_enabled(intc.wake_event()));
        assert_eq!(sched.budget(), 0);
    }

    #[test]
    fn masked_or_low_priority_sources_never_fire() {
        let (mut sched, mut intc) = fixture();
        intc.write_ipr(PriorityRegister::A, 0x5000, &mut sched);
        intc.recompute_imask(unblocked(5), &mut sched);
        intc.set_pending(InterruptSource::Tuni0, &mut sched);
        assert_eq!(intc.next_service(), None);
        intc.recompute_imask(unblocked(4), &mut sched);
        intc.clear_mask(InterruptSource::Tuni0, &mut sched);
        assert_eq!(intc.next_service(), None);
    }

    #[test]
    fn irr0_write_clears_irl_lines_written_as_zero() {
        let (mut sched, mut intc) = fixture();
        intc.set_pending(InterruptSource::Irl0, &mut sched);
        intc.set_pending(InterruptSource::Irl2, &mut sched);
        intc.apply_request_flag(InterruptSource::Irl0);
        intc.apply_request_flag(InterruptSource::Irl2);
        assert_eq!(intc.irr0(), 0b101);
        intc.write_irr0(0b100, &mut sched);
        assert!(!intc.is_pending(InterruptSource::Irl0));
        assert!(intc.is_pending(InterruptSource::Irl2));
    }

    #[test]
    fn timer_sources_have_no_request_flag() {
        let (_, mut intc) = fixture();
        intc.apply_request_flag(InterruptSource::Tuni2);
        assert_eq!(intc.irr0(), 0);
        assert!(SOURCE_TABLE
            .iter()
            .filter(|d| d.request_flag.is_some())
            .all(|d| d.source <= InterruptSource::Irl2));
    }
}
