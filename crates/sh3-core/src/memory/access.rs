//! Access widths, handler capability sets and the peripheral handler contract.

use crate::onchip::Onchip;
use crate::Timebase;

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessWidth {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    Word,
    /// 32-bit access.
    Long,
}

impl AccessWidth {
    /// Returns the access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
        }
    }

    /// Returns the access size in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Returns the all-ones open-bus value for this width.
    #[must_use]
    pub const fn open_bus(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }
}

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// Load from the bus.
    Read,
    /// Store to the bus.
    Write,
}

/// Set of the six read/write widths a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AccessSet(u8);

impl AccessSet {
    /// No accesses served.
    pub const NONE: Self = Self(0);
    /// 8-bit reads.
    pub const READ8: Self = Self(1 << 0);
    /// 16-bit reads.
    pub const READ16: Self = Self(1 << 1);
    /// 32-bit reads.
    pub const READ32: Self = Self(1 << 2);
    /// 8-bit writes.
    pub const WRITE8: Self = Self(1 << 3);
    /// 16-bit writes.
    pub const WRITE16: Self = Self(1 << 4);
    /// 32-bit writes.
    pub const WRITE32: Self = Self(1 << 5);
    /// All reads.
    pub const READ_ALL: Self = Self(0b000_111);
    /// All writes.
    pub const WRITE_ALL: Self = Self(0b111_000);
    /// Every width in both directions.
    pub const ALL: Self = Self(0b111_111);

    /// Returns the set member for one access.
    #[must_use]
    pub const fn single(kind: AccessKind, width: AccessWidth) -> Self {
        let shift = match width {
            AccessWidth::Byte => 0,
            AccessWidth::Word => 1,
            AccessWidth::Long => 2,
        };
        match kind {
            AccessKind::Read => Self(1 << shift),
            AccessKind::Write => Self(1 << (shift + 3)),
        }
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when every member of `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Mutable core state reachable from inside a handler callback.
///
/// Handlers use it to raise or clear interrupts and to schedule events while
/// the processor thread holds the timebase lock for the current granule.
#[derive(Debug)]
pub struct BusContext<'a> {
    /// Scheduler and interrupt controller.
    pub timebase: &'a mut Timebase,
    /// On-chip register bank of the processor.
    pub onchip: &'a mut Onchip,
}

impl<'a> BusContext<'a> {
    /// Bundles the timebase and on-chip bank for one access.
    #[must_use]
    pub fn new(timebase: &'a mut Timebase, onchip: &'a mut Onchip) -> Self {
        Self { timebase, onchip }
    }
}

/// A peripheral reachable through the address space.
///
/// Only the accesses named by [`MemoryHandler::accesses`] are routed to the
/// handler; every other width is served as open bus by the dispatcher, so the
/// default method bodies are never reached for undeclared widths. Addresses are
/// passed through unmodified, including mirror bits.
pub trait MemoryHandler: Send {
    /// Accesses this handler serves.
    fn accesses(&self) -> AccessSet;

    /// 8-bit read.
    fn read8(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u8 {
        let _ = (addr, ctx);
        u8::MAX
    }

    /// 16-bit read.
    fn read16(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u16 {
        let _ = (addr, ctx);
        u16::MAX
    }

    /// 32-bit read.
    fn read32(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u32 {
        let _ = (addr, ctx);
        u32::MAX
    }

    /// 8-bit write.
    fn write8(&mut self, addr: u32, value: u8, ctx: &mut BusContext<'_>) {
        let _ = (addr, value, ctx);
    }

    /// 16-bit write.
    fn write16(&mut self, addr: u32, value: u16, ctx: &mut BusContext<'_>) {
        let _ = (addr, value, ctx);
    }

    /// 32-bit write.
    fn write32(&mut self, addr: u32, value: u32, ctx: &mut BusContext<'_>) {
        let _ = (addr, value, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessKind, AccessSet, AccessWidth};
    use rstest::rstest;

    #[rstest]
    #[case(AccessKind::Read, AccessWidth::Byte, AccessSet::READ8)]
    #[case(AccessKind::Read, AccessWidth::Word, AccessSet::READ16)]
    #[case(AccessKind::Read, AccessWidth::Long, AccessSet::READ32)]
    #[case(AccessKind::Write, AccessWidth::Byte, AccessSet::WRITE8)]
    #[case(AccessKind::Write, AccessWidth::Word, AccessSet::WRITE16)]
    #[case(AccessKind::Write, AccessWidth::Long, AccessSet::WRITE32)]
    fn single_maps_to_named_member(
        #[case] kind: AccessKind,
        #[case] width: AccessWidth,
        #[case] expected: AccessSet,
    ) {
        assert_eq!(AccessSet::single(kind, width), expected);
        assert!(AccessSet::ALL.contains(expected));
    }

    #[test]
    fn read_and_write_halves_partition_the_full_set() {
        assert_eq!(AccessSet::READ_ALL.union(AccessSet::WRITE_ALL), AccessSet::ALL);
        assert!(!AccessSet::READ_ALL.contains(AccessSet::WRITE8));
        assert!(AccessSet::READ32
            .union(AccessSet::WRITE32)
            .contains(AccessSet::WRITE32));
    }

    #[test]
    fn open_bus_is_all_ones_per_width() {
        assert_eq!(AccessWidth::Byte.open_bus(), 0xFF);
        assert_eq!(AccessWidth::Word.open_bus(), 0xFFFF);
        assert_eq!(AccessWidth::Long.open_bus(), 0xFFFF_FFFF);
        assert_eq!(AccessWidth::Long.bits(), 32);
    }
}
