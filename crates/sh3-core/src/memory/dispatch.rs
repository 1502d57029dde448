//! Address-space dispatcher routing accesses to registered handlers.

use crate::diag::{BusDiagnostics, UnmappedAccess};
use crate::memory::access::{AccessKind, AccessSet, AccessWidth, BusContext, MemoryHandler};
use crate::memory::map::{LookupTable, RegionAttributes, MAX_HANDLERS};
use crate::CoreError;

/// Index of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u8);

impl HandlerId {
    /// Returns the handler index stored in lookup entries.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot {
    accesses: AccessSet,
    handler: Box<dyn MemoryHandler>,
}

/// The processor's view of the 32-bit bus.
///
/// Accesses a handler does not declare are served as open bus: reads return
/// all-ones, writes are dropped, and both are logged and counted.
pub struct AddressSpace {
    table: LookupTable,
    slots: Vec<Slot>,
    diagnostics: BusDiagnostics,
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("table", &self.table)
            .field("handlers", &self.slots.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// Creates an address space with nothing mapped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: LookupTable::new(),
            slots: Vec::new(),
            diagnostics: BusDiagnostics::default(),
        }
    }

    /// Registers `handler` for `[base, base + size)`.
    ///
    /// # Errors
    ///
    /// Fails when the handler table is full or the range is empty or wraps.
    pub fn register(
        &mut self,
        base: u32,
        size: u32,
        handler: Box<dyn MemoryHandler>,
    ) -> Result<HandlerId, CoreError> {
        let id = self.add_handler(handler)?;
        self.map(base, size, id)?;
        Ok(id)
    }

    /// Adds a handler without mapping it, so one handler can serve several ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HandlerTableFull`] once every index is taken.
    pub fn add_handler(&mut self, handler: Box<dyn MemoryHandler>) -> Result<HandlerId, CoreError> {
        if self.slots.len() >= MAX_HANDLERS {
            return Err(CoreError::HandlerTableFull {
                registered: self.slots.len(),
            });
        }
        let id = HandlerId(self.slots.len() as u8);
        self.slots.push(Slot {
            accesses: handler.accesses(),
            handler,
        });
        Ok(id)
    }

    /// Maps `[base, base + size)` to an already added handler.
    ///
    /// # Errors
    ///
    /// Fails when the range is empty or wraps.
    pub fn map(&mut self, base: u32, size: u32, id: HandlerId) -> Result<(), CoreError> {
        self.table.map(base, size, id.0)
    }

    /// Returns the cached/MMU tags of the page holding `addr`.
    #[must_use]
    pub fn attributes(&self, addr: u32) -> Option<RegionAttributes> {
        self.table.attributes(addr)
    }

    /// Returns the handler that serves `addr`, if any.
    #[must_use]
    pub fn handler_at(&self, addr: u32) -> Option<HandlerId> {
        self.table
            .handler_index(addr)
            .and_then(|index| u8::try_from(index).ok())
            .map(HandlerId)
    }

    /// Open-bus counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &BusDiagnostics {
        &self.diagnostics
    }

    fn route(&mut self, addr: u32, kind: AccessKind, width: AccessWidth) -> Option<&mut Slot> {
        let wanted = AccessSet::single(kind, width);
        let index = self.table.handler_index(addr);
        let served = index
            .and_then(|i| self.slots.get(i))
            .is_some_and(|slot| slot.accesses.contains(wanted));
        if served {
            index.and_then(move |i| self.slots.get_mut(i))
        } else {
            self.open_bus(addr, kind, width);
            None
        }
    }

    fn open_bus(&mut self, addr: u32, kind: AccessKind, width: AccessWidth) {
        match kind {
            AccessKind::Read => {
                log::warn!("unmapped {}-bit read from {addr:#010x}", width.bits());
            }
            AccessKind::Write => {
                log::warn!("unmapped {}-bit write to {addr:#010x}", width.bits());
            }
        }
        self.diagnostics
            .record_unmapped(UnmappedAccess { kind, width, addr });
    }

    /// 8-bit read.
    pub fn read8(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u8 {
        self.route(addr, AccessKind::Read, AccessWidth::Byte)
            .map_or(u8::MAX, |slot| slot.handler.read8(addr, ctx))
    }

    /// 16-bit read.
    pub fn read16(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u16 {
        self.route(addr, AccessKind::Read, AccessWidth::Word)
            .map_or(u16::MAX, |slot| slot.handler.read16(addr, ctx))
    }

    /// 32-bit read.
    pub fn read32(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u32 {
        self.route(addr, AccessKind::Read, AccessWidth::Long)
            .map_or(u32::MAX, |slot| slot.handler.read32(addr, ctx))
    }

    /// 8-bit write.
    pub fn write8(&mut self, addr: u32, value: u8, ctx: &mut BusContext<'_>) {
        if let Some(slot) = self.route(addr, AccessKind::Write, AccessWidth::Byte) {
            slot.handler.write8(addr, value, ctx);
        }
    }

    /// 16-bit write.
    pub fn write16(&mut self, addr: u32, value: u16, ctx: &mut BusContext<'_>) {
        if let Some(slot) = self.route(addr, AccessKind::Write, AccessWidth::Word) {
            slot.handler.write16(addr, value, ctx);
        }
    }

    /// 32-bit write.
    pub fn write32(&mut self, addr: u32, value: u32, ctx: &mut BusContext<'_>) {
        if let Some(slot) = self.route(addr, AccessKind::Write, AccessWidth::Long) {
            slot.handler.write32(addr, value, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AddressSpace;
    use crate::memory::{AccessKind, AccessSet, AccessWidth, BusContext, MemoryHandler};
    use crate::onchip::Onchip;
    use crate::{CoreConfig, CoreError, Timebase};

    struct LongOnly {
        value: u32,
        writes: Vec<(u32, u32)>,
    }

    impl MemoryHandler for LongOnly {
        fn accesses(&self) -> AccessSet {
            AccessSet::READ32.union(AccessSet::WRITE32)
        }

        fn read32(&mut self, _addr: u32, _ctx: &mut BusContext<'_>) -> u32 {
            self.value
        }

        fn write32(&mut self, addr: u32, value: u32, _ctx: &mut BusContext<'_>) {
            self.writes.push((addr, value));
        }
    }

    struct Nothing;

    impl MemoryHandler for Nothing {
        fn accesses(&self) -> AccessSet {
            AccessSet::NONE
        }
    }

    fn fixture() -> (Timebase, Onchip) {
        let config = CoreConfig::default();
        let mut timebase = Timebase::new(&config);
        let onchip = Onchip::new(&mut timebase, &config);
        (timebase, onchip)
    }

    #[test]
    fn undeclared_width_is_open_bus_and_counted() {
        let (mut timebase, mut onchip) = fixture();
        let mut ctx = BusContext::new(&mut timebase, &mut onchip);
        let mut bus = AddressSpace::new();
        bus.register(
            0x1000,
            0x10,
            Box::new(LongOnly {
                value: 0x1234_5678,
                writes: Vec::new(),
            }),
        )
        .expect("register");

        assert_eq!(bus.read8(0x1000, &mut ctx), 0xFF);
        assert_eq!(bus.diagnostics().unmapped_reads, 1);
        let last = bus.diagnostics().last_unmapped.expect("recorded");
        assert_eq!(last.kind, AccessKind::Read);
        assert_eq!(last.width, AccessWidth::Byte);
        assert_eq!(last.addr, 0x1000);

        assert_eq!(bus.read32(0x1000, &mut ctx), 0x1234_5678);
        assert_eq!(bus.diagnostics().unmapped_reads, 1);
    }

    #[test]
    fn unmapped_page_reads_all_ones_for_every_width() {
        let (mut timebase, mut onchip) = fixture();
        let mut ctx = BusContext::new(&mut timebase, &mut onchip);
        let mut bus = AddressSpace::new();
        assert_eq!(bus.read8(0x4000_0000, &mut ctx), 0xFF);
        assert_eq!(bus.read16(0x4000_0000, &mut ctx), 0xFFFF);
        assert_eq!(bus.read32(0x4000_0000, &mut ctx), 0xFFFF_FFFF);
        bus.write16(0x4000_0000, 0x55AA, &mut ctx);
        assert_eq!(bus.diagnostics().unmapped_reads, 3);
        assert_eq!(bus.diagnostics().unmapped_writes, 1);
    }

    #[test]
    fn mirrored_accesses_reach_the_handler_with_raw_address() {
        let (mut timebase, mut onchip) = fixture();
        let mut ctx = BusContext::new(&mut timebase, &mut onchip);
        let mut bus = AddressSpace::new();
        bus.register(
            0x0C00_0000,
            0x400,
            Box::new(LongOnly {
                value: 7,
                writes: Vec::new(),
            }),
        )
        .expect("register");
        bus.write32(0xAC00_0010, 0xDEAD_BEEF, &mut ctx);
        assert_eq!(bus.read32(0x8C00_0000, &mut ctx), 7);
        assert_eq!(bus.handler_at(0x2C00_0000), bus.handler_at(0x0C00_0000));
        assert_eq!(bus.diagnostics().unmapped_total(), 0);
    }

    #[test]
    fn handler_table_rejects_sixty_fourth_handler() {
        let mut bus = AddressSpace::new();
        for _ in 0..63 {
            bus.add_handler(Box::new(Nothing)).expect("slot available");
        }
        assert_eq!(
            bus.add_handler(Box::new(Nothing)),
            Err(CoreError::HandlerTableFull { registered: 63 })
        );
    }

    #[test]
    fn large_low_range_registers_without_touching_p4() {
        let mut bus = AddressSpace::new();
        bus.register(0, 0x5000_0000, Box::new(Nothing))
            .expect("register");
        assert!(bus.handler_at(0x4FFF_FFFF).is_some());
        assert!(bus.handler_at(0xDFFF_FFFF).is_some());
        assert_eq!(bus.handler_at(0xE000_0000), None);
    }
}
