//! On-chip peripheral register bank.
//!
//! Registers are typed fields on [`Onchip`]; [`registers::ONCHIP_REGISTERS`]
//! maps bus addresses onto them. Accesses narrower or wider than a register
//! are composed byte by byte, big-endian, so a 32-bit read spanning two
//! 16-bit registers sees both. Bytes no register claims fall back to a sparse
//! store that reads back what was last written.

/// DMA controller.
pub mod dma;
/// Register address table.
pub mod registers;
/// Timer unit.
pub mod tmu;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::intc::InterruptController;
use crate::memory::{AccessSet, AccessWidth, BusContext, MemoryHandler};
use crate::scheduler::Scheduler;
use crate::timebase::Timebase;
use crate::CoreConfig;

pub use dma::{DmaChannel, DmaController, DmaTransfer, DMA_CHANNELS};
pub use registers::{
    register_by_name, RegisterDescriptor, RegisterField, CACHE_ARRAY_BASES, CACHE_ARRAY_SIZE,
    ONCHIP_AREA7_BASE, ONCHIP_P4_BASE, ONCHIP_REGION_SIZE, ONCHIP_REGISTERS, PORT_COUNT,
};
pub use tmu::{TimerChannel, TimerUnit, TIMER_CHANNELS};

/// Supplies the current level of an input port.
pub type PortReader = Box<dyn FnMut() -> u8 + Send>;

/// Exception and interrupt event registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EventRegisters {
    /// TRAPA immediate, shifted left by two.
    pub tra: u32,
    /// Exception code.
    pub expevt: u32,
    /// Interrupt code.
    pub intevt: u32,
    /// Interrupt source code.
    pub intevt2: u32,
}

/// On-chip peripheral state.
pub struct Onchip {
    index: HashMap<u32, (usize, u32)>,
    plain: Vec<u32>,
    loose: BTreeMap<u32, u8>,
    /// Exception and interrupt event registers.
    pub events: EventRegisters,
    /// Timer unit.
    pub timers: TimerUnit,
    /// DMA controller.
    pub dma: DmaController,
    ports: [u8; PORT_COUNT],
    port_readers: [Option<PortReader>; PORT_COUNT],
}

impl fmt::Debug for Onchip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let readers = self.port_readers.iter().filter(|r| r.is_some()).count();
        f.debug_struct("Onchip")
            .field("events", &self.events)
            .field("timers", &self.timers)
            .field("dma", &self.dma)
            .field("ports", &self.ports)
            .field("port_readers", &readers)
            .field("loose_bytes", &self.loose.len())
            .finish_non_exhaustive()
    }
}

impl Onchip {
    /// Builds the register index and creates the timer and DMA events.
    #[must_use]
    pub fn new(timebase: &mut Timebase, config: &CoreConfig) -> Self {
        let mut index = HashMap::new();
        for (slot, desc) in ONCHIP_REGISTERS.iter().enumerate() {
            for offset in 0..desc.width.bytes() {
                index.insert(desc.addr + offset, (slot, offset));
            }
        }
        Self {
            index,
            plain: vec![0; ONCHIP_REGISTERS.len()],
            loose: BTreeMap::new(),
            events: EventRegisters::default(),
            timers: TimerUnit::new(&mut timebase.scheduler, config.peripheral_clock_ratio),
            dma: DmaController::new(&mut timebase.scheduler),
            ports: [0; PORT_COUNT],
            port_readers: std::array::from_fn(|_| None),
        }
    }

    /// Installs the function sampled when port `port` is read.
    ///
    /// Returns `false` when `port` is out of range.
    pub fn set_port_reader(&mut self, port: usize, reader: PortReader) -> bool {
        match self.port_readers.get_mut(port) {
            Some(slot) => {
                *slot = Some(reader);
                true
            }
            None => false,
        }
    }

    /// Last value written to port `port`.
    #[must_use]
    pub fn port_output(&self, port: usize) -> Option<u8> {
        self.ports.get(port).copied()
    }

    /// Reads `width` bytes starting at `addr`, big-endian.
    pub fn read(&mut self, addr: u32, width: AccessWidth, timebase: &mut Timebase) -> u32 {
        let mut value = 0u32;
        let mut offset = 0;
        while offset < width.bytes() {
            let at = addr.wrapping_add(offset);
            if let Some(&(slot, first)) = self.index.get(&at) {
                let desc = &ONCHIP_REGISTERS[slot];
                let take = (desc.width.bytes() - first).min(width.bytes() - offset);
                let reg = self.load(slot, timebase);
                for byte in 0..take {
                    value = (value << 8) | u32::from(byte_of(reg, desc.width, first + byte));
                }
                offset += take;
            } else {
                value = (value << 8) | u32::from(self.loose.get(&at).copied().unwrap_or(0));
                offset += 1;
            }
        }
        value
    }

    /// Writes the low `width` bytes of `value` starting at `addr`, big-endian.
    pub fn write(&mut self, addr: u32, width: AccessWidth, value: u32, timebase: &mut Timebase) {
        let mut offset = 0;
        while offset < width.bytes() {
            let at = addr.wrapping_add(offset);
            if let Some(&(slot, first)) = self.index.get(&at) {
                let desc = &ONCHIP_REGISTERS[slot];
                let take = (desc.width.bytes() - first).min(width.bytes() - offset);
                let mut merged = if take == desc.width.bytes() {
                    0
                } else {
                    self.load(slot, timebase)
                };
                for byte in 0..take {
                    let shift = lane_shift(desc.width, first + byte);
                    let lane = u32::from(byte_of(value, width, offset + byte));
                    merged = (merged & !(0xFF << shift)) | (lane << shift);
                }
                self.store(slot, merged, timebase);
                offset += take;
            } else {
                log::trace!("on-chip byte {at:#010x} has no register");
                self.loose.insert(at, byte_of(value, width, offset));
                offset += 1;
            }
        }
    }

    fn load(&mut self, slot: usize, timebase: &Timebase) -> u32 {
        use RegisterField as F;
        match ONCHIP_REGISTERS[slot].field {
            F::Plain => self.plain[slot],
            F::Tra => self.events.tra,
            F::Expevt => self.events.expevt,
            F::Intevt => self.events.intevt,
            F::Intevt2 => self.events.intevt2,
            F::Ipr(register) => u32::from(timebase.intc.ipr(register)),
            F::Irr0 => u32::from(timebase.intc.irr0()),
            F::Tocr => u32::from(self.timers.tocr),
            F::Tstr => u32::from(self.timers.tstr()),
            F::Tcor(ch) => self.timers.channel(usize::from(ch)).tcor,
            F::Tcnt(ch) => self.timers.tcnt(usize::from(ch), &timebase.scheduler),
            F::Tcr(ch) => u32::from(self.timers.channel(usize::from(ch)).tcr()),
            F::Tcpr2 => self.timers.tcpr2,
            F::Sar(ch) => self.dma.channel(usize::from(ch)).sar,
            F::Dar(ch) => self.dma.channel(usize::from(ch)).dar,
            F::Dmatcr(ch) => self.dma.channel(usize::from(ch)).dmatcr,
            F::Chcr(ch) => self.dma.channel(usize::from(ch)).chcr(),
            F::Dmaor => u32::from(self.dma.dmaor),
            F::PortData(port) => {
                let port = usize::from(port);
                self.port_readers[port]
                    .as_mut()
                    .map_or(0xFF, |reader| u32::from(reader()))
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn store(&mut self, slot: usize, value: u32, timebase: &mut Timebase) {
        use RegisterField as F;
        let Timebase { scheduler, intc } = timebase;
        match ONCHIP_REGISTERS[slot].field {
            F::Plain => self.plain[slot] = value,
            F::Tra => self.events.tra = value,
            F::Expevt => self.events.expevt = value,
            F::Intevt => self.events.intevt = value,
            F::Intevt2 => self.events.intevt2 = value,
            F::Ipr(register) => intc.write_ipr(register, value as u16, scheduler),
            F::Irr0 => intc.write_irr0(value as u8, scheduler),
            F::Tocr => self.timers.tocr = value as u8,
            F::Tstr => self.timers.write_tstr(value as u8, scheduler),
            F::Tcor(ch) => self.timers.set_tcor(usize::from(ch), value),
            F::Tcnt(ch) => self.timers.set_tcnt(usize::from(ch), value, scheduler),
            F::Tcr(ch) => self
                .timers
                .write_tcr(usize::from(ch), value as u16, scheduler, intc),
            F::Tcpr2 => self.timers.tcpr2 = value,
            F::Sar(ch) => self.dma.channel_mut(usize::from(ch)).sar = value,
            F::Dar(ch) => self.dma.channel_mut(usize::from(ch)).dar = value,
            F::Dmatcr(ch) => self.dma.channel_mut(usize::from(ch)).dmatcr = value,
            F::Chcr(ch) => self.dma.write_chcr(usize::from(ch), value),
            F::Dmaor => self.dma.dmaor = value as u16,
            F::PortData(port) => self.ports[usize::from(port)] = value as u8,
        }
    }

    /// Handles a timer underflow event.
    pub fn timer_underflow(
        &mut self,
        channel: u8,
        scheduler: &mut Scheduler,
        intc: &mut InterruptController,
    ) {
        self.timers.underflow(usize::from(channel), scheduler, intc);
    }

    /// Handles a DMA completion event.
    pub fn dma_complete(&mut self, channel: u8) {
        self.dma.complete(usize::from(channel));
    }

    /// Takes a latched DMA request, scheduling its completion.
    pub fn take_dma_request(&mut self, timebase: &mut Timebase) -> Option<DmaTransfer> {
        self.dma.take_request(&mut timebase.scheduler)
    }
}

const fn lane_shift(width: AccessWidth, byte: u32) -> u32 {
    (width.bytes() - 1 - byte) * 8
}

#[allow(clippy::cast_possible_truncation)]
const fn byte_of(value: u32, width: AccessWidth, byte: u32) -> u8 {
    (value >> lane_shift(width, byte)) as u8
}

/// Bus handler for both on-chip register blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnchipHandler;

impl MemoryHandler for OnchipHandler {
    fn accesses(&self) -> AccessSet {
        AccessSet::ALL
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read8(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u8 {
        ctx.onchip.read(addr, AccessWidth::Byte, ctx.timebase) as u8
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read16(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u16 {
        ctx.onchip.read(addr, AccessWidth::Word, ctx.timebase) as u16
    }

    fn read32(&mut self, addr: u32, ctx: &mut BusContext<'_>) -> u32 {
        ctx.onchip.read(addr, AccessWidth::Long, ctx.timebase)
    }

    fn write8(&mut self, addr: u32, value: u8, ctx: &mut BusContext<'_>) {
        ctx.onchip
            .write(addr, AccessWidth::Byte, u32::from(value), ctx.timebase);
    }

    fn write16(&mut self, addr: u32, value: u16, ctx: &mut BusContext<'_>) {
        ctx.onchip
            .write(addr, AccessWidth::Word, u32::from(value), ctx.timebase);
    }

    fn write32(&mut self, addr: u32, value: u32, ctx: &mut BusContext<'_>) {
        ctx.onchip.write(addr, AccessWidth::Long, value, ctx.timebase);
    }
}

/// Cache address and data arrays: 32-bit only, reads return zero, writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheArrayHandler;

impl MemoryHandler for CacheArrayHandler {
    fn accesses(&self) -> AccessSet {
        AccessSet::READ32.union(AccessSet::WRITE32)
    }

    fn read32(&mut self, _addr: u32, _ctx: &mut BusContext<'_>) -> u32 {
        0
    }

    fn write32(&mut self, _addr: u32, _value: u32, _ctx: &mut BusContext<'_>) {}
}
