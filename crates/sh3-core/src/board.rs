//! Board wiring: BIOS ROM, work RAM, the compositor and the input ports
//! around one processor.

use crate::cpu::Cpu;
use crate::memory::{RamHandler, RomHandler};
use crate::onchip::PortReader;
use crate::peripherals::{
    BlitEngine, Compositor, CompositorPort, SharedFrame, COMPOSITOR_BASE, COMPOSITOR_SIZE,
};
use crate::timebase::lock_timebase;
use crate::{CoreConfig, CoreError, GranuleOutcome};

/// Base of the BIOS flash.
pub const BIOS_BASE: u32 = 0x0000_0000;
/// Size of the BIOS flash.
pub const BIOS_SIZE: u32 = 0x0040_0000;
/// Base of work RAM.
pub const RAM_BASE: u32 = 0x0C00_0000;
/// Size of work RAM.
pub const RAM_SIZE: u32 = 0x0100_0000;

/// A processor with the board's memory and peripherals attached.
#[derive(Debug)]
pub struct Board {
    cpu: Cpu,
    compositor: Compositor,
}

impl Board {
    /// Builds the board with `bios` at the reset vector.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, a BIOS image larger than the flash, or
    /// when the compositor thread cannot be started.
    pub fn new(
        config: CoreConfig,
        bios: &[u8],
        engine: Box<dyn BlitEngine>,
    ) -> Result<Self, CoreError> {
        let mut cpu = Cpu::new(config)?;
        cpu.register_handler(
            BIOS_BASE,
            BIOS_SIZE,
            Box::new(RomHandler::new(BIOS_SIZE as usize, bios)?),
        )?;
        cpu.register_handler(
            RAM_BASE,
            RAM_SIZE,
            Box::new(RamHandler::new(RAM_SIZE as usize)?),
        )?;

        let compositor = Compositor::spawn(engine)?;
        cpu.attach_compositor(compositor.slot());
        let port = {
            let shared = cpu.timebase();
            let mut timebase = lock_timebase(&shared)?;
            CompositorPort::new(&compositor, &mut timebase, cpu.config())
        };
        cpu.register_handler(COMPOSITOR_BASE, COMPOSITOR_SIZE, Box::new(port))?;

        log::debug!("board ready, bios {} bytes", bios.len());
        Ok(Self { cpu, compositor })
    }

    /// The processor.
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable processor, for loaders and debuggers.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Compositor output.
    #[must_use]
    pub fn frame(&self) -> SharedFrame {
        self.compositor.frame()
    }

    /// Connects a host input to I/O port `port`; returns `false` if out of range.
    pub fn set_input(&mut self, port: usize, reader: PortReader) -> bool {
        self.cpu.set_port_reader(port, reader)
    }

    /// Runs one processor granule.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn run_granule(&mut self) -> Result<GranuleOutcome, CoreError> {
        self.cpu.run_granule()
    }

    /// Stops the compositor worker.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CompositorPanicked`] if the worker panicked.
    pub fn shutdown(&mut self) -> Result<(), CoreError> {
        self.compositor.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::{Board, RAM_BASE};
    use crate::peripherals::{BlitEngine, BlitJob, FrameBuffer};
    use crate::state::RESET_VECTOR;
    use crate::CoreConfig;

    struct NullEngine;

    impl BlitEngine for NullEngine {
        fn blit(&mut self, _job: &BlitJob, _frame: &mut FrameBuffer) {}
    }

    #[test]
    fn bios_is_visible_at_the_reset_vector_mirror() {
        let bios = [0xE0, 0x2A, 0x00, 0x09];
        let mut board =
            Board::new(CoreConfig::default(), &bios, Box::new(NullEngine)).expect("board");
        let cpu = board.cpu_mut();
        assert_eq!(cpu.read16(RESET_VECTOR).expect("read"), 0xE02A);
        cpu.write32(RAM_BASE | 0x8000_0000, 0xDEAD_BEEF).expect("write");
        assert_eq!(cpu.read32(RAM_BASE).expect("read"), 0xDEAD_BEEF);
        assert_eq!(cpu.read32(0xB800_0000).expect("id"), 0x2005_1119);
        board.shutdown().expect("shutdown");
    }

    #[test]
    fn input_ports_read_through_host_readers() {
        let mut board =
            Board::new(CoreConfig::default(), &[], Box::new(NullEngine)).expect("board");
        assert!(board.set_input(1, Box::new(|| 0x5A)));
        assert!(!board.set_input(11, Box::new(|| 0)));
        assert_eq!(board.cpu_mut().read8(0xA400_0122).expect("pbdr"), 0x5A);
        assert_eq!(board.cpu_mut().read8(0xA400_0120).expect("padr"), 0xFF);
    }
}
