//! Core of an SH-3 arcade board emulator: cycle scheduler, interrupt
//! controller, address-space dispatch and the execution loop tying them
//! together.

/// Setup and lifecycle errors.
pub mod error;
pub use error::{CoreError, ErrorClass};

/// Host-facing configuration and run outcome types.
pub mod api;
pub use api::{
    CoreConfig, GranuleOutcome, DEFAULT_CPU_CLOCK_HZ, DEFAULT_MAX_GRANULE_CYCLES,
    DEFAULT_PERIPHERAL_CLOCK_RATIO, DEFAULT_VBLANK_RATE_MILLIHZ, MAX_PERIPHERAL_CLOCK_RATIO,
};

/// Address-space lookup table, handler dispatch and backing stores.
pub mod memory;
pub use memory::{
    AccessKind, AccessSet, AccessWidth, AddressSpace, BusContext, HandlerId, MemoryHandler,
    RamHandler, RegionAttributes, RomHandler,
};

/// Open-bus and execution counters.
pub mod diag;
pub use diag::{BusDiagnostics, CpuDiagnostics, UnmappedAccess};

/// Expiry-ordered event scheduler.
pub mod scheduler;
pub use scheduler::{Event, EventId, EventKind, EventMode, Scheduler};

/// Priority-ordered interrupt controller.
pub mod intc;
pub use intc::{InterruptController, InterruptSource, PriorityRegister, ServiceVector};

/// Scheduler plus interrupt controller behind one lock.
pub mod timebase;
pub use timebase::{lock_timebase, InterruptLine, SharedTimebase, Timebase};

/// Register file and delay-slot state.
pub mod state;
pub use state::{CpuState, SlotState, StatusRegister};

/// On-chip peripheral registers: timers, DMA, interrupt and port registers.
pub mod onchip;
pub use onchip::{DmaController, Onchip, PortReader, TimerUnit};

/// Instruction decoding into [`decoder::Instruction`].
pub mod decoder;
pub use decoder::{decode, Instruction};

/// Instruction cycle-cost table.
pub mod timing;
pub use timing::{cycle_cost, CycleCostKind, CYCLE_COST_TABLE};

/// Instruction execution.
pub mod execute;
pub use execute::{Core, Executor, RunSummary};

/// Granule driver.
pub mod cpu;
pub use cpu::Cpu;

/// Board peripherals outside the processor.
pub mod peripherals;
pub use peripherals::{BlitEngine, BlitJob, Compositor, CompositorPort, FrameBuffer, JobSlot};

/// Board memory map and wiring.
pub mod board;
pub use board::Board;

/// Processor thread.
pub mod session;
pub use session::Session;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
