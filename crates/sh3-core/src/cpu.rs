//! Granule driver: runs the execution loop, fires due events and samples
//! interrupts once per budget window.

use std::sync::{Arc, Mutex};

use crate::diag::{BusDiagnostics, CpuDiagnostics};
use crate::execute::{Core, Executor};
use crate::intc::InterruptSource;
use crate::memory::{AddressSpace, HandlerId, MemoryHandler};
use crate::onchip::{
    CacheArrayHandler, Onchip, OnchipHandler, PortReader, CACHE_ARRAY_BASES, CACHE_ARRAY_SIZE,
    ONCHIP_AREA7_BASE, ONCHIP_P4_BASE, ONCHIP_REGION_SIZE,
};
use crate::peripherals::{BlitJob, JobSlot};
use crate::scheduler::EventKind;
use crate::state::CpuState;
use crate::timebase::{lock_timebase, InterruptLine, SharedTimebase, Timebase};
use crate::{CoreConfig, CoreError, GranuleOutcome};

/// Offset of the interrupt handler from VBR.
pub const INTERRUPT_OFFSET: u32 = 0x600;

/// An SH-3 processor with its on-chip peripherals and shared timebase.
#[derive(Debug)]
pub struct Cpu {
    core: Core,
    timebase: SharedTimebase,
    config: CoreConfig,
    compositor: Option<Arc<JobSlot<BlitJob>>>,
}

impl Cpu {
    /// Builds a processor with the on-chip register blocks and cache arrays
    /// mapped and the register file at its reset values.
    ///
    /// # Errors
    ///
    /// Fails when `config` is rejected by [`CoreConfig::validate`].
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let mut timebase = Timebase::new(&config);
        let onchip = Onchip::new(&mut timebase, &config);

        let mut bus = AddressSpace::new();
        let id = bus.add_handler(Box::new(OnchipHandler))?;
        bus.map(ONCHIP_P4_BASE, ONCHIP_REGION_SIZE, id)?;
        bus.map(ONCHIP_AREA7_BASE, ONCHIP_REGION_SIZE, id)?;
        let id = bus.add_handler(Box::new(CacheArrayHandler))?;
        for base in CACHE_ARRAY_BASES {
            bus.map(base, CACHE_ARRAY_SIZE, id)?;
        }

        let core = Core {
            state: CpuState::default(),
            bus,
            onchip,
            diag: CpuDiagnostics::default(),
        };
        let Timebase { scheduler, intc } = &mut timebase;
        intc.recompute_imask(core.state.sr(), scheduler);

        Ok(Self {
            core,
            timebase: Arc::new(Mutex::new(timebase)),
            config,
            compositor: None,
        })
    }

    /// Configuration the processor was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Shared handle to the scheduler and interrupt controller.
    #[must_use]
    pub fn timebase(&self) -> SharedTimebase {
        Arc::clone(&self.timebase)
    }

    /// Handle for raising interrupts from other threads.
    #[must_use]
    pub fn interrupt_line(&self) -> InterruptLine {
        InterruptLine::new(self.timebase())
    }

    /// Job slot awaited when a compositor completion event fires.
    pub fn attach_compositor(&mut self, slot: Arc<JobSlot<BlitJob>>) {
        self.compositor = Some(slot);
    }

    /// Register file.
    #[must_use]
    pub const fn state(&self) -> &CpuState {
        &self.core.state
    }

    /// Mutable register file, for loaders and tests.
    pub fn state_mut(&mut self) -> &mut CpuState {
        &mut self.core.state
    }

    /// On-chip register bank.
    #[must_use]
    pub const fn onchip(&self) -> &Onchip {
        &self.core.onchip
    }

    /// Execution counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &CpuDiagnostics {
        &self.core.diag
    }

    /// Open-bus counters of the address space.
    #[must_use]
    pub const fn bus_diagnostics(&self) -> &BusDiagnostics {
        self.core.bus.diagnostics()
    }

    /// Registers a peripheral for `[base, base + size)`.
    ///
    /// # Errors
    ///
    /// Fails when the handler table is full or the range is empty or wraps.
    pub fn register_handler(
        &mut self,
        base: u32,
        size: u32,
        handler: Box<dyn MemoryHandler>,
    ) -> Result<HandlerId, CoreError> {
        self.core.bus.register(base, size, handler)
    }

    /// Maps another range onto an already registered handler.
    ///
    /// # Errors
    ///
    /// Fails when the range is empty or wraps.
    pub fn map_handler(&mut self, base: u32, size: u32, id: HandlerId) -> Result<(), CoreError> {
        self.core.bus.map(base, size, id)
    }

    /// Attaches a host input to I/O port `port`; returns `false` if out of range.
    pub fn set_port_reader(&mut self, port: usize, reader: PortReader) -> bool {
        self.core.onchip.set_port_reader(port, reader)
    }

    /// Rewrites the register file with its reset values and clears the counters.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        self.core.state.reset();
        self.core.diag.reset();
        let Timebase { scheduler, intc } = &mut *guard;
        intc.recompute_imask(self.core.state.sr(), scheduler);
        log::debug!("processor reset, pc={:#010x}", self.core.state.pc);
        Ok(())
    }

    /// Executes one granule: instructions until the budget runs out at a
    /// branch, then due events, then at most one interrupt entry.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn run_granule(&mut self) -> Result<GranuleOutcome, CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        let timebase = &mut *guard;

        let summary = Executor::new(&mut self.core, timebase).run();
        fire_due_events(&mut self.core.onchip, self.compositor.as_deref(), timebase);
        let serviced = take_interrupt(&mut self.core, timebase);

        self.core.diag.granules = self.core.diag.granules.saturating_add(1);
        Ok(GranuleOutcome {
            cycles: summary.cycles,
            instructions: summary.instructions,
            now: timebase.scheduler.now(),
            serviced,
        })
    }

    /// Reads a byte through the bus, with side effects.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn read8(&mut self, addr: u32) -> Result<u8, CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        Ok(self.core.read8(addr, &mut guard))
    }

    /// Reads a big-endian word through the bus.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn read16(&mut self, addr: u32) -> Result<u16, CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        Ok(self.core.read16(addr, &mut guard))
    }

    /// Reads a big-endian long word through the bus.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn read32(&mut self, addr: u32) -> Result<u32, CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        Ok(self.core.read32(addr, &mut guard))
    }

    /// Writes a byte through the bus.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn write8(&mut self, addr: u32, value: u8) -> Result<(), CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        self.core.write8(addr, value, &mut guard);
        Ok(())
    }

    /// Writes a big-endian word through the bus.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn write16(&mut self, addr: u32, value: u16) -> Result<(), CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        self.core.write16(addr, value, &mut guard);
        Ok(())
    }

    /// Writes a big-endian long word through the bus.
    ///
    /// # Errors
    ///
    /// Fails when the timebase lock is poisoned.
    pub fn write32(&mut self, addr: u32, value: u32) -> Result<(), CoreError> {
        let mut guard = lock_timebase(&self.timebase)?;
        self.core.write32(addr, value, &mut guard);
        Ok(())
    }
}

fn fire_due_events(
    onchip: &mut Onchip,
    compositor: Option<&JobSlot<BlitJob>>,
    timebase: &mut Timebase,
) {
    let Timebase { scheduler, intc } = timebase;
    scheduler.test(|sched, id, kind| match kind {
        EventKind::TimerUnderflow(channel) => onchip.timer_underflow(channel, sched, intc),
        EventKind::DmaComplete(channel) => onchip.dma_complete(channel),
        EventKind::BlitComplete => {
            // The worker never takes the timebase lock.
            if let Some(slot) = compositor {
                slot.wait_idle();
            }
            intc.set_pending(InterruptSource::Irl1, sched);
        }
        EventKind::Raise(_) | EventKind::Lower(_) | EventKind::InterruptWake => {
            if !intc.apply_event(kind, sched) {
                log::warn!("event {id:?} ({kind:?}) has no owner");
            }
        }
    });
}

fn take_interrupt(core: &mut Core, timebase: &mut Timebase) -> Option<InterruptSource> {
    let vector = timebase.intc.next_service()?;
    let state = &mut core.state;
    state.spc = state.pc;
    state.ssr = state.sr().bits();
    core.onchip.events.intevt = vector.intevt;
    core.onchip.events.intevt2 = vector.intevt2;
    timebase.intc.apply_request_flag(vector.source);
    core.enter_privileged(timebase);
    core.state.pc = core.state.vbr.wrapping_add(INTERRUPT_OFFSET);
    core.state.npc = core.state.pc;
    core.diag.interrupts_serviced = core.diag.interrupts_serviced.saturating_add(1);
    log::debug!(
        "interrupt {:?} (intevt {:#x}) taken, spc={:#010x}",
        vector.source,
        vector.intevt,
        core.state.spc
    );
    Some(vector.source)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Cpu, INTERRUPT_OFFSET};
    use crate::intc::{InterruptSource, PriorityRegister};
    use crate::memory::RamHandler;
    use crate::peripherals::{BlitJob, JobSlot};
    use crate::scheduler::{EventKind, EventMode};
    use crate::state::{SR_BL, SR_MD, SR_RB};
    use crate::timebase::Timebase;
    use crate::CoreConfig;

    const RAM_BASE: u32 = 0x0C00_0000;

    fn cpu_with_program(words: &[u16]) -> Cpu {
        let mut cpu = Cpu::new(CoreConfig::default()).expect("cpu");
        cpu.register_handler(
            RAM_BASE,
            0x1_0000,
            Box::new(RamHandler::new(0x1_0000).expect("ram")),
        )
        .expect("ram");
        for (i, word) in words.iter().enumerate() {
            cpu.write16(RAM_BASE + 2 * i as u32, *word).expect("load");
        }
        cpu.state_mut().pc = RAM_BASE;
        cpu
    }

    #[test]
    fn granule_stops_after_a_branch() {
        // loop: add #1,r0 ; bra loop ; nop
        let mut cpu = cpu_with_program(&[0x7001, 0xAFFD, 0x0009]);
        let outcome = cpu.run_granule().expect("granule");
        assert_eq!(cpu.state().pc, RAM_BASE);
        assert!(outcome.cycles >= u64::from(CoreConfig::default().max_granule_cycles));
        assert_eq!(outcome.instructions, u64::from(cpu.state().gpr(0)) * 3);
        assert_eq!(cpu.diagnostics().granules, 1);
    }

    #[test]
    fn pending_interrupt_enters_handler_with_bank_one() {
        // bra . ; nop
        let mut cpu = cpu_with_program(&[0xAFFE, 0x0009]);
        cpu.state_mut().vbr = 0x8C00_0000;
        cpu.state_mut().set_sr(SR_MD);
        {
            let shared = cpu.timebase();
            let mut tb = shared.lock().expect("lock");
            let crate::timebase::Timebase { scheduler, intc } = &mut *tb;
            intc.write_ipr(PriorityRegister::C, 0x00F0, scheduler);
            intc.recompute_imask(cpu.state().sr(), scheduler);
            intc.set_pending(InterruptSource::Irl1, scheduler);
        }
        cpu.state_mut().set_gpr(0, 0x1111);
        let outcome = cpu.run_granule().expect("granule");
        assert_eq!(outcome.serviced, Some(InterruptSource::Irl1));
        let sr = cpu.state().sr().bits();
        assert_eq!(sr & (SR_MD | SR_RB | SR_BL), SR_MD | SR_RB | SR_BL);
        assert_eq!(cpu.state().pc, 0x8C00_0000 + INTERRUPT_OFFSET);
        assert_eq!(cpu.state().spc, RAM_BASE);
        assert_eq!(cpu.state().banked(0), 0x1111);
        assert_eq!(cpu.diagnostics().interrupts_serviced, 1);
    }

    #[test]
    fn completion_event_waits_for_the_job_then_raises_irl1() {
        let mut cpu = cpu_with_program(&[0xAFFE, 0x0009]);
        cpu.state_mut().vbr = 0x8C00_0000;
        cpu.state_mut().set_sr(SR_MD);
        let slot = Arc::new(JobSlot::new());
        cpu.attach_compositor(Arc::clone(&slot));
        slot.submit(BlitJob::default()).expect("submit");
        {
            let shared = cpu.timebase();
            let mut tb = shared.lock().expect("lock");
            let Timebase { scheduler, intc } = &mut *tb;
            intc.write_ipr(PriorityRegister::C, 0x00F0, scheduler);
            intc.recompute_imask(cpu.state().sr(), scheduler);
            let done = scheduler.create(1, 1, EventMode::OneShot, EventKind::BlitComplete);
            scheduler.insert(done);
        }
        let worker = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                let job = slot.take();
                std::thread::sleep(std::time::Duration::from_millis(5));
                slot.complete();
                job
            })
        };

        let outcome = cpu.run_granule().expect("granule");
        assert!(!slot.is_busy());
        assert_eq!(outcome.serviced, Some(InterruptSource::Irl1));
        assert_eq!(worker.join().expect("join"), Some(BlitJob::default()));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = CoreConfig {
            max_granule_cycles: 0,
            ..CoreConfig::default()
        };
        assert!(Cpu::new(config).is_err());
    }
}
