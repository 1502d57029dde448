//! Sprite compositor: register port on the processor bus and the worker
//! thread that runs display lists against the shared framebuffer.
//!
//! Blend math lives behind [`BlitEngine`]; this module only owns the
//! handoff. A write of a non-zero value to the start register snapshots the
//! job registers, submits them through a [`JobSlot`] and arms a one-cycle
//! [`EventKind::BlitComplete`] event. The worker runs the engine and completes
//! the slot; the processor thread raises IRL1 when the event fires, after
//! waiting for that completion. Vertical blank is a periodic scheduler event
//! raising IRL2.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::intc::InterruptSource;
use crate::memory::{AccessSet, BusContext, MemoryHandler};
use crate::peripherals::JobSlot;
use crate::scheduler::{EventId, EventKind, EventMode};
use crate::timebase::Timebase;
use crate::{CoreConfig, CoreError};

/// Bus address of the compositor port.
pub const COMPOSITOR_BASE: u32 = 0xB800_0000;
/// Size of the decoded port window.
pub const COMPOSITOR_SIZE: u32 = 0x1_0000;
/// Value of the identification register.
pub const COMPOSITOR_ID: u32 = 0x2005_1119;

/// Identification register.
pub const REG_ID: u32 = 0x00;
/// Start register; a non-zero write submits a job.
pub const REG_START: u32 = 0x04;
/// Display-list address.
pub const REG_LIST: u32 = 0x08;
/// Status register.
pub const REG_STATUS: u32 = 0x10;
/// Horizontal scroll.
pub const REG_SCROLL_X: u32 = 0x14;
/// Vertical scroll.
pub const REG_SCROLL_Y: u32 = 0x18;
/// Interrupt acknowledge.
pub const REG_ACK: u32 = 0x24;
/// Clip rectangle top-left.
pub const REG_CLIP_MIN: u32 = 0x40;
/// Clip rectangle bottom-right.
pub const REG_CLIP_MAX: u32 = 0x44;
/// Fixed-value probe register.
pub const REG_PROBE: u32 = 0x50;

/// Status while a job is outstanding.
pub const STATUS_BUSY: u32 = 0x00;
/// Status when idle.
pub const STATUS_IDLE: u32 = 0x10;
/// Value read back from the probe register.
pub const PROBE_VALUE: u8 = 0xFE;
/// Acknowledge bit clearing the vertical-blank line.
pub const ACK_VBLANK: u32 = 1 << 0;
/// Acknowledge bit clearing the completion line.
pub const ACK_BLIT: u32 = 1 << 1;

/// Visible width in pixels.
pub const FRAME_WIDTH: usize = 320;
/// Visible height in pixels.
pub const FRAME_HEIGHT: usize = 240;

const REGISTER_BYTES: usize = 0x100;

/// Register snapshot handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BlitJob {
    /// Value written to the start register.
    pub command: u32,
    /// Display-list address in work RAM.
    pub list: u32,
    /// Horizontal scroll.
    pub scroll_x: u32,
    /// Vertical scroll.
    pub scroll_y: u32,
    /// Clip rectangle top-left, packed as written.
    pub clip_min: u32,
    /// Clip rectangle bottom-right, packed as written.
    pub clip_max: u32,
}

/// RGB555 output of the compositor.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pixels: Vec<u16>,
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &FRAME_WIDTH)
            .field("height", &FRAME_HEIGHT)
            .finish_non_exhaustive()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Creates a black frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pixels: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
        }
    }

    /// Row-major pixels.
    #[must_use]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Mutable row-major pixels.
    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    /// Pixel at (`x`, `y`), or `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        (x < FRAME_WIDTH && y < FRAME_HEIGHT).then(|| self.pixels[y * FRAME_WIDTH + x])
    }
}

/// Executes one display list. Runs on the compositor thread.
pub trait BlitEngine: Send {
    /// Renders `job` into `frame`.
    fn blit(&mut self, job: &BlitJob, frame: &mut FrameBuffer);
}

/// Shared handle to the compositor output.
pub type SharedFrame = Arc<Mutex<FrameBuffer>>;

/// Owns the compositor worker thread.
#[derive(Debug)]
pub struct Compositor {
    slot: Arc<JobSlot<BlitJob>>,
    frame: SharedFrame,
    worker: Option<JoinHandle<()>>,
}

impl Compositor {
    /// Starts the worker.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ThreadSpawn`] if the thread cannot be created.
    pub fn spawn(engine: Box<dyn BlitEngine>) -> Result<Self, CoreError> {
        let slot = Arc::new(JobSlot::new());
        let frame = Arc::new(Mutex::new(FrameBuffer::new()));
        let worker = {
            let slot = Arc::clone(&slot);
            let frame = Arc::clone(&frame);
            std::thread::Builder::new()
                .name("compositor".into())
                .spawn(move || run_worker(&slot, &frame, engine))
                .map_err(|_| CoreError::ThreadSpawn("compositor"))?
        };
        Ok(Self {
            slot,
            frame,
            worker: Some(worker),
        })
    }

    /// Job slot shared with the register port.
    #[must_use]
    pub fn slot(&self) -> Arc<JobSlot<BlitJob>> {
        Arc::clone(&self.slot)
    }

    /// Output frame.
    #[must_use]
    pub fn frame(&self) -> SharedFrame {
        Arc::clone(&self.frame)
    }

    /// Stops the worker and joins it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CompositorPanicked`] if the worker panicked.
    pub fn shutdown(&mut self) -> Result<(), CoreError> {
        self.slot.shutdown();
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| CoreError::CompositorPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("{err}");
        }
    }
}

fn run_worker(
    slot: &JobSlot<BlitJob>,
    frame: &Mutex<FrameBuffer>,
    mut engine: Box<dyn BlitEngine>,
) {
    while let Some(job) = slot.take() {
        log::trace!("compositor job {job:?}");
        {
            let mut frame = frame.lock().unwrap_or_else(PoisonError::into_inner);
            engine.blit(&job, &mut frame);
        }
        slot.complete();
    }
    log::debug!("compositor worker stopped");
}

/// Bus handler for the compositor registers.
pub struct CompositorPort {
    regs: [u8; REGISTER_BYTES],
    slot: Arc<JobSlot<BlitJob>>,
    vsync: EventId,
    done: EventId,
}

impl fmt::Debug for CompositorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorPort")
            .field("vsync", &self.vsync)
            .field("done", &self.done)
            .field("busy", &self.slot.is_busy())
            .finish_non_exhaustive()
    }
}

impl CompositorPort {
    /// Creates the port, starts the vertical-blank event and allocates the
    /// completion event armed by each start.
    #[must_use]
    pub fn new(compositor: &Compositor, timebase: &mut Timebase, config: &CoreConfig) -> Self {
        let vsync = timebase.schedule_event(
            config.vblank_period_cycles(),
            1,
            EventMode::Periodic,
            EventKind::Raise(InterruptSource::Irl2),
        );
        let done = timebase
            .scheduler
            .create(1, 1, EventMode::OneShot, EventKind::BlitComplete);
        Self {
            regs: [0; REGISTER_BYTES],
            slot: compositor.slot(),
            vsync,
            done,
        }
    }

    /// Vertical-blank event.
    #[must_use]
    pub const fn vsync_event(&self) -> EventId {
        self.vsync
    }

    /// Completion event armed by a start write.
    #[must_use]
    pub const fn completion_event(&self) -> EventId {
        self.done
    }

    fn offset(addr: u32) -> usize {
        (addr as usize) & (REGISTER_BYTES - 1)
    }

    fn reg(&self, reg: u32) -> u32 {
        let at = Self::offset(reg) & !3;
        u32::from_be_bytes([
            self.regs[at],
            self.regs[at + 1],
            self.regs[at + 2],
            self.regs[at + 3],
        ])
    }

    fn snapshot(&self, command: u32) -> BlitJob {
        BlitJob {
            command,
            list: self.reg(REG_LIST),
            scroll_x: self.reg(REG_SCROLL_X),
            scroll_y: self.reg(REG_SCROLL_Y),
            clip_min: self.reg(REG_CLIP_MIN),
            clip_max: self.reg(REG_CLIP_MAX),
        }
    }
}

impl MemoryHandler for CompositorPort {
    fn accesses(&self) -> AccessSet {
        AccessSet::READ8
            .union(AccessSet::READ32)
            .union(AccessSet::WRITE8)
            .union(AccessSet::WRITE32)
    }

    fn read8(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u8 {
        if addr & 0xFFFF == REG_PROBE {
            PROBE_VALUE
        } else {
            u8::MAX
        }
    }

    fn read32(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u32 {
        match addr & 0xFFFF {
            REG_ID => COMPOSITOR_ID,
            REG_STATUS => {
                if self.slot.is_busy() {
                    STATUS_BUSY
                } else {
                    STATUS_IDLE
                }
            }
            REG_ACK => 0,
            REG_PROBE => u32::from(PROBE_VALUE),
            _ => u32::MAX,
        }
    }

    fn write8(&mut self, addr: u32, value: u8, _ctx: &mut BusContext<'_>) {
        self.regs[Self::offset(addr)] = value;
    }

    fn write32(&mut self, addr: u32, value: u32, ctx: &mut BusContext<'_>) {
        let at = Self::offset(addr) & !3;
        self.regs[at..at + 4].copy_from_slice(&value.to_be_bytes());
        match addr & 0xFFFF {
            REG_START if value != 0 => {
                let job = self.snapshot(value);
                match self.slot.submit(job) {
                    Ok(()) => ctx.timebase.scheduler.insert(self.done),
                    Err(err) => log::warn!("compositor start ignored: {err}"),
                }
            }
            REG_ACK => {
                if value & ACK_VBLANK != 0 {
                    ctx.timebase.clear_interrupt(InterruptSource::Irl2);
                }
                if value & ACK_BLIT != 0 {
                    ctx.timebase.clear_interrupt(InterruptSource::Irl1);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{
        BlitEngine, BlitJob, Compositor, CompositorPort, FrameBuffer, COMPOSITOR_ID, REG_ACK,
        REG_CLIP_MAX, REG_ID, REG_LIST, REG_PROBE, REG_START, REG_STATUS, STATUS_IDLE,
    };
    use crate::intc::InterruptSource;
    use crate::memory::{BusContext, MemoryHandler};
    use crate::onchip::Onchip;
    use crate::timebase::Timebase;
    use crate::CoreConfig;

    struct Recorder(Arc<Mutex<Vec<BlitJob>>>);

    impl BlitEngine for Recorder {
        fn blit(&mut self, job: &BlitJob, frame: &mut FrameBuffer) {
            frame.pixels_mut()[0] = job.list as u16;
            self.0.lock().expect("jobs").push(*job);
        }
    }

    #[test]
    fn start_write_snapshots_registers_and_arms_completion() {
        let config = CoreConfig::default();
        let mut tb = Timebase::new(&config);
        let jobs = Arc::new(Mutex::new(Vec::new()));
        let mut compositor =
            Compositor::spawn(Box::new(Recorder(Arc::clone(&jobs)))).expect("spawn");
        let mut port = CompositorPort::new(&compositor, &mut tb, &config);
        let mut onchip = Onchip::new(&mut tb, &config);
        assert_eq!(tb.scheduler.end_cycle(port.completion_event()), None);

        {
            let mut ctx = BusContext::new(&mut tb, &mut onchip);
            assert_eq!(port.read32(REG_ID, &mut ctx), COMPOSITOR_ID);
            assert_eq!(port.read8(REG_PROBE, &mut ctx), 0xFE);
            port.write32(REG_LIST, 0x1234, &mut ctx);
            port.write32(REG_CLIP_MAX, 0x00EF_013F, &mut ctx);
            port.write32(REG_START, 1, &mut ctx);
        }
        let now = tb.scheduler.now();
        assert_eq!(tb.scheduler.end_cycle(port.completion_event()), Some(now + 1));

        compositor.slot().wait_idle();
        compositor.shutdown().expect("shutdown");
        let recorded = jobs.lock().expect("jobs");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].list, 0x1234);
        assert_eq!(recorded[0].clip_max, 0x00EF_013F);
        assert_eq!(compositor.frame().lock().expect("frame").pixel(0, 0), Some(0x1234));
        // The worker never touches the controller.
        assert!(!tb.intc.is_pending(InterruptSource::Irl1));

        tb.request_interrupt(InterruptSource::Irl1);
        let mut ctx = BusContext::new(&mut tb, &mut onchip);
        assert_eq!(port.read32(REG_STATUS, &mut ctx), STATUS_IDLE);
        port.write32(REG_ACK, 0b10, &mut ctx);
        assert!(!tb.intc.is_pending(InterruptSource::Irl1));
    }

    #[test]
    fn zero_start_write_arms_nothing() {
        let config = CoreConfig::default();
        let mut tb = Timebase::new(&config);
        let compositor =
            Compositor::spawn(Box::new(Recorder(Arc::new(Mutex::new(Vec::new()))))).expect("spawn");
        let mut port = CompositorPort::new(&compositor, &mut tb, &config);
        let mut onchip = Onchip::new(&mut tb, &config);
        port.write32(REG_START, 0, &mut BusContext::new(&mut tb, &mut onchip));
        assert!(!compositor.slot().is_busy());
        assert_eq!(tb.scheduler.end_cycle(port.completion_event()), None);
    }

    #[test]
    fn vsync_event_is_periodic_at_frame_rate() {
        let config = CoreConfig::default();
        let mut tb = Timebase::new(&config);
        let compositor =
            Compositor::spawn(Box::new(Recorder(Arc::new(Mutex::new(Vec::new()))))).expect("spawn");
        let port = CompositorPort::new(&compositor, &mut tb, &config);
        assert_eq!(
            tb.scheduler.end_cycle(port.vsync_event()),
            Some(config.vblank_period_cycles())
        );
    }
}
