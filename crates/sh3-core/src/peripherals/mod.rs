//! Board peripherals outside the processor.

/// Sprite compositor port and worker.
pub mod compositor;
/// Single-slot job handoff.
pub mod job_slot;

pub use compositor::{
    BlitEngine, BlitJob, Compositor, CompositorPort, FrameBuffer, SharedFrame, COMPOSITOR_BASE,
    COMPOSITOR_SIZE,
};
pub use job_slot::JobSlot;
