//! DMA controller.
//!
//! Writing CHCR with DE set while DMAOR.DME is set latches a request. The
//! bytes are copied by the processor side right after the write completes,
//! through the ordinary bus, and a one-shot event models the transfer time.
//! When it fires the channel registers take their end-of-transfer values.

use crate::scheduler::{EventId, EventKind, EventMode, Scheduler};

/// Number of DMA channels.
pub const DMA_CHANNELS: usize = 4;
/// CHCR.DE: channel enable.
pub const CHCR_DE: u32 = 0x0000_0001;
/// CHCR.TE: transfer end.
pub const CHCR_TE: u32 = 0x0000_0002;
/// CHCR destination mode field.
pub const CHCR_DM_MASK: u32 = 0x0000_C000;
/// CHCR destination mode value selecting an incrementing address.
pub const CHCR_DM_INCREMENT: u32 = 0x0000_4000;
/// CHCR source mode field.
pub const CHCR_SM_MASK: u32 = 0x0000_3000;
/// CHCR source mode value selecting an incrementing address.
pub const CHCR_SM_INCREMENT: u32 = 0x0000_1000;
/// DMAOR.DME: master enable.
pub const DMAOR_DME: u16 = 0x0001;
/// Processor cycles charged per transferred byte.
pub const DMA_CYCLES_PER_BYTE: u64 = 30;

/// One DMA channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DmaChannel {
    /// Source address.
    pub sar: u32,
    /// Destination address.
    pub dar: u32,
    /// Transfer count in bytes.
    pub dmatcr: u32,
    chcr: u32,
    event: EventId,
}

impl DmaChannel {
    /// Channel control register.
    #[must_use]
    pub const fn chcr(&self) -> u32 {
        self.chcr
    }

    /// Completion event.
    #[must_use]
    pub const fn event(&self) -> EventId {
        self.event
    }
}

/// A latched transfer waiting to be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DmaTransfer {
    /// Channel that requested the transfer.
    pub channel: usize,
    /// First source byte.
    pub src: u32,
    /// First destination byte.
    pub dst: u32,
    /// Bytes to copy.
    pub len: u32,
    /// Whether the source address advances.
    pub src_increment: bool,
    /// Whether the destination address advances.
    pub dst_increment: bool,
}

impl DmaTransfer {
    /// Source and destination of byte `i`.
    #[must_use]
    pub const fn addresses(&self, i: u32) -> (u32, u32) {
        let src = if self.src_increment {
            self.src.wrapping_add(i)
        } else {
            self.src
        };
        let dst = if self.dst_increment {
            self.dst.wrapping_add(i)
        } else {
            self.dst
        };
        (src, dst)
    }
}

/// The DMA controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DmaController {
    channels: [DmaChannel; DMA_CHANNELS],
    /// Operation register.
    pub dmaor: u16,
    requested: Option<usize>,
}

impl DmaController {
    /// Creates the channels and their completion events.
    pub fn new(sched: &mut Scheduler) -> Self {
        let channels = [0u8, 1, 2, 3].map(|ch| DmaChannel {
            sar: 0,
            dar: 0,
            dmatcr: 0,
            chcr: 0,
            event: sched.create(0, 1, EventMode::OneShot, EventKind::DmaComplete(ch)),
        });
        Self {
            channels,
            dmaor: 0,
            requested: None,
        }
    }

    /// Channel state.
    #[must_use]
    pub const fn channel(&self, channel: usize) -> &DmaChannel {
        &self.channels[channel]
    }

    /// Mutable channel state.
    pub fn channel_mut(&mut self, channel: usize) -> &mut DmaChannel {
        &mut self.channels[channel]
    }

    /// Stores CHCR and latches a request when the channel and controller are enabled.
    pub fn write_chcr(&mut self, channel: usize, value: u32) {
        self.channels[channel].chcr = value;
        if self.dmaor & DMAOR_DME != 0 && value & CHCR_DE != 0 {
            log::debug!(
                "dma{channel} request: {:#010x} -> {:#010x}, {} bytes",
                self.channels[channel].sar,
                self.channels[channel].dar,
                self.channels[channel].dmatcr
            );
            self.requested = Some(channel);
        }
    }

    /// Takes the latched request and schedules its completion.
    pub fn take_request(&mut self, sched: &mut Scheduler) -> Option<DmaTransfer> {
        let channel = self.requested.take()?;
        let state = &self.channels[channel];
        let transfer = DmaTransfer {
            channel,
            src: state.sar,
            dst: state.dar,
            len: state.dmatcr,
            src_increment: state.chcr & CHCR_SM_MASK == CHCR_SM_INCREMENT,
            dst_increment: state.chcr & CHCR_DM_MASK == CHCR_DM_INCREMENT,
        };
        sched.set_count(
            state.event,
            u64::from(transfer.len) * DMA_CYCLES_PER_BYTE,
        );
        sched.set_rate(state.event, 1);
        sched.insert(state.event);
        Some(transfer)
    }

    /// Whether a request is waiting to be copied.
    #[must_use]
    pub const fn has_request(&self) -> bool {
        self.requested.is_some()
    }

    /// End of transfer: addresses advance past the block, the count reaches
    /// zero, DE drops and TE rises.
    pub fn complete(&mut self, channel: usize) {
        let state = &mut self.channels[channel];
        if state.chcr & CHCR_SM_MASK == CHCR_SM_INCREMENT {
            state.sar = state.sar.wrapping_add(state.dmatcr);
        }
        if state.chcr & CHCR_DM_MASK == CHCR_DM_INCREMENT {
            state.dar = state.dar.wrapping_add(state.dmatcr);
        }
        state.dmatcr = 0;
        state.chcr = (state.chcr & !CHCR_DE) | CHCR_TE;
        log::debug!("dma{channel} complete");
    }
}
