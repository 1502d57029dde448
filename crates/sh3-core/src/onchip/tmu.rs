//! Timer unit: three down-counters driven by scheduler events.
//!
//! A running channel is a periodic event whose tick count is `TCNT + 1`, so
//! the event fires exactly when the counter would wrap from zero. Reading
//! TCNT derives the counter from the event's remaining ticks.

use crate::intc::{InterruptController, InterruptSource};
use crate::scheduler::{EventId, EventKind, EventMode, Scheduler};

/// Number of timer channels.
pub const TIMER_CHANNELS: usize = 3;
/// Peripheral clock prescaler selected by TCR.TPSC.
pub const TIMER_DIVIDERS: [u32; 8] = [4, 16, 64, 256, 1024, 1024, 1024, 1024];
/// TCR underflow flag.
pub const TCR_UNF: u16 = 0x0100;
/// TCR underflow interrupt enable.
pub const TCR_UNIE: u16 = 0x0020;
/// TCR prescaler select.
pub const TCR_TPSC_MASK: u16 = 0x0007;
/// Counter and constant value after reset.
pub const TIMER_RESET_VALUE: u32 = 0xFFFF_FFFF;

/// One timer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TimerChannel {
    /// Reload constant.
    pub tcor: u32,
    tcr: u16,
    event: EventId,
}

impl TimerChannel {
    /// Control register.
    #[must_use]
    pub const fn tcr(&self) -> u16 {
        self.tcr
    }

    /// Scheduler event counting this channel down.
    #[must_use]
    pub const fn event(&self) -> EventId {
        self.event
    }
}

/// The timer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TimerUnit {
    channels: [TimerChannel; TIMER_CHANNELS],
    /// Output control register.
    pub tocr: u8,
    tstr: u8,
    /// Input capture register of channel 2.
    pub tcpr2: u32,
    clock_ratio: u32,
}

fn channel_source(channel: usize) -> InterruptSource {
    InterruptSource::timer_underflow(channel).unwrap_or(InterruptSource::Tuni2)
}

impl TimerUnit {
    /// Creates the channel events, stopped and at their reset counts.
    pub fn new(sched: &mut Scheduler, clock_ratio: u32) -> Self {
        let channels = [0u8, 1, 2].map(|ch| TimerChannel {
            tcor: TIMER_RESET_VALUE,
            tcr: 0,
            event: sched.create(
                u64::from(TIMER_RESET_VALUE) + 1,
                1,
                EventMode::Periodic,
                EventKind::TimerUnderflow(ch),
            ),
        });
        Self {
            channels,
            tocr: 0,
            tstr: 0,
            tcpr2: 0,
            clock_ratio,
        }
    }

    /// Channel state.
    #[must_use]
    pub const fn channel(&self, channel: usize) -> &TimerChannel {
        &self.channels[channel]
    }

    /// Start bits.
    #[must_use]
    pub const fn tstr(&self) -> u8 {
        self.tstr
    }

    /// Whether `channel` is counting.
    #[must_use]
    pub const fn is_running(&self, channel: usize) -> bool {
        self.tstr & (1 << channel) != 0
    }

    /// Processor cycles per count at the channel's current prescaler.
    #[must_use]
    pub const fn rate(&self, channel: usize) -> u32 {
        let tpsc = (self.channels[channel].tcr & TCR_TPSC_MASK) as usize;
        TIMER_DIVIDERS[tpsc].saturating_mul(self.clock_ratio)
    }

    /// Live counter value.
    #[must_use]
    pub fn tcnt(&self, channel: usize, sched: &Scheduler) -> u32 {
        let ticks = sched.read_counter(self.channels[channel].event);
        u32::try_from(ticks.saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// Stores the reload constant.
    pub fn set_tcor(&mut self, channel: usize, value: u32) {
        self.channels[channel].tcor = value;
    }

    /// Loads the counter; a running channel restarts its countdown from here.
    pub fn set_tcnt(&mut self, channel: usize, value: u32, sched: &mut Scheduler) {
        let event = self.channels[channel].event;
        sched.set_count(event, u64::from(value) + 1);
        if self.is_running(channel) {
            sched.insert(event);
        }
    }

    /// Starts or stops every channel whose bit changed.
    pub fn write_tstr(&mut self, value: u8, sched: &mut Scheduler) {
        let changed = self.tstr ^ value;
        for channel in 0..TIMER_CHANNELS {
            let bit = 1u8 << channel;
            if changed & bit == 0 {
                continue;
            }
            let event = self.channels[channel].event;
            let remaining = sched.read_counter(event);
            if value & bit == 0 {
                sched.remove(event);
                sched.set_count(event, remaining);
                log::trace!("tmu{channel} stopped with {remaining} ticks left");
            } else {
                sched.set_count(event, remaining);
                sched.set_rate(event, self.rate(channel));
                sched.insert(event);
                log::trace!(
                    "tmu{channel} started: {remaining} ticks at {} cycles",
                    self.rate(channel)
                );
            }
        }
        self.tstr = value;
    }

    /// Stores TCR.
    ///
    /// UNF can only be cleared: writing it as one keeps the current flag,
    /// writing it as zero clears the flag and the pending underflow. UNIE
    /// enables or disables the channel's interrupt source.
    pub fn write_tcr(
        &mut self,
        channel: usize,
        value: u16,
        sched: &mut Scheduler,
        intc: &mut InterruptController,
    ) {
        let source = channel_source(channel);
        let old = self.channels[channel].tcr;
        let stored = if value & TCR_UNF != 0 {
            value ^ (old & TCR_UNF) ^ TCR_UNF
        } else {
            intc.clear_pending(source, sched);
            value
        };
        if stored & TCR_UNIE != 0 {
            intc.set_mask(source, sched);
        } else {
            intc.clear_mask(source, sched);
        }
        self.channels[channel].tcr = stored;
        let rate = self.rate(channel);
        sched.set_rate(self.channels[channel].event, rate);
    }

    /// Reloads from TCOR, latches UNF and requests the underflow interrupt.
    ///
    /// Runs from the scheduler callback, before the event is re-armed.
    pub fn underflow(
        &mut self,
        channel: usize,
        sched: &mut Scheduler,
        intc: &mut InterruptController,
    ) {
        let state = &mut self.channels[channel];
        sched.set_count(state.event, u64::from(state.tcor) + 1);
        state.tcr |= TCR_UNF;
        log::trace!("tmu{channel} underflow, reload {:#010x}", state.tcor);
        intc.set_pending(channel_source(channel), sched);
    }
}
