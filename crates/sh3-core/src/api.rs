//! Host-facing configuration and run outcome types.

use crate::intc::InterruptSource;
use crate::CoreError;

/// Processor clock of the board in Hz.
pub const DEFAULT_CPU_CLOCK_HZ: u32 = 51_200_000;
/// Ratio between the processor clock and the peripheral clock feeding the TMU.
pub const DEFAULT_PERIPHERAL_CLOCK_RATIO: u32 = 4;
/// Largest accepted peripheral clock ratio; keeps `1024 * ratio` in a `u32`.
pub const MAX_PERIPHERAL_CLOCK_RATIO: u32 = u32::MAX / 1024;
/// Upper bound on a single execution granule in cycles.
pub const DEFAULT_MAX_GRANULE_CYCLES: u32 = 0x1_0000;
/// Vertical refresh of the compositor's output in mHz (60.0178 Hz).
pub const DEFAULT_VBLANK_RATE_MILLIHZ: u32 = 60_018;

/// Immutable configuration of a core instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Processor clock in Hz; one cycle of the scheduler is one processor clock.
    pub cpu_clock_hz: u32,
    /// Processor clocks per peripheral clock.
    pub peripheral_clock_ratio: u32,
    /// Longest window the execution loop runs before sampling events.
    pub max_granule_cycles: u32,
    /// Vertical blank frequency in mHz.
    pub vblank_rate_millihz: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cpu_clock_hz: DEFAULT_CPU_CLOCK_HZ,
            peripheral_clock_ratio: DEFAULT_PERIPHERAL_CLOCK_RATIO,
            max_granule_cycles: DEFAULT_MAX_GRANULE_CYCLES,
            vblank_rate_millihz: DEFAULT_VBLANK_RATE_MILLIHZ,
        }
    }
}

impl CoreConfig {
    /// Rejects values that would stall or divide by zero.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the offending field.
    pub const fn validate(&self) -> Result<(), CoreError> {
        if self.cpu_clock_hz == 0 {
            return Err(CoreError::InvalidConfig("cpu clock must be non-zero"));
        }
        if self.peripheral_clock_ratio == 0 {
            return Err(CoreError::InvalidConfig(
                "peripheral clock ratio must be non-zero",
            ));
        }
        if self.peripheral_clock_ratio > MAX_PERIPHERAL_CLOCK_RATIO {
            return Err(CoreError::InvalidConfig(
                "peripheral clock ratio overflows the timer prescaler",
            ));
        }
        if self.max_granule_cycles == 0 {
            return Err(CoreError::InvalidConfig("granule bound must be non-zero"));
        }
        if self.vblank_rate_millihz == 0 {
            return Err(CoreError::InvalidConfig("vblank rate must be non-zero"));
        }
        Ok(())
    }

    /// Processor cycles between two vertical blanks.
    #[must_use]
    pub const fn vblank_period_cycles(&self) -> u64 {
        self.cpu_clock_hz as u64 * 1000 / self.vblank_rate_millihz as u64
    }
}

/// Summary of one execution granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GranuleOutcome {
    /// Cycles charged by the instructions of this granule.
    pub cycles: u64,
    /// Instructions retired, delay slots included.
    pub instructions: u64,
    /// Scheduler cycle after the granule.
    pub now: u64,
    /// Interrupt taken at the end of the granule, if any.
    pub serviced: Option<InterruptSource>,
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DEFAULT_CPU_CLOCK_HZ, MAX_PERIPHERAL_CLOCK_RATIO};
    use crate::CoreError;

    #[test]
    fn default_config_matches_board_clocks() {
        let config = CoreConfig::default();
        assert_eq!(config.cpu_clock_hz, DEFAULT_CPU_CLOCK_HZ);
        assert_eq!(config.peripheral_clock_ratio, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.vblank_period_cycles(), 853_077);
    }

    #[test]
    fn zero_fields_are_rejected() {
        let config = CoreConfig {
            max_granule_cycles: 0,
            ..CoreConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(CoreError::InvalidConfig("granule bound must be non-zero"))
        );
        let config = CoreConfig {
            peripheral_clock_ratio: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn peripheral_ratio_is_bounded_by_the_largest_prescaler() {
        let config = CoreConfig {
            peripheral_clock_ratio: MAX_PERIPHERAL_CLOCK_RATIO,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(MAX_PERIPHERAL_CLOCK_RATIO, 4_194_303);
        let config = CoreConfig {
            peripheral_clock_ratio: MAX_PERIPHERAL_CLOCK_RATIO + 1,
            ..CoreConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(CoreError::InvalidConfig(
                "peripheral clock ratio overflows the timer prescaler"
            ))
        );
    }
}
