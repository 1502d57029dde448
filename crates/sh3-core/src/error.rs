use thiserror::Error;

/// Broad grouping of [`CoreError`] values, used by hosts to decide whether a
/// failure happened while wiring the board or while it was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Address-space registration or backing-store setup.
    Setup,
    /// Configuration values rejected before the core was built.
    Config,
    /// Cross-thread synchronization failures at run time.
    Runtime,
}

/// Errors surfaced by the setup and lifecycle API.
///
/// Emulated-software misbehavior (unmapped accesses, unknown opcodes) is never
/// reported here; it is logged and counted in the diagnostics blocks instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Every handler slot in the lookup table encoding is taken.
    #[error("handler table is full ({registered} handlers registered)")]
    HandlerTableFull {
        /// Number of handlers already registered.
        registered: usize,
    },
    /// A region was registered with zero size.
    #[error("region at {base:#010x} has zero size")]
    EmptyRegion {
        /// Requested base address.
        base: u32,
    },
    /// A region would extend past the top of the 32-bit address space.
    #[error("region at {base:#010x} with size {size:#x} wraps the address space")]
    RegionOverflow {
        /// Requested base address.
        base: u32,
        /// Requested size in bytes.
        size: u32,
    },
    /// Backing storage must be a power of two so mirrors can be masked.
    #[error("storage size {size:#x} is not a power of two")]
    StorageSizeNotPowerOfTwo {
        /// Requested storage size in bytes.
        size: usize,
    },
    /// A loaded image does not fit in its backing store.
    #[error("image of {len} bytes does not fit a region of {capacity} bytes")]
    ImageTooLarge {
        /// Image length in bytes.
        len: usize,
        /// Backing-store capacity in bytes.
        capacity: usize,
    },
    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A thread panicked while holding the shared timing lock.
    #[error("shared timing state lock was poisoned")]
    TimingLockPoisoned,
    /// A job was submitted after the compositor was shut down.
    #[error("compositor has been shut down")]
    CompositorStopped,
    /// The compositor worker thread panicked.
    #[error("compositor worker thread panicked")]
    CompositorPanicked,
    /// The processor session thread panicked.
    #[error("processor session thread panicked")]
    SessionPanicked,
    /// The operating system refused to start a thread.
    #[error("failed to spawn the {0} thread")]
    ThreadSpawn(&'static str),
}

impl CoreError {
    /// Returns the class used for host-side policy decisions.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::HandlerTableFull { .. }
            | Self::EmptyRegion { .. }
            | Self::RegionOverflow { .. }
            | Self::StorageSizeNotPowerOfTwo { .. }
            | Self::ImageTooLarge { .. } => ErrorClass::Setup,
            Self::InvalidConfig(_) => ErrorClass::Config,
            Self::TimingLockPoisoned
            | Self::CompositorStopped
            | Self::CompositorPanicked
            | Self::SessionPanicked
            | Self::ThreadSpawn(_) => ErrorClass::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, ErrorClass};

    #[test]
    fn setup_errors_render_addresses_in_hex() {
        let err = CoreError::RegionOverflow {
            base: 0xFF00_0000,
            size: 0x0200_0000,
        };
        assert_eq!(
            err.to_string(),
            "region at 0xff000000 with size 0x2000000 wraps the address space"
        );
        assert_eq!(err.class(), ErrorClass::Setup);
    }

    #[test]
    fn lock_and_thread_failures_are_runtime_class() {
        assert_eq!(CoreError::TimingLockPoisoned.class(), ErrorClass::Runtime);
        assert_eq!(CoreError::CompositorStopped.class(), ErrorClass::Runtime);
        assert_eq!(CoreError::SessionPanicked.class(), ErrorClass::Runtime);
    }

    #[test]
    fn config_errors_carry_reason() {
        let err = CoreError::InvalidConfig("cpu clock must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid configuration: cpu clock must be non-zero"
        );
        assert_eq!(err.class(), ErrorClass::Config);
    }
}
