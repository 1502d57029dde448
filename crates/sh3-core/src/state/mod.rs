//! Processor register file and sequencing state.

/// Register file, status register and banking.
pub mod registers;
/// Delay-slot sequencing state.
pub mod run_state;

pub use registers::{
    CpuState, StatusRegister, BANKED_REGISTER_COUNT, GENERAL_REGISTER_COUNT, RESET_VECTOR,
    SR_BL, SR_FD, SR_IMASK, SR_IMASK_SHIFT, SR_M, SR_MD, SR_Q, SR_RB, SR_RESET_VALUE, SR_RTE_MASK,
    SR_S, SR_T, SR_WRITABLE_MASK,
};
pub use run_state::SlotState;
