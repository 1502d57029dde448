/// Number of general registers visible at any time (`R0..R15`).
pub const GENERAL_REGISTER_COUNT: usize = 16;
/// Number of banked registers (`R0..R7` of the inactive bank).
pub const BANKED_REGISTER_COUNT: usize = 8;

/// `SR` bit for the T (test/carry) flag.
pub const SR_T: u32 = 1 << 0;
/// `SR` bit for the S (saturation) flag.
pub const SR_S: u32 = 1 << 1;
/// Shift of the 4-bit interrupt mask field.
pub const SR_IMASK_SHIFT: u32 = 4;
/// `SR` interrupt mask field.
pub const SR_IMASK: u32 = 0xF << SR_IMASK_SHIFT;
/// `SR` bit for the Q (division) flag.
pub const SR_Q: u32 = 1 << 8;
/// `SR` bit for the M (division) flag.
pub const SR_M: u32 = 1 << 9;
/// `SR` bit for FPU disable.
pub const SR_FD: u32 = 1 << 15;
/// `SR` bit blocking interrupts and exceptions.
pub const SR_BL: u32 = 1 << 28;
/// `SR` bit selecting register bank 1.
pub const SR_RB: u32 = 1 << 29;
/// `SR` bit for privileged mode.
pub const SR_MD: u32 = 1 << 30;
/// Bits writable through `LDC` to `SR`.
pub const SR_WRITABLE_MASK: u32 = 0x7000_83F3;
/// Bits `RTE` restores from `SSR` (MD is restored after the delay slot).
pub const SR_RTE_MASK: u32 = 0x3000_83F3;
/// `SR` value after reset: MD, RB, BL set and IMASK at 15.
pub const SR_RESET_VALUE: u32 = 0x7000_00F0;
/// Program counter after reset (P2, uncached boot ROM).
pub const RESET_VECTOR: u32 = 0xA000_0000;

/// Status register with typed accessors for each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StatusRegister(u32);

impl StatusRegister {
    /// Wraps a raw `SR` value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw `SR` value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    const fn flag(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    #[allow(clippy::missing_const_for_fn)]
    fn put(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// T flag.
    #[must_use]
    pub const fn t(self) -> bool {
        self.flag(SR_T)
    }

    /// Sets the T flag.
    pub fn set_t(&mut self, on: bool) {
        self.put(SR_T, on);
    }

    /// S flag.
    #[must_use]
    pub const fn s(self) -> bool {
        self.flag(SR_S)
    }

    /// Sets the S flag.
    pub fn set_s(&mut self, on: bool) {
        self.put(SR_S, on);
    }

    /// Q flag.
    #[must_use]
    pub const fn q(self) -> bool {
        self.flag(SR_Q)
    }

    /// Sets the Q flag.
    pub fn set_q(&mut self, on: bool) {
        self.put(SR_Q, on);
    }

    /// M flag.
    #[must_use]
    pub const fn m(self) -> bool {
        self.flag(SR_M)
    }

    /// Sets the M flag.
    pub fn set_m(&mut self, on: bool) {
        self.put(SR_M, on);
    }

    /// Interrupt mask level, 0 through 15.
    #[must_use]
    pub const fn imask(self) -> u8 {
        ((self.0 & SR_IMASK) >> SR_IMASK_SHIFT) as u8
    }

    /// Sets the interrupt mask level; bits above the low nibble are ignored.
    pub fn set_imask(&mut self, level: u8) {
        self.0 = (self.0 & !SR_IMASK) | ((u32::from(level) & 0xF) << SR_IMASK_SHIFT);
    }

    /// BL flag.
    #[must_use]
    pub const fn bl(self) -> bool {
        self.flag(SR_BL)
    }

    /// Sets the BL flag.
    pub fn set_bl(&mut self, on: bool) {
        self.put(SR_BL, on);
    }

    /// RB flag.
    #[must_use]
    pub const fn rb(self) -> bool {
        self.flag(SR_RB)
    }

    /// MD flag.
    #[must_use]
    pub const fn md(self) -> bool {
        self.flag(SR_MD)
    }

    /// Sets the MD flag.
    pub fn set_md(&mut self, on: bool) {
        self.put(SR_MD, on);
    }
}

/// SH-3 register file.
///
/// `R0..R7` of the active bank live in the general array; the inactive bank is
/// kept in a separate 8-entry array and exchanged whenever `SR.RB` flips.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    gpr: [u32; GENERAL_REGISTER_COUNT],
    bank: [u32; BANKED_REGISTER_COUNT],
    sr: StatusRegister,
    /// Saved status register.
    pub ssr: u32,
    /// Saved program counter.
    pub spc: u32,
    /// Global base register.
    pub gbr: u32,
    /// Vector base register.
    pub vbr: u32,
    /// Multiply-accumulate high.
    pub mach: u32,
    /// Multiply-accumulate low.
    pub macl: u32,
    /// Procedure register.
    pub pr: u32,
    /// Address of the instruction being executed.
    pub pc: u32,
    /// Address the loop continues at after the current instruction.
    pub npc: u32,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            gpr: [0; GENERAL_REGISTER_COUNT],
            bank: [0; BANKED_REGISTER_COUNT],
            sr: StatusRegister(SR_RESET_VALUE),
            ssr: 0,
            spc: 0,
            gbr: 0,
            vbr: 0,
            mach: 0,
            macl: 0,
            pr: 0,
            pc: RESET_VECTOR,
            npc: RESET_VECTOR,
        }
    }
}

impl CpuState {
    /// Rewrites the whole register file with its power-on values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reads `Rn` of the active bank; only the low four bits of `n` are used.
    #[must_use]
    pub const fn gpr(&self, n: usize) -> u32 {
        self.gpr[n & 0xF]
    }

    /// Writes `Rn` of the active bank.
    #[allow(clippy::missing_const_for_fn)]
    pub fn set_gpr(&mut self, n: usize, value: u32) {
        self.gpr[n & 0xF] = value;
    }

    /// Reads `Rn_BANK`, register `n` of the inactive bank.
    #[must_use]
    pub const fn banked(&self, n: usize) -> u32 {
        self.bank[n & 0x7]
    }

    /// Writes `Rn_BANK`.
    #[allow(clippy::missing_const_for_fn)]
    pub fn set_banked(&mut self, n: usize, value: u32) {
        self.bank[n & 0x7] = value;
    }

    /// Current status register.
    #[must_use]
    pub const fn sr(&self) -> StatusRegister {
        self.sr
    }

    /// Mutable status register for flag updates that cannot change RB.
    #[allow(clippy::missing_const_for_fn)]
    pub fn sr_flags_mut(&mut self) -> &mut StatusRegister {
        &mut self.sr
    }

    /// Replaces `SR`, exchanging the banks when RB changes.
    ///
    /// Returns `true` when a bank switch happened. The caller is responsible
    /// for re-deriving the interrupt threshold afterwards.
    pub fn set_sr(&mut self, value: u32) -> bool {
        let old_rb = self.sr.rb();
        self.sr = StatusRegister(value);
        let switched = old_rb != self.sr.rb();
        if switched {
            self.swap_bank();
        }
        switched
    }

    /// Exchanges `R0..R7` with the inactive bank.
    pub fn swap_bank(&mut self) {
        let (active, _) = self.gpr.split_at_mut(BANKED_REGISTER_COUNT);
        active.swap_with_slice(&mut self.bank);
    }

    /// T flag shorthand.
    #[must_use]
    pub const fn t(&self) -> bool {
        self.sr.t()
    }

    /// Sets the T flag.
    pub fn set_t(&mut self, on: bool) {
        self.sr.set_t(on);
    }
}
