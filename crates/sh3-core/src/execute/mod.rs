//! Instruction execution loop.
//!
//! One call to [`Executor::run`] executes instructions until the scheduler's
//! budget is spent, stopping only right after a control transfer so that a
//! granule never ends between a branch and its target. Delayed transfers run
//! their slot instruction inline: they compute the target, execute the
//! instruction at `PC + 2` and only then commit `NPC`.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::similar_names
)]

mod helpers;

pub use helpers::{
    add_overflow, add_with_carry, any_byte_equal, div1, mac_long, mac_word,
    shift_arithmetic_dynamic, shift_logical_dynamic, sub_overflow, sub_with_borrow,
    swap_low_bytes,
};

use crate::decoder::{
    decode, BinaryOp, ControlRegister, Instruction, LogicOp, Operand, SystemRegister, UnaryOp,
};
use crate::diag::CpuDiagnostics;
use crate::memory::{AccessWidth, AddressSpace, BusContext};
use crate::onchip::Onchip;
use crate::state::{CpuState, SlotState, SR_BL, SR_MD, SR_RB, SR_RTE_MASK, SR_WRITABLE_MASK};
use crate::timebase::Timebase;
use crate::timing::cycles_for;

/// TRAPA exception code written to EXPEVT.
pub const TRAPA_EXPEVT: u32 = 0x160;
/// Offset of the general exception handler from VBR.
pub const GENERAL_EXCEPTION_OFFSET: u32 = 0x100;

/// Processor-side state owned by the execution thread.
#[derive(Debug)]
pub struct Core {
    /// Register file.
    pub state: CpuState,
    /// Address space the processor fetches and accesses through.
    pub bus: AddressSpace,
    /// On-chip peripheral registers.
    pub onchip: Onchip,
    /// Execution counters.
    pub diag: CpuDiagnostics,
}

impl Core {
    /// Reads through the bus with `timebase` as the handler context.
    pub fn read8(&mut self, addr: u32, timebase: &mut Timebase) -> u8 {
        self.bus
            .read8(addr, &mut BusContext::new(timebase, &mut self.onchip))
    }

    /// Reads a big-endian word.
    pub fn read16(&mut self, addr: u32, timebase: &mut Timebase) -> u16 {
        self.bus
            .read16(addr, &mut BusContext::new(timebase, &mut self.onchip))
    }

    /// Reads a big-endian long word.
    pub fn read32(&mut self, addr: u32, timebase: &mut Timebase) -> u32 {
        self.bus
            .read32(addr, &mut BusContext::new(timebase, &mut self.onchip))
    }

    /// Writes a byte, then runs any DMA transfer the write requested.
    pub fn write8(&mut self, addr: u32, value: u8, timebase: &mut Timebase) {
        self.bus
            .write8(addr, value, &mut BusContext::new(timebase, &mut self.onchip));
        self.run_pending_dma(timebase);
    }

    /// Writes a word, then runs any DMA transfer the write requested.
    pub fn write16(&mut self, addr: u32, value: u16, timebase: &mut Timebase) {
        self.bus
            .write16(addr, value, &mut BusContext::new(timebase, &mut self.onchip));
        self.run_pending_dma(timebase);
    }

    /// Writes a long word, then runs any DMA transfer the write requested.
    pub fn write32(&mut self, addr: u32, value: u32, timebase: &mut Timebase) {
        self.bus
            .write32(addr, value, &mut BusContext::new(timebase, &mut self.onchip));
        self.run_pending_dma(timebase);
    }

    /// Copies the bytes of a latched DMA request through the bus.
    ///
    /// The copy is instantaneous; the completion event carries the timing.
    pub fn run_pending_dma(&mut self, timebase: &mut Timebase) {
        if !self.onchip.dma.has_request() {
            return;
        }
        let Some(transfer) = self.onchip.take_dma_request(timebase) else {
            return;
        };
        log::trace!(
            "dma{} copying {} bytes {:#010x} -> {:#010x}",
            transfer.channel,
            transfer.len,
            transfer.src,
            transfer.dst
        );
        for i in 0..transfer.len {
            let (src, dst) = transfer.addresses(i);
            let byte = self.read8(src, timebase);
            self.bus
                .write8(dst, byte, &mut BusContext::new(timebase, &mut self.onchip));
        }
    }

    /// Sets MD, RB and BL, switching to bank 1 first if needed, and
    /// re-derives the interrupt threshold.
    pub fn enter_privileged(&mut self, timebase: &mut Timebase) {
        let sr = self.state.sr().bits();
        self.state.set_sr(sr | SR_MD | SR_RB | SR_BL);
        let Timebase { scheduler, intc } = timebase;
        intc.recompute_imask(self.state.sr(), scheduler);
    }
}

/// Result of one [`Executor::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Cycles charged.
    pub cycles: u64,
    /// Instructions executed, delay slots included.
    pub instructions: u64,
}

/// Steps a [`Core`] against the scheduler's budget.
#[derive(Debug)]
pub struct Executor<'a> {
    core: &'a mut Core,
    timebase: &'a mut Timebase,
    branch: bool,
    slot: SlotState,
    instructions: u64,
}

impl<'a> Executor<'a> {
    /// Borrows the core and the locked timebase for one run.
    pub fn new(core: &'a mut Core, timebase: &'a mut Timebase) -> Self {
        Self {
            core,
            timebase,
            branch: false,
            slot: SlotState::Normal,
            instructions: 0,
        }
    }

    /// Runs until the budget is exhausted at a control-transfer boundary.
    pub fn run(&mut self) -> RunSummary {
        let mut cycles = 0u64;
        loop {
            self.branch = false;
            let pc = self.core.state.pc;
            self.core.state.npc = pc.wrapping_add(2);
            let cost = self.step(pc);
            self.timebase.scheduler.consume(cost);
            cycles += u64::from(cost);
            self.core.state.pc = self.core.state.npc;
            if self.branch && self.timebase.scheduler.budget() <= 0 {
                break;
            }
        }
        RunSummary {
            cycles,
            instructions: self.instructions,
        }
    }

    /// Whether the last step ended in a control transfer.
    #[must_use]
    pub const fn branched(&self) -> bool {
        self.branch
    }

    /// Fetches, decodes and executes the instruction at `pc`; returns its cost.
    pub fn step(&mut self, pc: u32) -> u32 {
        let word = self.core.read16(pc, self.timebase);
        let instruction = decode(word);
        self.instructions += 1;
        self.core.diag.record_instruction();

        if self.slot.in_delay_slot() && instruction.is_slot_illegal() {
            log::debug!("slot-illegal {instruction:?} at {pc:#010x}");
            self.core.diag.record_illegal_slot();
        }
        if instruction.is_privileged() && !self.core.state.sr().md() {
            log::debug!("privileged {instruction:?} at {pc:#010x} in user mode");
            self.core.diag.record_privilege_violation();
        }

        let base = cycles_for(instruction.cycle_kind());
        base + self.execute(instruction, pc)
    }

    fn delay_slot(&mut self, pc: u32) -> u32 {
        // A branch in a slot was already counted by `step`; its own slot is
        // not run, so slots never nest.
        if self.slot.in_delay_slot() {
            log::debug!("nested delay slot at {:#010x} skipped", pc.wrapping_add(2));
            return 0;
        }
        self.slot = SlotState::InDelaySlot;
        let cycles = self.step(pc.wrapping_add(2));
        self.slot = SlotState::Normal;
        cycles
    }

    /// Commits a delayed transfer to `target`, returning the slot's cost.
    fn delayed_branch(&mut self, pc: u32, target: u32) -> u32 {
        self.branch = true;
        let cycles = self.delay_slot(pc);
        self.core.state.npc = target;
        cycles
    }

    fn r(&self, n: u8) -> u32 {
        self.core.state.gpr(usize::from(n))
    }

    fn set_r(&mut self, n: u8, value: u32) {
        self.core.state.set_gpr(usize::from(n), value);
    }

    fn t(&self) -> bool {
        self.core.state.t()
    }

    fn set_t(&mut self, on: bool) {
        self.core.state.set_t(on);
    }

    fn load(&mut self, size: AccessWidth, addr: u32) -> u32 {
        match size {
            AccessWidth::Byte => self.core.read8(addr, self.timebase) as i8 as u32,
            AccessWidth::Word => self.core.read16(addr, self.timebase) as i16 as u32,
            AccessWidth::Long => self.core.read32(addr, self.timebase),
        }
    }

    fn store(&mut self, size: AccessWidth, addr: u32, value: u32) {
        match size {
            AccessWidth::Byte => self.core.write8(addr, value as u8, self.timebase),
            AccessWidth::Word => self.core.write16(addr, value as u16, self.timebase),
            AccessWidth::Long => self.core.write32(addr, value, self.timebase),
        }
    }

    /// PC-relative operands use the PC of the instruction owning the slot.
    fn effective_address(&self, operand: Operand, size: AccessWidth) -> u32 {
        let pc = self.core.state.pc;
        match operand {
            Operand::Indirect(n) | Operand::PostIncrement(n) => self.r(n),
            Operand::PreDecrement(n) => self.r(n).wrapping_sub(size.bytes()),
            Operand::Displacement(n, disp) => self.r(n).wrapping_add(disp),
            Operand::Indexed(n) => self.r(n).wrapping_add(self.r(0)),
            Operand::Gbr(disp) => self.core.state.gbr.wrapping_add(disp),
            Operand::Pc(disp) => match size {
                AccessWidth::Long => (pc & !3).wrapping_add(4).wrapping_add(disp),
                _ => pc.wrapping_add(4).wrapping_add(disp),
            },
        }
    }

    fn recompute_imask(&mut self) {
        let Timebase { scheduler, intc } = &mut *self.timebase;
        intc.recompute_imask(self.core.state.sr(), scheduler);
    }

    fn write_sr(&mut self, value: u32) {
        self.core.state.set_sr(value & SR_WRITABLE_MASK);
        self.recompute_imask();
    }

    fn pop32(&mut self, m: u8) -> u32 {
        let addr = self.r(m);
        let value = self.core.read32(addr, self.timebase);
        self.set_r(m, addr.wrapping_add(4));
        value
    }

    fn push32(&mut self, n: u8, value: u32) {
        let addr = self.r(n).wrapping_sub(4);
        self.core.write32(addr, value, self.timebase);
        self.set_r(n, addr);
    }

    fn control(&self, reg: ControlRegister) -> u32 {
        let state = &self.core.state;
        match reg {
            ControlRegister::Sr => state.sr().bits(),
            ControlRegister::Gbr => state.gbr,
            ControlRegister::Vbr => state.vbr,
            ControlRegister::Ssr => state.ssr,
            ControlRegister::Spc => state.spc,
            ControlRegister::Bank(i) => state.banked(usize::from(i)),
        }
    }

    fn set_control(&mut self, reg: ControlRegister, value: u32) {
        if reg == ControlRegister::Sr {
            self.write_sr(value);
            return;
        }
        let state = &mut self.core.state;
        match reg {
            ControlRegister::Sr => {}
            ControlRegister::Gbr => state.gbr = value,
            ControlRegister::Vbr => state.vbr = value,
            ControlRegister::Ssr => state.ssr = value,
            ControlRegister::Spc => state.spc = value,
            ControlRegister::Bank(i) => state.set_banked(usize::from(i), value),
        }
    }

    fn system(&self, reg: SystemRegister) -> u32 {
        let state = &self.core.state;
        match reg {
            SystemRegister::Mach => state.mach,
            SystemRegister::Macl => state.macl,
            SystemRegister::Pr => state.pr,
        }
    }

    fn set_system(&mut self, reg: SystemRegister, value: u32) {
        let state = &mut self.core.state;
        match reg {
            SystemRegister::Mach => state.mach = value,
            SystemRegister::Macl => state.macl = value,
            SystemRegister::Pr => state.pr = value,
        }
    }

    /// Executes `instruction`; returns cycles on top of its base cost (the
    /// delay slot, for delayed transfers).
    fn execute(&mut self, instruction: Instruction, pc: u32) -> u32 {
        match instruction {
            Instruction::Nop | Instruction::Ldtlb | Instruction::CacheHint { .. } => {}
            Instruction::Clrt => self.set_t(false),
            Instruction::Sett => self.set_t(true),
            Instruction::Clrs => self.core.state.sr_flags_mut().set_s(false),
            Instruction::Sets => self.core.state.sr_flags_mut().set_s(true),
            Instruction::Clrmac => {
                self.core.state.mach = 0;
                self.core.state.macl = 0;
            }
            Instruction::Div0u => {
                let sr = self.core.state.sr_flags_mut();
                sr.set_m(false);
                sr.set_q(false);
                sr.set_t(false);
            }
            Instruction::MovcaL { n } => {
                let (addr, value) = (self.r(n), self.r(0));
                self.core.write32(addr, value, self.timebase);
            }
            Instruction::MovImm { imm, n } => self.set_r(n, imm as i32 as u32),
            Instruction::Mov { m, n } => self.set_r(n, self.r(m)),
            Instruction::Mova { disp } => {
                let addr = (self.core.state.pc & !3).wrapping_add(4).wrapping_add(disp);
                self.set_r(0, addr);
            }
            Instruction::Movt { n } => self.set_r(n, u32::from(self.t())),
            Instruction::Load { size, src, n } => {
                let addr = self.effective_address(src, size);
                let value = self.load(size, addr);
                if let Operand::PostIncrement(m) = src {
                    if m != n {
                        self.set_r(m, addr.wrapping_add(size.bytes()));
                    }
                }
                self.set_r(n, value);
            }
            Instruction::Store { size, m, dst } => {
                let value = self.r(m);
                let addr = self.effective_address(dst, size);
                self.store(size, addr, value);
                if let Operand::PreDecrement(n) = dst {
                    self.set_r(n, addr);
                }
            }
            Instruction::AddImm { imm, n } => {
                self.set_r(n, self.r(n).wrapping_add(imm as i32 as u32));
            }
            Instruction::CmpEqImm { imm } => self.set_t(self.r(0) == imm as i32 as u32),
            Instruction::Binary { op, m, n } => self.binary(op, m, n),
            Instruction::Unary { op, n } => self.unary(op, n),
            Instruction::LogicImm { op, imm } => {
                let r0 = self.r(0);
                let imm = u32::from(imm);
                match op {
                    LogicOp::And => self.set_r(0, r0 & imm),
                    LogicOp::Or => self.set_r(0, r0 | imm),
                    LogicOp::Xor => self.set_r(0, r0 ^ imm),
                    LogicOp::Tst => self.set_t(r0 & imm == 0),
                }
            }
            Instruction::LogicGbr { op, imm } => {
                let addr = self.core.state.gbr.wrapping_add(self.r(0));
                let value = self.core.read8(addr, self.timebase);
                match op {
                    LogicOp::And => self.core.write8(addr, value & imm, self.timebase),
                    LogicOp::Or => self.core.write8(addr, value | imm, self.timebase),
                    LogicOp::Xor => self.core.write8(addr, value ^ imm, self.timebase),
                    LogicOp::Tst => self.set_t(value & imm == 0),
                }
            }
            Instruction::TasB { n } => {
                let addr = self.r(n);
                let value = self.core.read8(addr, self.timebase);
                self.set_t(value == 0);
                self.core.write8(addr, value | 0x80, self.timebase);
            }
            Instruction::MacL { m, n } => {
                let a = self.pop32(n) as i32;
                let b = self.pop32(m) as i32;
                let state = &mut self.core.state;
                let product = i64::from(a) * i64::from(b);
                (state.mach, state.macl) =
                    mac_long(state.mach, state.macl, product, state.sr().s());
            }
            Instruction::MacW { m, n } => {
                let an = self.r(n);
                let a = self.core.read16(an, self.timebase) as i16;
                self.set_r(n, an.wrapping_add(2));
                let am = self.r(m);
                let b = self.core.read16(am, self.timebase) as i16;
                self.set_r(m, am.wrapping_add(2));
                let state = &mut self.core.state;
                let product = i32::from(a) * i32::from(b);
                (state.mach, state.macl) =
                    mac_word(state.mach, state.macl, product, state.sr().s());
            }
            Instruction::Ldc { m, reg } => self.set_control(reg, self.r(m)),
            Instruction::LdcL { m, reg } => {
                let value = self.pop32(m);
                self.set_control(reg, value);
            }
            Instruction::Stc { reg, n } => self.set_r(n, self.control(reg)),
            Instruction::StcL { reg, n } => self.push32(n, self.control(reg)),
            Instruction::Lds { m, reg } => self.set_system(reg, self.r(m)),
            Instruction::LdsL { m, reg } => {
                let value = self.pop32(m);
                self.set_system(reg, value);
            }
            Instruction::Sts { reg, n } => self.set_r(n, self.system(reg)),
            Instruction::StsL { reg, n } => self.push32(n, self.system(reg)),
            Instruction::Bra { disp } => {
                let target = pc.wrapping_add(4).wrapping_add_signed(disp);
                return self.delayed_branch(pc, target);
            }
            Instruction::Bsr { disp } => {
                self.core.state.pr = pc.wrapping_add(4);
                let target = pc.wrapping_add(4).wrapping_add_signed(disp);
                return self.delayed_branch(pc, target);
            }
            Instruction::Braf { m } => {
                let target = pc.wrapping_add(4).wrapping_add(self.r(m));
                return self.delayed_branch(pc, target);
            }
            Instruction::Bsrf { m } => {
                let target = pc.wrapping_add(4).wrapping_add(self.r(m));
                self.core.state.pr = pc.wrapping_add(4);
                return self.delayed_branch(pc, target);
            }
            Instruction::Jmp { m } => {
                let target = self.r(m);
                return self.delayed_branch(pc, target);
            }
            Instruction::Jsr { m } => {
                let target = self.r(m);
                self.core.state.pr = pc.wrapping_add(4);
                return self.delayed_branch(pc, target);
            }
            Instruction::Rts => {
                let target = self.core.state.pr;
                return self.delayed_branch(pc, target);
            }
            Instruction::Rte => return self.rte(pc),
            Instruction::Bt { disp } | Instruction::Bf { disp } => {
                let wanted = matches!(instruction, Instruction::Bt { .. });
                if self.t() == wanted {
                    self.core.state.npc = pc.wrapping_add(4).wrapping_add_signed(disp);
                }
                self.branch = true;
            }
            Instruction::BtS { disp } | Instruction::BfS { disp } => {
                let wanted = matches!(instruction, Instruction::BtS { .. });
                let target = if self.t() == wanted {
                    pc.wrapping_add(4).wrapping_add_signed(disp)
                } else {
                    pc.wrapping_add(4)
                };
                return self.delayed_branch(pc, target);
            }
            Instruction::Trapa { imm } => self.trapa(pc, imm),
            Instruction::Sleep => self.branch = true,
            Instruction::Unknown(word) => {
                log::warn!("unknown opcode {word:#06x} at {pc:#010x}");
                self.core.diag.record_unknown_opcode(pc, word);
            }
        }
        0
    }

    fn rte(&mut self, pc: u32) -> u32 {
        let ssr = self.core.state.ssr;
        let sr = self.core.state.sr().bits();
        self.core.state.set_sr((sr & SR_MD) | (ssr & SR_RTE_MASK));
        let target = self.core.state.spc;
        let cycles = self.delayed_branch(pc, target);
        self.core
            .state
            .sr_flags_mut()
            .set_md(ssr & SR_MD != 0);
        self.recompute_imask();
        cycles
    }

    fn trapa(&mut self, pc: u32, imm: u8) {
        let onchip = &mut self.core.onchip;
        onchip.events.tra = u32::from(imm) << 2;
        onchip.events.expevt = TRAPA_EXPEVT;
        self.core.state.ssr = self.core.state.sr().bits();
        self.core.state.spc = pc.wrapping_add(2);
        self.core.enter_privileged(self.timebase);
        self.core.state.npc = self.core.state.vbr.wrapping_add(GENERAL_EXCEPTION_OFFSET);
        self.branch = true;
        log::debug!("trapa #{imm:#04x} at {pc:#010x}");
    }

    fn binary(&mut self, op: BinaryOp, m: u8, n: u8) {
        let rm = self.r(m);
        let rn = self.r(n);
        match op {
            BinaryOp::Add => self.set_r(n, rn.wrapping_add(rm)),
            BinaryOp::Addc => {
                let (sum, carry) = add_with_carry(rn, rm, self.t());
                self.set_r(n, sum);
                self.set_t(carry);
            }
            BinaryOp::Addv => {
                let (sum, overflow) = add_overflow(rn, rm);
                self.set_r(n, sum);
                self.set_t(overflow);
            }
            BinaryOp::Sub => self.set_r(n, rn.wrapping_sub(rm)),
            BinaryOp::Subc => {
                let (diff, borrow) = sub_with_borrow(rn, rm, self.t());
                self.set_r(n, diff);
                self.set_t(borrow);
            }
            BinaryOp::Subv => {
                let (diff, overflow) = sub_overflow(rn, rm);
                self.set_r(n, diff);
                self.set_t(overflow);
            }
            BinaryOp::And => self.set_r(n, rn & rm),
            BinaryOp::Or => self.set_r(n, rn | rm),
            BinaryOp::Xor => self.set_r(n, rn ^ rm),
            BinaryOp::Tst => self.set_t(rn & rm == 0),
            BinaryOp::CmpEq => self.set_t(rn == rm),
            BinaryOp::CmpHs => self.set_t(rn >= rm),
            BinaryOp::CmpGe => self.set_t(rn as i32 >= rm as i32),
            BinaryOp::CmpHi => self.set_t(rn > rm),
            BinaryOp::CmpGt => self.set_t(rn as i32 > rm as i32),
            BinaryOp::CmpStr => self.set_t(any_byte_equal(rn, rm)),
            BinaryOp::Div0s => {
                let q = rn & 0x8000_0000 != 0;
                let mflag = rm & 0x8000_0000 != 0;
                let sr = self.core.state.sr_flags_mut();
                sr.set_q(q);
                sr.set_m(mflag);
                sr.set_t(q != mflag);
            }
            BinaryOp::Div1 => {
                let sr = self.core.state.sr();
                let (result, q, t) = div1(rn, rm, sr.q(), sr.m(), sr.t());
                self.set_r(n, result);
                let sr = self.core.state.sr_flags_mut();
                sr.set_q(q);
                sr.set_t(t);
            }
            BinaryOp::Xtrct => self.set_r(n, (rm << 16) | (rn >> 16)),
            BinaryOp::MulL => self.core.state.macl = rn.wrapping_mul(rm),
            BinaryOp::MulsW => {
                self.core.state.macl = (i32::from(rn as i16) * i32::from(rm as i16)) as u32;
            }
            BinaryOp::MuluW => {
                self.core.state.macl = u32::from(rn as u16) * u32::from(rm as u16);
            }
            BinaryOp::DmulsL => {
                let product = i64::from(rn as i32) * i64::from(rm as i32);
                self.core.state.mach = (product >> 32) as u32;
                self.core.state.macl = product as u32;
            }
            BinaryOp::DmuluL => {
                let product = u64::from(rn) * u64::from(rm);
                self.core.state.mach = (product >> 32) as u32;
                self.core.state.macl = product as u32;
            }
            BinaryOp::Shad => self.set_r(n, shift_arithmetic_dynamic(rn, rm)),
            BinaryOp::Shld => self.set_r(n, shift_logical_dynamic(rn, rm)),
            BinaryOp::Neg => self.set_r(n, rm.wrapping_neg()),
            BinaryOp::Negc => {
                let (diff, borrow) = sub_with_borrow(0, rm, self.t());
                self.set_r(n, diff);
                self.set_t(borrow);
            }
            BinaryOp::Not => self.set_r(n, !rm),
            BinaryOp::SwapB => self.set_r(n, swap_low_bytes(rm)),
            BinaryOp::SwapW => self.set_r(n, rm.rotate_left(16)),
            BinaryOp::ExtsB => self.set_r(n, rm as i8 as u32),
            BinaryOp::ExtsW => self.set_r(n, rm as i16 as u32),
            BinaryOp::ExtuB => self.set_r(n, rm & 0xFF),
            BinaryOp::ExtuW => self.set_r(n, rm & 0xFFFF),
        }
    }

    fn unary(&mut self, op: UnaryOp, n: u8) {
        let rn = self.r(n);
        let msb = rn & 0x8000_0000 != 0;
        let lsb = rn & 1 != 0;
        match op {
            UnaryOp::Shll | UnaryOp::Shal => {
                self.set_t(msb);
                self.set_r(n, rn << 1);
            }
            UnaryOp::Shlr => {
                self.set_t(lsb);
                self.set_r(n, rn >> 1);
            }
            UnaryOp::Shar => {
                self.set_t(lsb);
                self.set_r(n, ((rn as i32) >> 1) as u32);
            }
            UnaryOp::Rotl => {
                self.set_t(msb);
                self.set_r(n, rn.rotate_left(1));
            }
            UnaryOp::Rotr => {
                self.set_t(lsb);
                self.set_r(n, rn.rotate_right(1));
            }
            UnaryOp::Rotcl => {
                let carry_in = u32::from(self.t());
                self.set_t(msb);
                self.set_r(n, (rn << 1) | carry_in);
            }
            UnaryOp::Rotcr => {
                let carry_in = u32::from(self.t());
                self.set_t(lsb);
                self.set_r(n, (rn >> 1) | (carry_in << 31));
            }
            UnaryOp::Shll2 => self.set_r(n, rn << 2),
            UnaryOp::Shlr2 => self.set_r(n, rn >> 2),
            UnaryOp::Shll8 => self.set_r(n, rn << 8),
            UnaryOp::Shlr8 => self.set_r(n, rn >> 8),
            UnaryOp::Shll16 => self.set_r(n, rn << 16),
            UnaryOp::Shlr16 => self.set_r(n, rn >> 16),
            UnaryOp::Dt => {
                let value = rn.wrapping_sub(1);
                self.set_r(n, value);
                self.set_t(value == 0);
            }
            UnaryOp::CmpPz => self.set_t(rn as i32 >= 0),
            UnaryOp::CmpPl => self.set_t(rn as i32 > 0),
        }
    }
}
