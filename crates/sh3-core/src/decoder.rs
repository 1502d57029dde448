//! SH-3 instruction decoder.
//!
//! Every 16-bit word decodes to an [`Instruction`]; encodings the core does not
//! implement (the FPU page among them) decode to [`Instruction::Unknown`].
//! Displacements are scaled and sign-extended at decode time.

#![allow(missing_docs, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use crate::memory::AccessWidth;
use crate::timing::CycleCostKind;

/// Memory operand of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// `@Rn`
    Indirect(u8),
    /// `@Rn+`
    PostIncrement(u8),
    /// `@-Rn`
    PreDecrement(u8),
    /// `@(disp,Rn)`, displacement in bytes.
    Displacement(u8, u32),
    /// `@(R0,Rn)`
    Indexed(u8),
    /// `@(disp,GBR)`, displacement in bytes.
    Gbr(u32),
    /// `@(disp,PC)`, displacement in bytes.
    Pc(u32),
}

/// Two-register operations `op Rm,Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Addc,
    Addv,
    Sub,
    Subc,
    Subv,
    And,
    Or,
    Xor,
    Tst,
    CmpEq,
    CmpHs,
    CmpGe,
    CmpHi,
    CmpGt,
    CmpStr,
    Div0s,
    Div1,
    Xtrct,
    MulL,
    MulsW,
    MuluW,
    DmulsL,
    DmuluL,
    Shad,
    Shld,
    Neg,
    Negc,
    Not,
    SwapB,
    SwapW,
    ExtsB,
    ExtsW,
    ExtuB,
    ExtuW,
}

/// Single-register operations `op Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Shll,
    Shlr,
    Shal,
    Shar,
    Rotl,
    Rotr,
    Rotcl,
    Rotcr,
    Shll2,
    Shlr2,
    Shll8,
    Shlr8,
    Shll16,
    Shlr16,
    Dt,
    CmpPz,
    CmpPl,
}

/// Logic operations with an 8-bit immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    Tst,
}

/// Registers reached by LDC/STC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlRegister {
    Sr,
    Gbr,
    Vbr,
    Ssr,
    Spc,
    /// Inactive-bank copy of `R0`..`R7`.
    Bank(u8),
}

/// Registers reached by LDS/STS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRegister {
    Mach,
    Macl,
    Pr,
}

/// A decoded instruction. Register fields are 0..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Nop,
    Clrt,
    Sett,
    Clrs,
    Sets,
    Clrmac,
    Div0u,
    Ldtlb,
    Sleep,
    Rts,
    Rte,
    /// PREF, OCBI, OCBP and OCBWB: no architectural effect here.
    CacheHint { n: u8 },
    /// `MOVCA.L R0,@Rn`
    MovcaL { n: u8 },
    /// `MOV #imm,Rn`
    MovImm { imm: i8, n: u8 },
    /// `MOV Rm,Rn`
    Mov { m: u8, n: u8 },
    /// `MOVA @(disp,PC),R0`
    Mova { disp: u32 },
    /// `MOVT Rn`
    Movt { n: u8 },
    /// Sign-extending load into `Rn`.
    Load {
        size: AccessWidth,
        src: Operand,
        n: u8,
    },
    /// Store of `Rm`.
    Store {
        size: AccessWidth,
        m: u8,
        dst: Operand,
    },
    /// `ADD #imm,Rn`
    AddImm { imm: i8, n: u8 },
    /// `CMP/EQ #imm,R0`
    CmpEqImm { imm: i8 },
    Binary { op: BinaryOp, m: u8, n: u8 },
    Unary { op: UnaryOp, n: u8 },
    /// `op #imm,R0`
    LogicImm { op: LogicOp, imm: u8 },
    /// `op.B #imm,@(R0,GBR)`
    LogicGbr { op: LogicOp, imm: u8 },
    /// `TAS.B @Rn`
    TasB { n: u8 },
    /// `MAC.L @Rm+,@Rn+`
    MacL { m: u8, n: u8 },
    /// `MAC.W @Rm+,@Rn+`
    MacW { m: u8, n: u8 },
    /// `LDC Rm,reg`
    Ldc { m: u8, reg: ControlRegister },
    /// `LDC.L @Rm+,reg`
    LdcL { m: u8, reg: ControlRegister },
    /// `STC reg,Rn`
    Stc { reg: ControlRegister, n: u8 },
    /// `STC.L reg,@-Rn`
    StcL { reg: ControlRegister, n: u8 },
    /// `LDS Rm,reg`
    Lds { m: u8, reg: SystemRegister },
    /// `LDS.L @Rm+,reg`
    LdsL { m: u8, reg: SystemRegister },
    /// `STS reg,Rn`
    Sts { reg: SystemRegister, n: u8 },
    /// `STS.L reg,@-Rn`
    StsL { reg: SystemRegister, n: u8 },
    /// Byte offset from `PC + 4`.
    Bra { disp: i32 },
    Bsr { disp: i32 },
    Braf { m: u8 },
    Bsrf { m: u8 },
    Jmp { m: u8 },
    Jsr { m: u8 },
    Bt { disp: i32 },
    Bf { disp: i32 },
    BtS { disp: i32 },
    BfS { disp: i32 },
    Trapa { imm: u8 },
    Unknown(u16),
}

impl Instruction {
    /// Whether the instruction must not sit in a delay slot.
    #[must_use]
    pub const fn is_slot_illegal(self) -> bool {
        matches!(
            self,
            Self::Ldc {
                reg: ControlRegister::Sr,
                ..
            } | Self::LdcL {
                reg: ControlRegister::Sr,
                ..
            } | Self::Bra { .. }
                | Self::Bsr { .. }
                | Self::Braf { .. }
                | Self::Bsrf { .. }
                | Self::Jmp { .. }
                | Self::Jsr { .. }
                | Self::Bt { .. }
                | Self::Bf { .. }
                | Self::BtS { .. }
                | Self::BfS { .. }
                | Self::Rts
                | Self::Rte
                | Self::Trapa { .. }
                | Self::Sleep
        )
    }

    /// Whether the instruction requires SR.MD.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        match self {
            Self::Ldc { reg, .. }
            | Self::LdcL { reg, .. }
            | Self::Stc { reg, .. }
            | Self::StcL { reg, .. } => !matches!(reg, ControlRegister::Gbr),
            Self::Rte | Self::Sleep | Self::Ldtlb => true,
            _ => false,
        }
    }

    /// Cost class of the instruction, excluding any delay slot.
    #[must_use]
    pub const fn cycle_kind(self) -> CycleCostKind {
        match self {
            Self::Load { .. } | Self::TasB { .. } => CycleCostKind::Load,
            Self::Store { .. } | Self::MovcaL { .. } => CycleCostKind::Store,
            Self::MovImm { .. } | Self::Mov { .. } | Self::Mova { .. } | Self::Movt { .. } => {
                CycleCostKind::Move
            }
            Self::LogicGbr { .. } => CycleCostKind::GbrLogic,
            Self::Binary {
                op: BinaryOp::MulL | BinaryOp::MulsW | BinaryOp::MuluW | BinaryOp::DmulsL
                    | BinaryOp::DmuluL,
                ..
            } => CycleCostKind::Multiply,
            Self::MacL { .. } | Self::MacW { .. } => CycleCostKind::MultiplyAccumulate,
            Self::Ldc {
                reg: ControlRegister::Sr,
                ..
            } => CycleCostKind::LoadSr,
            Self::Lds {
                reg: SystemRegister::Mach,
                ..
            } => CycleCostKind::LoadMach,
            Self::Ldc { .. }
            | Self::LdcL { .. }
            | Self::Stc { .. }
            | Self::StcL { .. }
            | Self::Lds { .. }
            | Self::LdsL { .. }
            | Self::Sts { .. }
            | Self::StsL { .. } => CycleCostKind::ControlMove,
            Self::Bra { .. }
            | Self::Bsr { .. }
            | Self::Braf { .. }
            | Self::Bsrf { .. }
            | Self::Jmp { .. }
            | Self::Jsr { .. } => CycleCostKind::DelayedBranch,
            Self::Rts | Self::Rte => CycleCostKind::Return,
            Self::Bt { .. } | Self::Bf { .. } => CycleCostKind::ConditionalBranch,
            Self::BtS { .. } | Self::BfS { .. } => CycleCostKind::DelayedConditionalBranch,
            Self::Trapa { .. } => CycleCostKind::Trap,
            Self::Sleep => CycleCostKind::Sleep,
            Self::Unknown(_) => CycleCostKind::Unknown,
            _ => CycleCostKind::Alu,
        }
    }
}

const fn field_n(op: u16) -> u8 {
    ((op >> 8) & 0x0F) as u8
}

const fn field_m(op: u16) -> u8 {
    ((op >> 4) & 0x0F) as u8
}

const fn disp4(op: u16) -> u32 {
    (op & 0x0F) as u32
}

const fn disp8(op: u16) -> u32 {
    (op & 0xFF) as u32
}

const fn imm8(op: u16) -> i8 {
    (op & 0xFF) as u8 as i8
}

/// Sign-extended 8-bit branch displacement in bytes.
const fn branch8(op: u16) -> i32 {
    imm8(op) as i32 * 2
}

/// Sign-extended 12-bit branch displacement in bytes.
const fn branch12(op: u16) -> i32 {
    (((op & 0x0FFF) << 4) as i16 >> 4) as i32 * 2
}

const fn binary(op: BinaryOp, word: u16) -> Instruction {
    Instruction::Binary {
        op,
        m: field_m(word),
        n: field_n(word),
    }
}

const fn unary(op: UnaryOp, word: u16) -> Instruction {
    Instruction::Unary {
        op,
        n: field_n(word),
    }
}

/// Decodes one instruction word.
#[must_use]
pub const fn decode(op: u16) -> Instruction {
    match op >> 12 {
        0x0 => decode_0(op),
        0x1 => Instruction::Store {
            size: AccessWidth::Long,
            m: field_m(op),
            dst: Operand::Displacement(field_n(op), disp4(op) * 4),
        },
        0x2 => decode_2(op),
        0x3 => decode_3(op),
        0x4 => decode_4(op),
        0x5 => Instruction::Load {
            size: AccessWidth::Long,
            src: Operand::Displacement(field_m(op), disp4(op) * 4),
            n: field_n(op),
        },
        0x6 => decode_6(op),
        0x7 => Instruction::AddImm {
            imm: imm8(op),
            n: field_n(op),
        },
        0x8 => decode_8(op),
        0x9 => Instruction::Load {
            size: AccessWidth::Word,
            src: Operand::Pc(disp8(op) * 2),
            n: field_n(op),
        },
        0xA => Instruction::Bra { disp: branch12(op) },
        0xB => Instruction::Bsr { disp: branch12(op) },
        0xC => decode_c(op),
        0xD => Instruction::Load {
            size: AccessWidth::Long,
            src: Operand::Pc(disp8(op) * 4),
            n: field_n(op),
        },
        0xE => Instruction::MovImm {
            imm: imm8(op),
            n: field_n(op),
        },
        _ => Instruction::Unknown(op),
    }
}

const fn decode_0(op: u16) -> Instruction {
    let n = field_n(op);
    let m = field_m(op);
    match op {
        0x0008 => return Instruction::Clrt,
        0x0009 => return Instruction::Nop,
        0x000B => return Instruction::Rts,
        0x0018 => return Instruction::Sett,
        0x0019 => return Instruction::Div0u,
        0x001B => return Instruction::Sleep,
        0x0028 => return Instruction::Clrmac,
        0x002B => return Instruction::Rte,
        0x0038 => return Instruction::Ldtlb,
        0x0048 => return Instruction::Clrs,
        0x0058 => return Instruction::Sets,
        _ => {}
    }
    match op & 0x00FF {
        0x02 => return Instruction::Stc {
            reg: ControlRegister::Sr,
            n,
        },
        0x12 => return Instruction::Stc {
            reg: ControlRegister::Gbr,
            n,
        },
        0x22 => return Instruction::Stc {
            reg: ControlRegister::Vbr,
            n,
        },
        0x32 => return Instruction::Stc {
            reg: ControlRegister::Ssr,
            n,
        },
        0x42 => return Instruction::Stc {
            reg: ControlRegister::Spc,
            n,
        },
        0x03 => return Instruction::Bsrf { m: n },
        0x23 => return Instruction::Braf { m: n },
        0x83 | 0x93 | 0xA3 | 0xB3 => return Instruction::CacheHint { n },
        0xC3 => return Instruction::MovcaL { n },
        0x0A => return Instruction::Sts {
            reg: SystemRegister::Mach,
            n,
        },
        0x1A => return Instruction::Sts {
            reg: SystemRegister::Macl,
            n,
        },
        0x2A => return Instruction::Sts {
            reg: SystemRegister::Pr,
            n,
        },
        0x29 => return Instruction::Movt { n },
        _ => {}
    }
    match op & 0x000F {
        0x2 if m & 0x8 != 0 => Instruction::Stc {
            reg: ControlRegister::Bank(m & 0x7),
            n,
        },
        0x4 => Instruction::Store {
            size: AccessWidth::Byte,
            m,
            dst: Operand::Indexed(n),
        },
        0x5 => Instruction::Store {
            size: AccessWidth::Word,
            m,
            dst: Operand::Indexed(n),
        },
        0x6 => Instruction::Store {
            size: AccessWidth::Long,
            m,
            dst: Operand::Indexed(n),
        },
        0x7 => binary(BinaryOp::MulL, op),
        0xC => Instruction::Load {
            size: AccessWidth::Byte,
            src: Operand::Indexed(m),
            n,
        },
        0xD => Instruction::Load {
            size: AccessWidth::Word,
            src: Operand::Indexed(m),
            n,
        },
        0xE => Instruction::Load {
            size: AccessWidth::Long,
            src: Operand::Indexed(m),
            n,
        },
        0xF => Instruction::MacL { m, n },
        _ => Instruction::Unknown(op),
    }
}

const fn decode_2(op: u16) -> Instruction {
    let n = field_n(op);
    let m = field_m(op);
    match op & 0x000F {
        0x0 => Instruction::Store {
            size: AccessWidth::Byte,
            m,
            dst: Operand::Indirect(n),
        },
        0x1 => Instruction::Store {
            size: AccessWidth::Word,
            m,
            dst: Operand::Indirect(n),
        },
        0x2 => Instruction::Store {
            size: AccessWidth::Long,
            m,
            dst: Operand::Indirect(n),
        },
        0x4 => Instruction::Store {
            size: AccessWidth::Byte,
            m,
            dst: Operand::PreDecrement(n),
        },
        0x5 => Instruction::Store {
            size: AccessWidth::Word,
            m,
            dst: Operand::PreDecrement(n),
        },
        0x6 => Instruction::Store {
            size: AccessWidth::Long,
            m,
            dst: Operand::PreDecrement(n),
        },
        0x7 => binary(BinaryOp::Div0s, op),
        0x8 => binary(BinaryOp::Tst, op),
        0x9 => binary(BinaryOp::And, op),
        0xA => binary(BinaryOp::Xor, op),
        0xB => binary(BinaryOp::Or, op),
        0xC => binary(BinaryOp::CmpStr, op),
        0xD => binary(BinaryOp::Xtrct, op),
        0xE => binary(BinaryOp::MuluW, op),
        0xF => binary(BinaryOp::MulsW, op),
        _ => Instruction::Unknown(op),
    }
}

const fn decode_3(op: u16) -> Instruction {
    let kind = match op & 0x000F {
        0x0 => BinaryOp::CmpEq,
        0x2 => BinaryOp::CmpHs,
        0x3 => BinaryOp::CmpGe,
        0x4 => BinaryOp::Div1,
        0x5 => BinaryOp::DmuluL,
        0x6 => BinaryOp::CmpHi,
        0x7 => BinaryOp::CmpGt,
        0x8 => BinaryOp::Sub,
        0xA => BinaryOp::Subc,
        0xB => BinaryOp::Subv,
        0xC => BinaryOp::Add,
        0xD => BinaryOp::DmulsL,
        0xE => BinaryOp::Addc,
        0xF => BinaryOp::Addv,
        _ => return Instruction::Unknown(op),
    };
    binary(kind, op)
}

const fn control_register(selector: u8) -> Option<ControlRegister> {
    match selector {
        0x0 => Some(ControlRegister::Sr),
        0x1 => Some(ControlRegister::Gbr),
        0x2 => Some(ControlRegister::Vbr),
        0x3 => Some(ControlRegister::Ssr),
        0x4 => Some(ControlRegister::Spc),
        0x8..=0xF => Some(ControlRegister::Bank(selector & 0x7)),
        _ => None,
    }
}

const fn system_register(selector: u8) -> Option<SystemRegister> {
    match selector {
        0x0 => Some(SystemRegister::Mach),
        0x1 => Some(SystemRegister::Macl),
        0x2 => Some(SystemRegister::Pr),
        _ => None,
    }
}

const fn decode_4(op: u16) -> Instruction {
    let n = field_n(op);
    let m = field_m(op);
    match op & 0x00FF {
        0x00 => return unary(UnaryOp::Shll, op),
        0x01 => return unary(UnaryOp::Shlr, op),
        0x04 => return unary(UnaryOp::Rotl, op),
        0x05 => return unary(UnaryOp::Rotr, op),
        0x08 => return unary(UnaryOp::Shll2, op),
        0x09 => return unary(UnaryOp::Shlr2, op),
        0x0B => return Instruction::Jsr { m: n },
        0x10 => return unary(UnaryOp::Dt, op),
        0x11 => return unary(UnaryOp::CmpPz, op),
        0x15 => return unary(UnaryOp::CmpPl, op),
        0x18 => return unary(UnaryOp::Shll8, op),
        0x19 => return unary(UnaryOp::Shlr8, op),
        0x1B => return Instruction::TasB { n },
        0x20 => return unary(UnaryOp::Shal, op),
        0x21 => return unary(UnaryOp::Shar, op),
        0x24 => return unary(UnaryOp::Rotcl, op),
        0x25 => return unary(UnaryOp::Rotcr, op),
        0x28 => return unary(UnaryOp::Shll16, op),
        0x29 => return unary(UnaryOp::Shlr16, op),
        0x2B => return Instruction::Jmp { m: n },
        _ => {}
    }
    match op & 0x000F {
        0x2 => match system_register(m) {
            Some(reg) => Instruction::StsL { reg, n },
            None => Instruction::Unknown(op),
        },
        0x3 => match control_register(m) {
            Some(reg) => Instruction::StcL { reg, n },
            None => Instruction::Unknown(op),
        },
        0x6 => match system_register(m) {
            Some(reg) => Instruction::LdsL { m: n, reg },
            None => Instruction::Unknown(op),
        },
        0x7 => match control_register(m) {
            Some(reg) => Instruction::LdcL { m: n, reg },
            None => Instruction::Unknown(op),
        },
        0xA => match system_register(m) {
            Some(reg) => Instruction::Lds { m: n, reg },
            None => Instruction::Unknown(op),
        },
        0xE => match control_register(m) {
            Some(reg) => Instruction::Ldc { m: n, reg },
            None => Instruction::Unknown(op),
        },
        0xC => binary(BinaryOp::Shad, op),
        0xD => binary(BinaryOp::Shld, op),
        0xF => Instruction::MacW { m, n },
        _ => Instruction::Unknown(op),
    }
}

const fn decode_6(op: u16) -> Instruction {
    let n = field_n(op);
    let m = field_m(op);
    let kind = match op & 0x000F {
        0x0 => {
            return Instruction::Load {
                size: AccessWidth::Byte,
                src: Operand::Indirect(m),
                n,
            }
        }
        0x1 => {
            return Instruction::Load {
                size: AccessWidth::Word,
                src: Operand::Indirect(m),
                n,
            }
        }
        0x2 => {
            return Instruction::Load {
                size: AccessWidth::Long,
                src: Operand::Indirect(m),
                n,
            }
        }
        0x3 => return Instruction::Mov { m, n },
        0x4 => {
            return Instruction::Load {
                size: AccessWidth::Byte,
                src: Operand::PostIncrement(m),
                n,
            }
        }
        0x5 => {
            return Instruction::Load {
                size: AccessWidth::Word,
                src: Operand::PostIncrement(m),
                n,
            }
        }
        0x6 => {
            return Instruction::Load {
                size: AccessWidth::Long,
                src: Operand::PostIncrement(m),
                n,
            }
        }
        0x7 => BinaryOp::Not,
        0x8 => BinaryOp::SwapB,
        0x9 => BinaryOp::SwapW,
        0xA => BinaryOp::Negc,
        0xB => BinaryOp::Neg,
        0xC => BinaryOp::ExtuB,
        0xD => BinaryOp::ExtuW,
        0xE => BinaryOp::ExtsB,
        _ => BinaryOp::ExtsW,
    };
    binary(kind, op)
}

const fn decode_8(op: u16) -> Instruction {
    let reg = field_m(op);
    match field_n(op) {
        0x0 => Instruction::Store {
            size: AccessWidth::Byte,
            m: 0,
            dst: Operand::Displacement(reg, disp4(op)),
        },
        0x1 => Instruction::Store {
            size: AccessWidth::Word,
            m: 0,
            dst: Operand::Displacement(reg, disp4(op) * 2),
        },
        0x4 => Instruction::Load {
            size: AccessWidth::Byte,
            src: Operand::Displacement(reg, disp4(op)),
            n: 0,
        },
        0x5 => Instruction::Load {
            size: AccessWidth::Word,
            src: Operand::Displacement(reg, disp4(op) * 2),
            n: 0,
        },
        0x8 => Instruction::CmpEqImm { imm: imm8(op) },
        0x9 => Instruction::Bt { disp: branch8(op) },
        0xB => Instruction::Bf { disp: branch8(op) },
        0xD => Instruction::BtS { disp: branch8(op) },
        0xF => Instruction::BfS { disp: branch8(op) },
        _ => Instruction::Unknown(op),
    }
}

const fn decode_c(op: u16) -> Instruction {
    let imm = (op & 0xFF) as u8;
    match field_n(op) {
        0x0 => Instruction::Store {
            size: AccessWidth::Byte,
            m: 0,
            dst: Operand::Gbr(disp8(op)),
        },
        0x1 => Instruction::Store {
            size: AccessWidth::Word,
            m: 0,
            dst: Operand::Gbr(disp8(op) * 2),
        },
        0x2 => Instruction::Store {
            size: AccessWidth::Long,
            m: 0,
            dst: Operand::Gbr(disp8(op) * 4),
        },
        0x3 => Instruction::Trapa { imm },
        0x4 => Instruction::Load {
            size: AccessWidth::Byte,
            src: Operand::Gbr(disp8(op)),
            n: 0,
        },
        0x5 => Instruction::Load {
            size: AccessWidth::Word,
            src: Operand::Gbr(disp8(op) * 2),
            n: 0,
        },
        0x6 => Instruction::Load {
            size: AccessWidth::Long,
            src: Operand::Gbr(disp8(op) * 4),
            n: 0,
        },
        0x7 => Instruction::Mova {
            disp: disp8(op) * 4,
        },
        0x8 => Instruction::LogicImm {
            op: LogicOp::Tst,
            imm,
        },
        0x9 => Instruction::LogicImm {
            op: LogicOp::And,
            imm,
        },
        0xA => Instruction::LogicImm {
            op: LogicOp::Xor,
            imm,
        },
        0xB => Instruction::LogicImm {
            op: LogicOp::Or,
            imm,
        },
        0xC => Instruction::LogicGbr {
            op: LogicOp::Tst,
            imm,
        },
        0xD => Instruction::LogicGbr {
            op: LogicOp::And,
            imm,
        },
        0xE => Instruction::LogicGbr {
            op: LogicOp::Xor,
            imm,
        },
        _ => Instruction::LogicGbr {
            op: LogicOp::Or,
            imm,
        },
    }
}
