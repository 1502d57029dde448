/// Instruction classes with fixed cycle costs.
///
/// Delayed transfers add the cost of their slot instruction on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CycleCostKind {
    /// Arithmetic, logic, shifts, compares and flag operations.
    Alu,
    /// Register and immediate moves.
    Move,
    /// Memory reads into a register.
    Load,
    /// Memory writes from a register.
    Store,
    /// Read-modify-write logic on `@(R0,GBR)`.
    GbrLogic,
    /// `MUL.L`, `MULS.W`, `MULU.W`, `DMULS.L`, `DMULU.L`.
    Multiply,
    /// `MAC.L`, `MAC.W`.
    MultiplyAccumulate,
    /// LDC/STC/LDS/STS other than the two listed below.
    ControlMove,
    /// `LDS Rm,MACH`.
    LoadMach,
    /// `LDC Rm,SR`.
    LoadSr,
    /// BRA, BSR, BRAF, BSRF, JMP, JSR.
    DelayedBranch,
    /// RTS, RTE.
    Return,
    /// BT, BF.
    ConditionalBranch,
    /// BT/S, BF/S.
    DelayedConditionalBranch,
    /// TRAPA.
    Trap,
    /// SLEEP.
    Sleep,
    /// Encodings the core does not implement.
    Unknown,
}

/// Single source-of-truth cycle-cost table.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u16)] = &[
    (CycleCostKind::Alu, 1),
    (CycleCostKind::Move, 1),
    (CycleCostKind::Load, 1),
    (CycleCostKind::Store, 1),
    (CycleCostKind::GbrLogic, 5),
    (CycleCostKind::Multiply, 5),
    (CycleCostKind::MultiplyAccumulate, 3),
    (CycleCostKind::ControlMove, 2),
    (CycleCostKind::LoadMach, 1),
    (CycleCostKind::LoadSr, 4),
    (CycleCostKind::DelayedBranch, 2),
    (CycleCostKind::Return, 1),
    (CycleCostKind::ConditionalBranch, 2),
    (CycleCostKind::DelayedConditionalBranch, 2),
    (CycleCostKind::Trap, 1),
    (CycleCostKind::Sleep, 1),
    (CycleCostKind::Unknown, 1),
];

/// Looks up the cycle cost for a cycle-cost kind.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> Option<u16> {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry_kind, cycles)| (*entry_kind == kind).then_some(*cycles))
}

/// Cost of `kind`, or one cycle if the table misses it.
#[must_use]
pub fn cycles_for(kind: CycleCostKind) -> u32 {
    cycle_cost(kind).map_or(1, u32::from)
}
