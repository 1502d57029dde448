//! Saturating diagnostic counters for conditions the core tolerates.
//!
//! Open-bus accesses, unknown opcodes and the unenforced privilege and
//! delay-slot checks never stop the machine. They are logged and counted here
//! so hosts and tests can observe them without capturing log output.

use crate::memory::{AccessKind, AccessWidth};

/// Description of the most recent open-bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct UnmappedAccess {
    /// Read or write.
    pub kind: AccessKind,
    /// Access width.
    pub width: AccessWidth,
    /// Raw address, including mirror bits.
    pub addr: u32,
}

/// Address-space counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusDiagnostics {
    /// Reads served as open bus.
    pub unmapped_reads: u64,
    /// Writes dropped as open bus.
    pub unmapped_writes: u64,
    /// Most recent open-bus access.
    pub last_unmapped: Option<UnmappedAccess>,
}

impl BusDiagnostics {
    /// Records one open-bus access.
    pub fn record_unmapped(&mut self, access: UnmappedAccess) {
        match access.kind {
            AccessKind::Read => self.unmapped_reads = self.unmapped_reads.saturating_add(1),
            AccessKind::Write => self.unmapped_writes = self.unmapped_writes.saturating_add(1),
        }
        self.last_unmapped = Some(access);
    }

    /// Total open-bus accesses in both directions.
    #[must_use]
    pub const fn unmapped_total(&self) -> u64 {
        self.unmapped_reads.saturating_add(self.unmapped_writes)
    }
}

/// Execution-loop counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuDiagnostics {
    /// Instructions retired, delay slots included.
    pub instructions: u64,
    /// Granules completed.
    pub granules: u64,
    /// Interrupts taken.
    pub interrupts_serviced: u64,
    /// Undecodable opcodes executed as one-cycle no-ops.
    pub unknown_opcodes: u64,
    /// Address and word of the most recent unknown opcode.
    pub last_unknown_opcode: Option<(u32, u16)>,
    /// Privileged instructions executed with SR.MD clear.
    pub privilege_violations: u64,
    /// Control transfers found inside a delay slot.
    pub illegal_slot_instructions: u64,
}

impl CpuDiagnostics {
    /// Counts one retired instruction.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_instruction(&mut self) {
        self.instructions = self.instructions.saturating_add(1);
    }

    /// Counts one unknown opcode.
    pub fn record_unknown_opcode(&mut self, pc: u32, opcode: u16) {
        self.unknown_opcodes = self.unknown_opcodes.saturating_add(1);
        self.last_unknown_opcode = Some((pc, opcode));
    }

    /// Counts one privileged instruction in user mode.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_privilege_violation(&mut self) {
        self.privilege_violations = self.privilege_violations.saturating_add(1);
    }

    /// Counts one control transfer inside a delay slot.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_illegal_slot(&mut self) {
        self.illegal_slot_instructions = self.illegal_slot_instructions.saturating_add(1);
    }

    /// Resets all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{BusDiagnostics, CpuDiagnostics, UnmappedAccess};
    use crate::memory::{AccessKind, AccessWidth};

    #[test]
    fn unmapped_accesses_split_by_direction() {
        let mut diag = BusDiagnostics::default();
        let read = UnmappedAccess {
            kind: AccessKind::Read,
            width: AccessWidth::Byte,
            addr: 0x1000,
        };
        diag.record_unmapped(read);
        diag.record_unmapped(UnmappedAccess {
            kind: AccessKind::Write,
            ..read
        });
        assert_eq!(diag.unmapped_reads, 1);
        assert_eq!(diag.unmapped_writes, 1);
        assert_eq!(diag.unmapped_total(), 2);
        assert_eq!(diag.last_unmapped.map(|a| a.kind), Some(AccessKind::Write));
    }

    #[test]
    fn counters_saturate() {
        let mut diag = CpuDiagnostics {
            instructions: u64::MAX,
            ..CpuDiagnostics::default()
        };
        diag.record_instruction();
        assert_eq!(diag.instructions, u64::MAX);
    }

    #[test]
    fn unknown_opcode_keeps_last_location() {
        let mut diag = CpuDiagnostics::default();
        diag.record_unknown_opcode(0xA000_0000, 0xFFFD);
        diag.record_unknown_opcode(0xA000_0010, 0xF00D);
        assert_eq!(diag.unknown_opcodes, 2);
        assert_eq!(diag.last_unknown_opcode, Some((0xA000_0010, 0xF00D)));
        diag.reset();
        assert_eq!(diag, CpuDiagnostics::default());
    }
}
