//! Address, width and field of every on-chip register.
//!
//! Emulated software addresses these registers by absolute address, so the
//! table is the single source of truth for offsets and widths. It is expanded
//! once per [`super::Onchip`] into a byte-address index.

use crate::intc::PriorityRegister;
use crate::memory::AccessWidth;

/// Base of the P4 on-chip block.
pub const ONCHIP_P4_BASE: u32 = 0xFF00_0000;
/// Base of the area-7 on-chip block.
pub const ONCHIP_AREA7_BASE: u32 = 0xA400_0000;
/// Size registered for each on-chip block.
pub const ONCHIP_REGION_SIZE: u32 = 0x00FF_FFFF;
/// Instruction/operand cache address and data arrays (32-bit only, read as zero).
pub const CACHE_ARRAY_BASES: [u32; 4] = [0xF000_0000, 0xF100_0000, 0xF400_0000, 0xF500_0000];
/// Size of each cache array window.
pub const CACHE_ARRAY_SIZE: u32 = 0x0100_0000;

/// TRA: TRAPA immediate, shifted left by two.
pub const TRA: u32 = 0xFFFF_FFD0;
/// EXPEVT: exception event code.
pub const EXPEVT: u32 = 0xFFFF_FFD4;
/// INTEVT: interrupt event code.
pub const INTEVT: u32 = 0xFFFF_FFD8;
/// INTEVT2: interrupt source code.
pub const INTEVT2: u32 = 0xA400_0000;
/// IRR0: IRL request flags.
pub const IRR0: u32 = 0xA400_0004;
/// TOCR: timer output control.
pub const TOCR: u32 = 0xFFFF_FE90;
/// TSTR: timer start bits.
pub const TSTR: u32 = 0xFFFF_FE92;
/// TCPR2: timer 2 input capture.
pub const TCPR2: u32 = 0xFFFF_FEB8;
/// TCOR0..2: timer constants.
pub const TCOR: [u32; 3] = [0xFFFF_FE94, 0xFFFF_FEA0, 0xFFFF_FEAC];
/// TCNT0..2: timer counters.
pub const TCNT: [u32; 3] = [0xFFFF_FE98, 0xFFFF_FEA4, 0xFFFF_FEB0];
/// TCR0..2: timer control.
pub const TCR: [u32; 3] = [0xFFFF_FE9C, 0xFFFF_FEA8, 0xFFFF_FEB4];
/// SAR0..3: DMA source address.
pub const SAR: [u32; 4] = [0xA400_0020, 0xA400_0030, 0xA400_0040, 0xA400_0050];
/// DAR0..3: DMA destination address.
pub const DAR: [u32; 4] = [0xA400_0024, 0xA400_0034, 0xA400_0044, 0xA400_0054];
/// DMATCR0..3: DMA transfer count.
pub const DMATCR: [u32; 4] = [0xA400_0028, 0xA400_0038, 0xA400_0048, 0xA400_0058];
/// CHCR0..3: DMA channel control.
pub const CHCR: [u32; 4] = [0xA400_002C, 0xA400_003C, 0xA400_004C, 0xA400_005C];
/// DMAOR: DMA operation register.
pub const DMAOR: u32 = 0xA400_0060;
/// PADR: first I/O port data register; ports follow at a stride of two.
pub const PADR: u32 = 0xA400_0120;
/// Number of I/O port data registers (PADR through PLDR).
pub const PORT_COUNT: usize = 11;

/// Storage behind an on-chip register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterField {
    /// Plain read/write storage without side effects.
    Plain,
    /// TRA.
    Tra,
    /// EXPEVT.
    Expevt,
    /// INTEVT.
    Intevt,
    /// INTEVT2.
    Intevt2,
    /// Interrupt priority register.
    Ipr(PriorityRegister),
    /// IRR0.
    Irr0,
    /// TOCR.
    Tocr,
    /// TSTR.
    Tstr,
    /// TCOR of a channel.
    Tcor(u8),
    /// TCNT of a channel.
    Tcnt(u8),
    /// TCR of a channel.
    Tcr(u8),
    /// TCPR2.
    Tcpr2,
    /// SAR of a channel.
    Sar(u8),
    /// DAR of a channel.
    Dar(u8),
    /// DMATCR of a channel.
    Dmatcr(u8),
    /// CHCR of a channel.
    Chcr(u8),
    /// DMAOR.
    Dmaor,
    /// Port data register.
    PortData(u8),
}

/// One on-chip register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    /// Hardware manual name.
    pub name: &'static str,
    /// Bus address.
    pub addr: u32,
    /// Natural width.
    pub width: AccessWidth,
    /// Backing field.
    pub field: RegisterField,
}

const fn b(name: &'static str, addr: u32, field: RegisterField) -> RegisterDescriptor {
    RegisterDescriptor {
        name,
        addr,
        width: AccessWidth::Byte,
        field,
    }
}

const fn w(name: &'static str, addr: u32, field: RegisterField) -> RegisterDescriptor {
    RegisterDescriptor {
        name,
        addr,
        width: AccessWidth::Word,
        field,
    }
}

const fn l(name: &'static str, addr: u32, field: RegisterField) -> RegisterDescriptor {
    RegisterDescriptor {
        name,
        addr,
        width: AccessWidth::Long,
        field,
    }
}

use RegisterField::{
    Chcr, Dar, Dmaor, Dmatcr, Expevt, Intevt, Intevt2, Ipr, Irr0, Plain, PortData, Sar, Tcnt,
    Tcor, Tcpr2, Tcr, Tocr, Tra, Tstr,
};

/// Every modeled on-chip register.
pub const ONCHIP_REGISTERS: &[RegisterDescriptor] = &[
    // MMU and cache
    l("PTEH", 0xFFFF_FFF0, Plain),
    l("PTEL", 0xFFFF_FFF4, Plain),
    l("TTB", 0xFFFF_FFF8, Plain),
    l("TEA", 0xFFFF_FFFC, Plain),
    l("MMUCR", 0xFFFF_FFE0, Plain),
    b("BASRA", 0xFFFF_FFE4, Plain),
    b("BASRB", 0xFFFF_FFE8, Plain),
    l("CCR", 0xFFFF_FFEC, Plain),
    l("CCR2", 0xA400_00B0, Plain),
    // Exceptions
    l("TRA", TRA, Tra),
    l("EXPEVT", EXPEVT, Expevt),
    l("INTEVT", INTEVT, Intevt),
    // User break controller
    l("BARA", 0xFFFF_FFB0, Plain),
    l("BAMRA", 0xFFFF_FFB4, Plain),
    w("BBRA", 0xFFFF_FFB8, Plain),
    l("BARB", 0xFFFF_FFA0, Plain),
    l("BAMRB", 0xFFFF_FFA4, Plain),
    w("BBRB", 0xFFFF_FFA8, Plain),
    l("BDRB", 0xFFFF_FF90, Plain),
    l("BDMRB", 0xFFFF_FF94, Plain),
    l("BRCR", 0xFFFF_FF98, Plain),
    w("BETR", 0xFFFF_FF9C, Plain),
    l("BRSR", 0xFFFF_FFAC, Plain),
    l("BRDR", 0xFFFF_FFBC, Plain),
    // Clock, standby, watchdog
    w("FRQCR", 0xFFFF_FF80, Plain),
    b("STBCR", 0xFFFF_FF82, Plain),
    b("STBCR2", 0xFFFF_FF88, Plain),
    b("WTCNT", 0xFFFF_FF84, Plain),
    b("WTCSR", 0xFFFF_FF86, Plain),
    // Bus state controller
    w("BCR1", 0xFFFF_FF60, Plain),
    w("BCR2", 0xFFFF_FF62, Plain),
    w("WCR1", 0xFFFF_FF64, Plain),
    w("WCR2", 0xFFFF_FF66, Plain),
    w("MCR", 0xFFFF_FF68, Plain),
    w("PCR", 0xFFFF_FF6C, Plain),
    w("RTCSR", 0xFFFF_FF6E, Plain),
    w("RTCNT", 0xFFFF_FF70, Plain),
    w("RTCOR", 0xFFFF_FF72, Plain),
    w("RFCR", 0xFFFF_FF74, Plain),
    b("SDMR", 0xFFFF_D000, Plain),
    // Realtime clock
    b("R64CNT", 0xFFFF_FEC0, Plain),
    b("RSECCNT", 0xFFFF_FEC2, Plain),
    b("RMINCNT", 0xFFFF_FEC4, Plain),
    b("RHRCNT", 0xFFFF_FEC6, Plain),
    b("RWKCNT", 0xFFFF_FEC8, Plain),
    b("RDAYCNT", 0xFFFF_FECA, Plain),
    b("RMONCNT", 0xFFFF_FECC, Plain),
    b("RYRCNT", 0xFFFF_FECE, Plain),
    b("RSECAR", 0xFFFF_FED0, Plain),
    b("RMINAR", 0xFFFF_FED2, Plain),
    b("RHRAR", 0xFFFF_FED4, Plain),
    b("RWKAR", 0xFFFF_FED6, Plain),
    b("RDAYAR", 0xFFFF_FED8, Plain),
    b("RMONAR", 0xFFFF_FEDA, Plain),
    b("RCR1", 0xFFFF_FEDC, Plain),
    b("RCR2", 0xFFFF_FEDE, Plain),
    // Interrupt controller
    w("ICR0", 0xFFFF_FEE0, Plain),
    w("IPRA", 0xFFFF_FEE2, Ipr(crate::intc::PriorityRegister::A)),
    w("IPRB", 0xFFFF_FEE4, Ipr(crate::intc::PriorityRegister::B)),
    l("INTEVT2", INTEVT2, Intevt2),
    b("IRR0", IRR0, Irr0),
    b("IRR1", 0xA400_0006, Plain),
    b("IRR2", 0xA400_0008, Plain),
    w("ICR1", 0xA400_0010, Plain),
    w("IPRC", 0xA400_0016, Ipr(crate::intc::PriorityRegister::C)),
    w("IPRD", 0xA400_0018, Ipr(crate::intc::PriorityRegister::D)),
    w("IPRE", 0xA400_001A, Ipr(crate::intc::PriorityRegister::E)),
    // Timer unit
    b("TOCR", TOCR, Tocr),
    b("TSTR", TSTR, Tstr),
    l("TCOR0", TCOR[0], Tcor(0)),
    l("TCNT0", TCNT[0], Tcnt(0)),
    w("TCR0", TCR[0], Tcr(0)),
    l("TCOR1", TCOR[1], Tcor(1)),
    l("TCNT1", TCNT[1], Tcnt(1)),
    w("TCR1", TCR[1], Tcr(1)),
    l("TCOR2", TCOR[2], Tcor(2)),
    l("TCNT2", TCNT[2], Tcnt(2)),
    w("TCR2", TCR[2], Tcr(2)),
    l("TCPR2", TCPR2, Tcpr2),
    // Serial communication interface
    b("SCSMR", 0xFFFF_FE80, Plain),
    b("SCBRR", 0xFFFF_FE82, Plain),
    b("SCSCR", 0xFFFF_FE84, Plain),
    b("SCTDR", 0xFFFF_FE86, Plain),
    b("SCSSR", 0xFFFF_FE88, Plain),
    b("SCRDR", 0xFFFF_FE8A, Plain),
    b("SCSCMR", 0xFFFF_FE8C, Plain),
    // DMA controller
    l("SAR0", SAR[0], Sar(0)),
    l("DAR0", DAR[0], Dar(0)),
    l("DMATCR0", DMATCR[0], Dmatcr(0)),
    l("CHCR0", CHCR[0], Chcr(0)),
    l("SAR1", SAR[1], Sar(1)),
    l("DAR1", DAR[1], Dar(1)),
    l("DMATCR1", DMATCR[1], Dmatcr(1)),
    l("CHCR1", CHCR[1], Chcr(1)),
    l("SAR2", SAR[2], Sar(2)),
    l("DAR2", DAR[2], Dar(2)),
    l("DMATCR2", DMATCR[2], Dmatcr(2)),
    l("CHCR2", CHCR[2], Chcr(2)),
    l("SAR3", SAR[3], Sar(3)),
    l("DAR3", DAR[3], Dar(3)),
    l("DMATCR3", DMATCR[3], Dmatcr(3)),
    l("CHCR3", CHCR[3], Chcr(3)),
    w("DMAOR", DMAOR, Dmaor),
    // Compare-match timer
    w("CMSTR", 0xA400_0070, Plain),
    w("CMCSR", 0xA400_0072, Plain),
    w("CMCNT", 0xA400_0074, Plain),
    w("CMCOR", 0xA400_0076, Plain),
    // A/D and D/A converters
    b("ADDRAH", 0xA400_0080, Plain),
    b("ADDRAL", 0xA400_0082, Plain),
    b("ADDRBH", 0xA400_0084, Plain),
    b("ADDRBL", 0xA400_0086, Plain),
    b("ADDRCH", 0xA400_0088, Plain),
    b("ADDRCL", 0xA400_008A, Plain),
    b("ADDRDH", 0xA400_008C, Plain),
    b("ADDRDL", 0xA400_008E, Plain),
    b("ADCSR", 0xA400_0090, Plain),
    b("ADCR", 0xA400_0092, Plain),
    b("DADR0", 0xA400_00A0, Plain),
    b("DADR1", 0xA400_00A2, Plain),
    b("DACR", 0xA400_00A4, Plain),
    // Pin function controller
    w("PACR", 0xA400_0100, Plain),
    w("PBCR", 0xA400_0102, Plain),
    w("PCCR", 0xA400_0104, Plain),
    w("PDCR", 0xA400_0106, Plain),
    w("PECR", 0xA400_0108, Plain),
    w("PFCR", 0xA400_010A, Plain),
    w("PGCR", 0xA400_010C, Plain),
    w("PHCR", 0xA400_010E, Plain),
    w("PJCR", 0xA400_0110, Plain),
    w("SCPCR", 0xA400_0116, Plain),
    // I/O ports
    b("PADR", PADR, PortData(0)),
    b("PBDR", 0xA400_0122, PortData(1)),
    b("PCDR", 0xA400_0124, PortData(2)),
    b("PDDR", 0xA400_0126, PortData(3)),
    b("PEDR", 0xA400_0128, PortData(4)),
    b("PFDR", 0xA400_012A, PortData(5)),
    b("PGDR", 0xA400_012C, PortData(6)),
    b("PHDR", 0xA400_012E, PortData(7)),
    b("PJDR", 0xA400_0130, PortData(8)),
    b("PKDR", 0xA400_0132, PortData(9)),
    b("PLDR", 0xA400_0134, PortData(10)),
    b("SCPDR", 0xA400_0136, Plain),
    // Serial communication interface with FIFO
    b("SCSMR2", 0xA400_0150, Plain),
    b("SCBRR2", 0xA400_0152, Plain),
    b("SCSCR2", 0xA400_0154, Plain),
    b("SCFTDR2", 0xA400_0156, Plain),
    w("SCSSR2", 0xA400_0158, Plain),
    b("SCFRDR2", 0xA400_015A, Plain),
    b("SCFCR2", 0xA400_015C, Plain),
    w("SCFDR2", 0xA400_015E, Plain),
    w("SDIR", 0xA400_0200, Plain),
];

const fn assert_registers_inside_onchip_blocks() {
    let mut i = 0;
    while i < ONCHIP_REGISTERS.len() {
        let addr = ONCHIP_REGISTERS[i].addr;
        let p4 = addr >= ONCHIP_P4_BASE;
        let area7 = addr >= ONCHIP_AREA7_BASE && addr < ONCHIP_AREA7_BASE + ONCHIP_REGION_SIZE;
        assert!(p4 || area7);
        assert!(addr % ONCHIP_REGISTERS[i].width.bytes() == 0);
        i += 1;
    }
}

const _: () = assert_registers_inside_onchip_blocks();

/// Looks a register up by its manual name.
#[must_use]
pub fn register_by_name(name: &str) -> Option<&'static RegisterDescriptor> {
    ONCHIP_REGISTERS.iter().find(|desc| desc.name == name)
}

#[cfg(test)]
mod tests {
    use super::{register_by_name, ONCHIP_REGISTERS, PADR, PORT_COUNT};
    use crate::memory::AccessWidth;
    use std::collections::HashSet;

    #[test]
    fn no_two_registers_share_a_byte() {
        let mut seen = HashSet::new();
        for desc in ONCHIP_REGISTERS {
            for offset in 0..desc.width.bytes() {
                assert!(
                    seen.insert(desc.addr + offset),
                    "{} overlaps another register",
                    desc.name
                );
            }
        }
    }

    #[test]
    fn port_data_registers_are_byte_wide_at_stride_two() {
        for port in 0..PORT_COUNT as u32 {
            let desc = ONCHIP_REGISTERS
                .iter()
                .find(|d| d.addr == PADR + port * 2)
                .expect("port register");
            assert_eq!(desc.width, AccessWidth::Byte);
        }
    }

    #[test]
    fn names_resolve_to_manual_addresses() {
        assert_eq!(register_by_name("TCR1").map(|d| d.addr), Some(0xFFFF_FEA8));
        assert_eq!(register_by_name("IPRC").map(|d| d.addr), Some(0xA400_0016));
        assert_eq!(
            register_by_name("CHCR0").map(|d| d.width),
            Some(AccessWidth::Long)
        );
        assert!(register_by_name("NOPE").is_none());
    }
}
