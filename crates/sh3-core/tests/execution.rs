//! Execution loop suite: delayed branches, bank switching, traps, and the
//! timer and DMA paths driven through whole granules.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use sh3_core::onchip::registers::{
    CHCR, DAR, DMAOR, DMATCR, EXPEVT, INTEVT, SAR, TCNT, TCOR, TCR, TRA, TSTR,
};
use sh3_core::state::{SR_BL, SR_MD, SR_RB};
use sh3_core::{lock_timebase, CoreConfig, Cpu, InterruptSource, RamHandler, Timebase};
use thiserror as _;

const RAM_BASE: u32 = 0x0C00_0000;
const RAM_SIZE: u32 = 0x1_0000;
const IPRA: u32 = 0xFFFF_FEE2;

fn cpu_with(config: CoreConfig, words: &[u16]) -> Cpu {
    let mut cpu = Cpu::new(config).expect("cpu");
    cpu.register_handler(
        RAM_BASE,
        RAM_SIZE,
        Box::new(RamHandler::new(RAM_SIZE as usize).expect("ram")),
    )
    .expect("map ram");
    load(&mut cpu, RAM_BASE, words);
    cpu.state_mut().pc = RAM_BASE;
    cpu
}

fn stepping(words: &[u16]) -> Cpu {
    cpu_with(
        CoreConfig {
            max_granule_cycles: 1,
            ..CoreConfig::default()
        },
        words,
    )
}

fn load(cpu: &mut Cpu, at: u32, words: &[u16]) {
    for (i, word) in words.iter().enumerate() {
        cpu.write16(at + 2 * i as u32, *word).expect("load");
    }
}

/// Privileged, unblocked, IMASK 0, with the controller told about it.
fn unblock(cpu: &mut Cpu) {
    cpu.state_mut().set_sr(SR_MD);
    let shared = cpu.timebase();
    let mut guard = lock_timebase(&shared).expect("lock");
    let Timebase { scheduler, intc } = &mut *guard;
    intc.recompute_imask(cpu.state().sr(), scheduler);
}

#[test]
fn delay_slot_runs_before_branch_target() {
    let mut cpu = stepping(&[
        0xE105, // mov #5,r1
        0xA003, // bra +3
        0x7101, // add #1,r1 (slot)
        0xE163, // mov #99,r1 (skipped)
        0x0009, 0x0009, //
        0x4108, // shll2 r1
        0xAFFE, // bra .
        0x0009,
    ]);

    let first = cpu.run_granule().expect("granule");
    assert_eq!(first.instructions, 3);
    assert_eq!(cpu.state().gpr(1), 6);
    assert_eq!(cpu.state().pc, RAM_BASE + 12);

    cpu.run_granule().expect("granule");
    assert_eq!(cpu.state().gpr(1), 24);
    assert_eq!(cpu.state().pc, RAM_BASE + 14);
}

#[test]
fn ldc_to_sr_switches_register_bank() {
    let mut cpu = cpu_with(
        CoreConfig::default(),
        &[
            0xE011, // mov #0x11,r0
            0x480E, // ldc r8,sr
            0xE022, // mov #0x22,r0
            0xAFFE, // bra .
            0x0009,
        ],
    );
    cpu.state_mut().set_sr(SR_MD);
    cpu.state_mut().set_gpr(8, SR_MD | SR_RB);

    cpu.run_granule().expect("granule");
    assert_eq!(cpu.state().sr().bits() & SR_RB, SR_RB);
    assert_eq!(cpu.state().gpr(0), 0x22);
    assert_eq!(cpu.state().banked(0), 0x11);
}

#[test]
fn trapa_enters_handler_and_rte_returns_through_slot() {
    let vbr = RAM_BASE + 0x1000;
    let mut cpu = stepping(&[
        0xC320, // trapa #0x20
        0xAFFE, // bra .
        0x0009,
    ]);
    load(&mut cpu, vbr + 0x100, &[0x002B, 0xE401]); // rte ; mov #1,r4
    cpu.state_mut().vbr = vbr;
    cpu.state_mut().set_sr(SR_MD);

    cpu.run_granule().expect("trap");
    assert_eq!(cpu.state().pc, vbr + 0x100);
    assert_eq!(cpu.state().spc, RAM_BASE + 2);
    assert_eq!(cpu.state().ssr, SR_MD);
    let sr = cpu.state().sr().bits();
    assert_eq!(sr & (SR_MD | SR_RB | SR_BL), SR_MD | SR_RB | SR_BL);
    assert_eq!(cpu.read32(TRA).expect("tra"), 0x20 << 2);
    assert_eq!(cpu.read32(EXPEVT).expect("expevt"), 0x160);

    cpu.run_granule().expect("return");
    assert_eq!(cpu.state().pc, RAM_BASE + 2);
    assert_eq!(cpu.state().sr().bits() & (SR_RB | SR_BL), 0);
    assert_eq!(cpu.state().gpr(4), 1);
}

#[test]
fn timer_underflow_is_serviced_at_a_granule_boundary() {
    let vbr = RAM_BASE + 0x1000;
    let mut cpu = cpu_with(CoreConfig::default(), &[0xAFFE, 0x0009]);
    cpu.state_mut().vbr = vbr;
    unblock(&mut cpu);

    cpu.write16(IPRA, 0xF000).expect("ipra");
    cpu.write32(TCOR[0], 99).expect("tcor");
    cpu.write32(TCNT[0], 99).expect("tcnt");
    cpu.write16(TCR[0], 0x0020).expect("tcr");
    cpu.write8(TSTR, 1).expect("tstr");

    let mut serviced = None;
    for _ in 0..64 {
        let outcome = cpu.run_granule().expect("granule");
        if outcome.serviced.is_some() {
            serviced = Some(outcome);
            break;
        }
    }
    let outcome = serviced.expect("timer interrupt");
    assert_eq!(outcome.serviced, Some(InterruptSource::Tuni0));
    // 100 ticks at 16 processor cycles each.
    assert!(outcome.now >= 1600);
    assert_eq!(cpu.read32(INTEVT).expect("intevt"), 0x400);
    assert_eq!(cpu.state().pc, vbr + 0x600);
    assert_ne!(cpu.read16(TCR[0]).expect("tcr") & 0x0100, 0);
}

#[test]
fn dma_copies_on_request_and_completes_later() {
    let src = RAM_BASE + 0x100;
    let dst = RAM_BASE + 0x200;
    let mut cpu = cpu_with(CoreConfig::default(), &[0xAFFE, 0x0009]);
    for i in 0..8u32 {
        cpu.write8(src + i, 0xA0 | i as u8).expect("fill");
    }

    cpu.write32(SAR[0], src).expect("sar");
    cpu.write32(DAR[0], dst).expect("dar");
    cpu.write32(DMATCR[0], 8).expect("dmatcr");
    cpu.write16(DMAOR, 1).expect("dmaor");
    cpu.write32(CHCR[0], 0x5001).expect("chcr");

    for i in 0..8u32 {
        assert_eq!(cpu.read8(dst + i).expect("copy"), 0xA0 | i as u8);
    }
    assert_eq!(cpu.read32(CHCR[0]).expect("chcr") & 2, 0);

    for _ in 0..16 {
        if cpu.read32(CHCR[0]).expect("chcr") & 2 != 0 {
            break;
        }
        cpu.run_granule().expect("granule");
    }
    assert_eq!(cpu.read32(CHCR[0]).expect("chcr") & 3, 2);
    assert_eq!(cpu.read32(SAR[0]).expect("sar"), src + 8);
    assert_eq!(cpu.read32(DAR[0]).expect("dar"), dst + 8);
    assert_eq!(cpu.read32(DMATCR[0]).expect("dmatcr"), 0);
}

#[rstest]
#[case::bt_taken(0x8901, true, 6)]
#[case::bt_not_taken(0x8901, false, 2)]
#[case::bf_taken(0x8B01, false, 6)]
#[case::bf_not_taken(0x8B01, true, 2)]
fn conditional_branch_has_no_slot(#[case] opcode: u16, #[case] t: bool, #[case] target: u32) {
    let mut cpu = stepping(&[opcode, 0x0009, 0x0009, 0x0009]);
    cpu.state_mut().set_t(t);
    cpu.run_granule().expect("granule");
    assert_eq!(cpu.state().pc, RAM_BASE + target);
    assert_eq!(cpu.diagnostics().instructions, 1);
}

#[test]
fn unmapped_reads_float_high_and_are_counted() {
    let mut cpu = stepping(&[0x0009]);
    assert_eq!(cpu.read16(0x0800_0000).expect("read"), 0xFFFF);
    assert_eq!(cpu.read32(0x0800_0100).expect("read"), 0xFFFF_FFFF);
    cpu.write8(0x0800_0000, 0).expect("write");
    let bus = cpu.bus_diagnostics();
    assert_eq!(bus.unmapped_reads, 2);
    assert_eq!(bus.unmapped_writes, 1);
    assert_eq!(bus.unmapped_total(), 3);
}

#[test]
fn unknown_opcode_costs_one_cycle_and_is_counted() {
    let mut cpu = stepping(&[
        0xFFFD, // FPU page, not on this core
        0xAFFE, // bra .
        0x0009,
    ]);
    let outcome = cpu.run_granule().expect("granule");
    // 1 for the unknown word, 2 for bra, 1 for the nop in its slot.
    assert_eq!(outcome.cycles, 4);
    assert_eq!(outcome.instructions, 3);
    assert_eq!(cpu.state().pc, RAM_BASE + 2);
    let diag = cpu.diagnostics();
    assert_eq!(diag.unknown_opcodes, 1);
    assert_eq!(diag.last_unknown_opcode, Some((RAM_BASE, 0xFFFD)));
}

#[test]
fn branch_in_delay_slot_is_counted_and_its_slot_skipped() {
    let mut cpu = stepping(&[
        0xA001, // bra +1
        0xA001, // bra +1 (slot)
        0x0009, 0x0009, //
        0xAFFE, // bra .
        0x0009,
    ]);
    let outcome = cpu.run_granule().expect("granule");
    assert_eq!(outcome.instructions, 2);
    assert_eq!(outcome.cycles, 4);
    assert_eq!(cpu.state().pc, RAM_BASE + 6);
    assert_eq!(cpu.diagnostics().illegal_slot_instructions, 1);
}

#[test]
fn chained_slot_branches_do_not_nest() {
    // bra +0 throughout RAM: every slot holds another branch.
    let words = vec![0xA000u16; (RAM_SIZE / 2) as usize];
    let mut cpu = stepping(&words);
    for _ in 0..10 {
        let outcome = cpu.run_granule().expect("granule");
        assert_eq!(outcome.instructions, 2);
    }
    assert_eq!(cpu.state().pc, RAM_BASE + 40);
    assert_eq!(cpu.diagnostics().illegal_slot_instructions, 10);
    assert_eq!(cpu.diagnostics().instructions, 20);
}

#[test]
fn privileged_instruction_in_user_mode_is_counted() {
    let mut cpu = stepping(&[
        0x400E, // ldc r0,sr
        0xAFFE, // bra .
        0x0009,
    ]);
    cpu.state_mut().set_sr(0);
    cpu.state_mut().set_gpr(0, 0);
    cpu.run_granule().expect("granule");
    assert_eq!(cpu.diagnostics().privilege_violations, 1);
    assert_eq!(cpu.state().sr().bits() & SR_MD, 0);
}
