/*!
cpu/execute.rs - instruction execution, grouped the way the original
interpreter groups them: immediate-operand instructions, addressed
(memory-operand) instructions, and implied (register-only) instructions.
Addressed-mode arithmetic and load instructions fall through to the
immediate-family handler once the operand byte has been loaded from
memory, exactly as the original's `interpAddr` delegates to `interpImm`.

Three corrections versus `original_source/emu6502/emmain.c` (documented
as known bugs in the distilled spec, §9):
  - `BIT` performs real 6502 semantics (AND test against A, N/V from the
    memory operand) instead of the original's accidental "store P to
    memory".
  - `DEC` subtracts 1; the original computed `RAM[addr] + 1`, identical
    to `INC`.
  - `TSX` sets N/Z from the transferred value of X, not from A.
*/

use crate::bits::{FLAG_C, FLAG_N, FLAG_V, FLAG_Z};
use crate::cpu::addressing::resolve;
use crate::cpu::decode::{decode, AddrMode, Mnemonic};
use crate::cpu::regs::Regs;
use crate::error::{EmuError, EmuResult};
use crate::memory::Memory;

/// Addresses at or above this threshold are KERNAL ROM entry points.
/// Control transfers here are trampolined rather than executed as ROM
/// bytes (§4.4).
pub const ROM_CALL_THRESHOLD: u16 = 0xF000;

pub type RomCall<'a> = dyn FnMut(&mut Regs, &mut Memory, u16) -> EmuResult<()> + 'a;

/// Execute the single instruction at `regs.pc`, advancing `pc` and `ic`.
/// `rom_call` is invoked whenever control transfers (via `JMP`/`JSR`) to an
/// address `>= ROM_CALL_THRESHOLD`; after it returns, execution resumes as
/// if the routine ended in `RTS`.
pub fn step(regs: &mut Regs, mem: &mut Memory, rom_call: &mut RomCall) -> EmuResult<()> {
    let pc_at_fetch = regs.pc;
    let opcode = mem.load(regs.pc);
    regs.pc = regs.pc.wrapping_add(1);

    let (mnemonic, mode) = decode(opcode).ok_or(EmuError::IllegalOpcode {
        opcode,
        pc: pc_at_fetch,
        ic: regs.ic,
    })?;

    match mode {
        AddrMode::Implied => exec_implied(regs, mem, mnemonic)?,
        AddrMode::Immediate => {
            let operand = mem.load(regs.pc);
            regs.pc = regs.pc.wrapping_add(1);
            exec_immediate(regs, mnemonic, operand, pc_at_fetch)?;
        }
        AddrMode::Relative => {
            let offset = mem.load(regs.pc);
            regs.pc = regs.pc.wrapping_add(1);
            let target = resolve(mode, offset as u16, regs, mem);
            exec_addressed(regs, mem, mnemonic, target, pc_at_fetch, rom_call)?;
        }
        _ => {
            let operand_len = mode.operand_len();
            let raw = if operand_len == 1 {
                let b = mem.load(regs.pc);
                regs.pc = regs.pc.wrapping_add(1);
                b as u16
            } else {
                let lo = mem.load(regs.pc);
                let hi = mem.load(regs.pc.wrapping_add(1));
                regs.pc = regs.pc.wrapping_add(2);
                crate::bits::word(lo, hi)
            };
            let addr = resolve(mode, raw, regs, mem);
            exec_addressed(regs, mem, mnemonic, addr, pc_at_fetch, rom_call)?;
        }
    }

    regs.ic = regs.ic.wrapping_add(1);
    Ok(())
}

/// Shared ADC/SBC/CMP/CPX/CPY implementation. Carry is treated as a +1
/// correction so that one's-complement subtraction falls out of the same
/// addition path the original uses. Compare instructions (`is_cmp`) set
/// N/Z/C but never write back to a register or touch V.
fn add(regs: &mut Regs, reg_val: u8, mem_val: u8, is_cmp: bool) {
    let mut diff = reg_val as u16 + mem_val as u16;
    if is_cmp || regs.flag(FLAG_C) {
        diff += 1;
    }
    let b = diff as u8;
    regs.update_nz(b);
    regs.set_flag(FLAG_C, diff & 0x100 != 0);
    if !is_cmp {
        let overflow = (reg_val ^ b) & (mem_val ^ b) & 0x80 != 0;
        regs.set_flag(FLAG_V, overflow);
        regs.a = b;
    }
}

fn bitwise_asl(regs: &mut Regs, value: u8) -> u8 {
    regs.set_flag(FLAG_C, value & 0x80 != 0);
    let result = value << 1;
    regs.update_nz(result);
    result
}

fn bitwise_lsr(regs: &mut Regs, value: u8) -> u8 {
    regs.set_flag(FLAG_C, value & 1 != 0);
    let result = value >> 1;
    regs.update_nz(result);
    result
}

fn bitwise_rol(regs: &mut Regs, value: u8) -> u8 {
    let carry_in = regs.flag(FLAG_C);
    regs.set_flag(FLAG_C, value & 0x80 != 0);
    let mut result = value << 1;
    if carry_in {
        result |= 1;
    }
    regs.update_nz(result);
    result
}

fn bitwise_ror(regs: &mut Regs, value: u8) -> u8 {
    let carry_in = regs.flag(FLAG_C);
    regs.set_flag(FLAG_C, value & 1 != 0);
    let mut result = value >> 1;
    if carry_in {
        result |= 0x80;
    }
    regs.update_nz(result);
    result
}

fn exec_immediate(regs: &mut Regs, inst: Mnemonic, operand: u8, pc: u16) -> EmuResult<()> {
    use Mnemonic::*;
    match inst {
        Lda => {
            regs.a = operand;
            regs.update_nz(regs.a);
        }
        Ldx => {
            regs.x = operand;
            regs.update_nz(regs.x);
        }
        Ldy => {
            regs.y = operand;
            regs.update_nz(regs.y);
        }
        Adc => add(regs, regs.a, operand, false),
        Sbc => add(regs, regs.a, !operand, false),
        Cmp => add(regs, regs.a, !operand, true),
        Cpy => add(regs, regs.y, !operand, true),
        Cpx => add(regs, regs.x, !operand, true),
        Ora => {
            regs.a |= operand;
            regs.update_nz(regs.a);
        }
        And => {
            regs.a &= operand;
            regs.update_nz(regs.a);
        }
        Eor => {
            regs.a ^= operand;
            regs.update_nz(regs.a);
        }
        other => {
            return Err(EmuError::UnexpectedInstruction {
                mnemonic: other.name(),
                pc,
                ic: regs.ic,
            })
        }
    }
    Ok(())
}

fn jump(
    regs: &mut Regs,
    mem: &mut Memory,
    addr: u16,
    far: bool,
    rom_call: &mut RomCall,
) -> EmuResult<()> {
    if far && addr >= ROM_CALL_THRESHOLD {
        rom_call(regs, mem, addr)?;
        // The KERNAL routine's real implementation ends in RTS; the
        // trampoline never executes ROM bytes, so we perform the return
        // ourselves.
        let mut return_addr = regs.pull_word(mem)?;
        return_addr = return_addr.wrapping_add(1);
        regs.pc = return_addr;
    } else {
        regs.pc = addr;
    }
    Ok(())
}

fn exec_addressed(
    regs: &mut Regs,
    mem: &mut Memory,
    inst: Mnemonic,
    addr: u16,
    pc: u16,
    rom_call: &mut RomCall,
) -> EmuResult<()> {
    use Mnemonic::*;
    match inst {
        Jsr => {
            let push_addr = regs.pc.wrapping_sub(1);
            regs.push_word(mem, push_addr)?;
            jump(regs, mem, addr, true, rom_call)?;
        }
        Jmp => jump(regs, mem, addr, true, rom_call)?,

        Bpl => branch_if(regs, mem, addr, !regs.flag(FLAG_N), rom_call)?,
        Bmi => branch_if(regs, mem, addr, regs.flag(FLAG_N), rom_call)?,
        Bvc => branch_if(regs, mem, addr, !regs.flag(FLAG_V), rom_call)?,
        Bvs => branch_if(regs, mem, addr, regs.flag(FLAG_V), rom_call)?,
        Bcc => branch_if(regs, mem, addr, !regs.flag(FLAG_C), rom_call)?,
        Bcs => branch_if(regs, mem, addr, regs.flag(FLAG_C), rom_call)?,
        Bne => branch_if(regs, mem, addr, !regs.flag(FLAG_Z), rom_call)?,
        Beq => branch_if(regs, mem, addr, regs.flag(FLAG_Z), rom_call)?,

        Lda => {
            regs.a = mem.load(addr);
            regs.update_nz(regs.a);
        }
        Ldx => {
            regs.x = mem.load(addr);
            regs.update_nz(regs.x);
        }
        Ldy => {
            regs.y = mem.load(addr);
            regs.update_nz(regs.y);
        }

        Sta => mem.store(addr, regs.a),
        Stx => mem.store(addr, regs.x),
        Sty => mem.store(addr, regs.y),
        Bit => {
            let value = mem.load(addr);
            regs.set_flag(FLAG_Z, regs.a & value == 0);
            regs.set_flag(FLAG_N, value & 0x80 != 0);
            regs.set_flag(FLAG_V, value & 0x40 != 0);
        }

        Inc => {
            let v = mem.load(addr).wrapping_add(1);
            mem.store(addr, v);
            regs.update_nz(v);
        }
        Dec => {
            let v = mem.load(addr).wrapping_sub(1);
            mem.store(addr, v);
            regs.update_nz(v);
        }

        Asl => {
            let v = bitwise_asl(regs, mem.load(addr));
            mem.store(addr, v);
        }
        Lsr => {
            let v = bitwise_lsr(regs, mem.load(addr));
            mem.store(addr, v);
        }
        Rol => {
            let v = bitwise_rol(regs, mem.load(addr));
            mem.store(addr, v);
        }
        Ror => {
            let v = bitwise_ror(regs, mem.load(addr));
            mem.store(addr, v);
        }

        // Arithmetic/bitwise/load instructions applied to memory operands
        // fall through to the immediate-family handler with the loaded
        // byte, same as the original `interpAddr`'s default case.
        other => exec_immediate(regs, other, mem.load(addr), pc)?,
    }
    Ok(())
}

fn branch_if(
    regs: &mut Regs,
    mem: &mut Memory,
    addr: u16,
    condition: bool,
    rom_call: &mut RomCall,
) -> EmuResult<()> {
    if condition {
        jump(regs, mem, addr, false, rom_call)?;
    }
    Ok(())
}

fn exec_implied(regs: &mut Regs, mem: &mut Memory, inst: Mnemonic) -> EmuResult<()> {
    use Mnemonic::*;
    match inst {
        Rts => {
            let mut return_addr = regs.pull_word(mem)?;
            return_addr = return_addr.wrapping_add(1);
            regs.pc = return_addr;
        }

        Php => regs.push(mem, regs.p)?,
        Plp => regs.p = regs.pull(mem)?,
        Pha => regs.push(mem, regs.a)?,
        Pla => {
            regs.a = regs.pull(mem)?;
            regs.update_nz(regs.a);
        }

        Clc => regs.set_flag(FLAG_C, false),
        Sec => regs.set_flag(FLAG_C, true),
        Clv => regs.set_flag(FLAG_V, false),
        Cld => regs.set_flag(crate::bits::FLAG_D, false),
        Sed => regs.set_flag(crate::bits::FLAG_D, true),
        Cli => regs.set_flag(crate::bits::FLAG_I, false),
        Sei => regs.set_flag(crate::bits::FLAG_I, true),

        Inx => {
            regs.x = regs.x.wrapping_add(1);
            regs.update_nz(regs.x);
        }
        Dex => {
            regs.x = regs.x.wrapping_sub(1);
            regs.update_nz(regs.x);
        }
        Iny => {
            regs.y = regs.y.wrapping_add(1);
            regs.update_nz(regs.y);
        }
        Dey => {
            regs.y = regs.y.wrapping_sub(1);
            regs.update_nz(regs.y);
        }

        Tya => {
            regs.a = regs.y;
            regs.update_nz(regs.a);
        }
        Tay => {
            regs.y = regs.a;
            regs.update_nz(regs.y);
        }
        Txa => {
            regs.a = regs.x;
            regs.update_nz(regs.a);
        }
        Tax => {
            regs.x = regs.a;
            regs.update_nz(regs.x);
        }
        Txs => regs.s = regs.x, // does not affect N/Z
        Tsx => {
            regs.x = regs.s;
            regs.update_nz(regs.x);
        }

        Asl => regs.a = bitwise_asl(regs, regs.a),
        Lsr => regs.a = bitwise_lsr(regs, regs.a),
        Rol => regs.a = bitwise_rol(regs, regs.a),
        Ror => regs.a = bitwise_ror(regs, regs.a),

        Nop => {}

        Brk | Rti => {
            return Err(EmuError::UnsupportedInterrupt {
                mnemonic: inst.name(),
                pc: regs.pc,
            })
        }

        other => {
            return Err(EmuError::UnexpectedInstruction {
                mnemonic: other.name(),
                pc: regs.pc,
                ic: regs.ic,
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE, RomSet};
    use proptest::prelude::*;

    fn machine() -> (Regs, Memory) {
        let mem = Memory::new(
            RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; KERNAL_SIZE]).unwrap(),
        );
        (Regs::new(), mem)
    }

    fn noop_rom_call() -> impl FnMut(&mut Regs, &mut Memory, u16) -> EmuResult<()> {
        |_, _, addr| panic!("unexpected ROM call to {addr:04X}")
    }

    proptest::proptest! {
        #[test]
        fn adc_matches_binary_mode_invariant(a in 0u16..256, m in 0u16..256, c in 0u16..2) {
            let (mut regs, _mem) = machine();
            regs.a = a as u8;
            regs.set_flag(FLAG_C, c == 1);
            exec_immediate(&mut regs, Mnemonic::Adc, m as u8, 0).unwrap();
            let expected_sum = a + m + c;
            prop_assert_eq!(regs.a, (expected_sum % 256) as u8);
            prop_assert_eq!(regs.flag(FLAG_C), expected_sum >= 256);
            let result = regs.a;
            let expected_v = (a as u8 ^ result) & (m as u8 ^ result) & 0x80 != 0;
            prop_assert_eq!(regs.flag(FLAG_V), expected_v);
        }

        #[test]
        fn sbc_matches_binary_mode_invariant(a in 0u16..256, m in 0u16..256, c in 0u16..2) {
            let (mut regs, _mem) = machine();
            regs.a = a as u8;
            regs.set_flag(FLAG_C, c == 1);
            exec_immediate(&mut regs, Mnemonic::Sbc, m as u8, 0).unwrap();
            let m_prime = 255 - m;
            let expected_sum = a + m_prime + c;
            prop_assert_eq!(regs.a, (expected_sum % 256) as u8);
            prop_assert_eq!(regs.flag(FLAG_C), expected_sum >= 256);
            let result = regs.a;
            let expected_v = (a as u8 ^ result) & (m_prime as u8 ^ result) & 0x80 != 0;
            prop_assert_eq!(regs.flag(FLAG_V), expected_v);
        }
    }

    #[test]
    fn adc_sets_overflow_on_signed_wrap() {
        let (mut regs, _mem) = machine();
        regs.a = 0x7F;
        exec_immediate(&mut regs, Mnemonic::Adc, 0x01, 0).unwrap();
        assert_eq!(regs.a, 0x80);
        assert!(regs.flag(FLAG_V));
        assert!(regs.flag(FLAG_N));
    }

    #[test]
    fn sbc_without_carry_borrows() {
        let (mut regs, _mem) = machine();
        regs.a = 0x00;
        regs.set_flag(FLAG_C, false);
        exec_immediate(&mut regs, Mnemonic::Sbc, 0x01, 0).unwrap();
        assert_eq!(regs.a, 0xFE);
        assert!(!regs.flag(FLAG_C));
    }

    #[test]
    fn cmp_does_not_touch_accumulator() {
        let (mut regs, _mem) = machine();
        regs.a = 0x10;
        exec_immediate(&mut regs, Mnemonic::Cmp, 0x10, 0).unwrap();
        assert_eq!(regs.a, 0x10);
        assert!(regs.flag(FLAG_Z));
        assert!(regs.flag(FLAG_C));
    }

    #[test]
    fn bit_sets_flags_without_mutating_memory() {
        let (mut regs, mut mem) = machine();
        regs.a = 0x0F;
        mem.store(0x20, 0xC0);
        exec_addressed(&mut regs, &mut mem, Mnemonic::Bit, 0x20, 0, &mut noop_rom_call()).unwrap();
        assert!(regs.flag(FLAG_Z));
        assert!(regs.flag(FLAG_N));
        assert!(regs.flag(FLAG_V));
        assert_eq!(mem.load(0x20), 0xC0);
    }

    #[test]
    fn dec_subtracts_one() {
        let (mut regs, mut mem) = machine();
        mem.store(0x20, 0x05);
        exec_addressed(&mut regs, &mut mem, Mnemonic::Dec, 0x20, 0, &mut noop_rom_call()).unwrap();
        assert_eq!(mem.load(0x20), 0x04);
    }

    #[test]
    fn tsx_sets_flags_from_x_not_a() {
        let (mut regs, _mem) = machine();
        regs.a = 0x80;
        regs.s = 0x00;
        exec_implied(&mut regs, &mut Memory::new(
            RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; KERNAL_SIZE]).unwrap(),
        ), Mnemonic::Tsx).unwrap();
        assert_eq!(regs.x, 0x00);
        assert!(regs.flag(FLAG_Z));
        assert!(!regs.flag(FLAG_N));
    }

    #[test]
    fn plp_restores_flags_verbatim() {
        let (mut regs, mut mem) = machine();
        regs.push(&mut mem, 0x00).unwrap();
        exec_implied(&mut regs, &mut mem, Mnemonic::Plp).unwrap();
        assert_eq!(regs.p, 0x00);
    }

    #[test]
    fn jsr_then_rts_round_trips_pc() {
        let (mut regs, mut mem) = machine();
        regs.pc = 0x1003;
        exec_addressed(&mut regs, &mut mem, Mnemonic::Jsr, 0x2000, 0, &mut noop_rom_call()).unwrap();
        assert_eq!(regs.pc, 0x2000);
        exec_implied(&mut regs, &mut mem, Mnemonic::Rts).unwrap();
        assert_eq!(regs.pc, 0x1003);
    }

    #[test]
    fn jsr_to_rom_address_invokes_trampoline() {
        let (mut regs, mut mem) = machine();
        regs.pc = 0x1003;
        let mut called = false;
        {
            let mut rc = |_: &mut Regs, _: &mut Memory, addr: u16| -> EmuResult<()> {
                called = true;
                assert_eq!(addr, 0xFFD2);
                Ok(())
            };
            exec_addressed(&mut regs, &mut mem, Mnemonic::Jsr, 0xFFD2, 0, &mut rc).unwrap();
        }
        assert!(called);
        assert_eq!(regs.pc, 0x1003);
    }

    #[test]
    fn branch_taken_and_not_taken() {
        let (mut regs, mut mem) = machine();
        regs.pc = 0x1000;
        regs.set_flag(FLAG_Z, true);
        exec_addressed(&mut regs, &mut mem, Mnemonic::Beq, 0x2000, 0, &mut noop_rom_call()).unwrap();
        assert_eq!(regs.pc, 0x2000);

        regs.pc = 0x1000;
        regs.set_flag(FLAG_Z, false);
        exec_addressed(&mut regs, &mut mem, Mnemonic::Beq, 0x3000, 0, &mut noop_rom_call()).unwrap();
        assert_eq!(regs.pc, 0x1000);
    }

    #[test]
    fn illegal_opcode_is_rejected_by_step() {
        let (mut regs, mut mem) = machine();
        mem.store(0x1000, 0x02);
        regs.pc = 0x1000;
        let err = step(&mut regs, &mut mem, &mut noop_rom_call()).unwrap_err();
        assert!(matches!(err, EmuError::IllegalOpcode { opcode: 0x02, .. }));
    }

    #[test]
    fn shift_family_carries_correctly() {
        let (mut regs, _mem) = machine();
        regs.a = 0x81;
        let value = regs.a;
        regs.a = bitwise_asl(&mut regs, value);
        assert_eq!(regs.a, 0x02);
        assert!(regs.flag(FLAG_C));
    }
}
