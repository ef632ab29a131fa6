/*!
cpu/decode.rs - the 256-entry opcode table: each byte maps to a mnemonic
and addressing mode, or is illegal.

Mirrors `instructionMnemonics`/`addrModeInfo`/`instructionSet` from
`original_source/emu6502/em.h` and `instruct.c`: only the 56 documented
NMOS 6502 mnemonics are legal, across the 13 addressing modes. Accumulator
mode (`ASL A`, `ROL A`, ...) is folded into `Implied`, matching the
original's `AM_A = AM_impl`.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny,
    Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror,
    Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
}

impl Mnemonic {
    pub fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Adc => "ADC", And => "AND", Asl => "ASL", Bcc => "BCC", Bcs => "BCS",
            Beq => "BEQ", Bit => "BIT", Bmi => "BMI", Bne => "BNE", Bpl => "BPL",
            Brk => "BRK", Bvc => "BVC", Bvs => "BVS", Clc => "CLC", Cld => "CLD",
            Cli => "CLI", Clv => "CLV", Cmp => "CMP", Cpx => "CPX", Cpy => "CPY",
            Dec => "DEC", Dex => "DEX", Dey => "DEY", Eor => "EOR", Inc => "INC",
            Inx => "INX", Iny => "INY", Jmp => "JMP", Jsr => "JSR", Lda => "LDA",
            Ldx => "LDX", Ldy => "LDY", Lsr => "LSR", Nop => "NOP", Ora => "ORA",
            Pha => "PHA", Php => "PHP", Pla => "PLA", Plp => "PLP", Rol => "ROL",
            Ror => "ROR", Rti => "RTI", Rts => "RTS", Sbc => "SBC", Sec => "SEC",
            Sed => "SED", Sei => "SEI", Sta => "STA", Stx => "STX", Sty => "STY",
            Tax => "TAX", Tay => "TAY", Tsx => "TSX", Txa => "TXA", Txs => "TXS",
            Tya => "TYA",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Immediate,
    Zpg,
    ZpgX,
    ZpgY,
    Relative,
    Absolute,
    AbsX,
    AbsY,
    Indirect,
    XInd,
    IndY,
}

/// Addressing-mode capability bits, mirroring `AMF_*` in `em.h`.
pub mod amf {
    pub const RESOLVE: u8 = 1 << 0;
    pub const IND: u8 = 1 << 2;
    pub const ABS: u8 = 1 << 3;
    pub const ZPG: u8 = 1 << 4;
    pub const X: u8 = 1 << 5;
    pub const Y: u8 = 1 << 6;
    pub const NO_INDEX: u8 = 1 << 7;
}

impl AddrMode {
    pub fn flags(self) -> u8 {
        use AddrMode::*;
        match self {
            Implied | Immediate => 0,
            Zpg => amf::RESOLVE | amf::ZPG | amf::NO_INDEX,
            ZpgX => amf::RESOLVE | amf::ZPG | amf::X,
            ZpgY => amf::RESOLVE | amf::ZPG | amf::Y,
            Relative => amf::RESOLVE | amf::NO_INDEX,
            Absolute => amf::RESOLVE | amf::ABS | amf::NO_INDEX,
            AbsX => amf::RESOLVE | amf::ABS | amf::X,
            AbsY => amf::RESOLVE | amf::ABS | amf::Y,
            Indirect => amf::RESOLVE | amf::IND | amf::NO_INDEX,
            XInd => amf::RESOLVE | amf::IND | amf::X,
            IndY => amf::RESOLVE | amf::IND | amf::Y,
        }
    }

    /// Number of operand bytes following the opcode byte.
    pub fn operand_len(self) -> u8 {
        use AddrMode::*;
        match self {
            Implied => 0,
            Immediate | Zpg | ZpgX | ZpgY | Relative | XInd | IndY => 1,
            Absolute | AbsX | AbsY | Indirect => 2,
        }
    }
}

/// Decode a single opcode byte. Returns `None` for opcodes with no legal
/// 6502 instruction assigned (§7: illegal opcode).
#[rustfmt::skip]
pub fn decode(opcode: u8) -> Option<(Mnemonic, AddrMode)> {
    use AddrMode::*;
    use Mnemonic::*;
    Some(match opcode {
        0x00 => (Brk, Implied),
        0x01 => (Ora, XInd),
        0x05 => (Ora, Zpg),
        0x06 => (Asl, Zpg),
        0x08 => (Php, Implied),
        0x09 => (Ora, Immediate),
        0x0A => (Asl, Implied),
        0x0D => (Ora, Absolute),
        0x0E => (Asl, Absolute),

        0x10 => (Bpl, Relative),
        0x11 => (Ora, IndY),
        0x15 => (Ora, ZpgX),
        0x16 => (Asl, ZpgX),
        0x18 => (Clc, Implied),
        0x19 => (Ora, AbsY),
        0x1D => (Ora, AbsX),
        0x1E => (Asl, AbsX),

        0x20 => (Jsr, Absolute),
        0x21 => (And, XInd),
        0x24 => (Bit, Zpg),
        0x25 => (And, Zpg),
        0x26 => (Rol, Zpg),
        0x28 => (Plp, Implied),
        0x29 => (And, Immediate),
        0x2A => (Rol, Implied),
        0x2C => (Bit, Absolute),
        0x2D => (And, Absolute),
        0x2E => (Rol, Absolute),

        0x30 => (Bmi, Relative),
        0x31 => (And, IndY),
        0x35 => (And, ZpgX),
        0x36 => (Rol, ZpgX),
        0x38 => (Sec, Implied),
        0x39 => (And, AbsY),
        0x3D => (And, AbsX),
        0x3E => (Rol, AbsX),

        0x40 => (Rti, Implied),
        0x41 => (Eor, XInd),
        0x45 => (Eor, Zpg),
        0x46 => (Lsr, Zpg),
        0x48 => (Pha, Implied),
        0x49 => (Eor, Immediate),
        0x4A => (Lsr, Implied),
        0x4C => (Jmp, Absolute),
        0x4D => (Eor, Absolute),
        0x4E => (Lsr, Absolute),

        0x50 => (Bvc, Relative),
        0x51 => (Eor, IndY),
        0x55 => (Eor, ZpgX),
        0x56 => (Lsr, ZpgX),
        0x58 => (Cli, Implied),
        0x59 => (Eor, AbsY),
        0x5D => (Eor, AbsX),
        0x5E => (Lsr, AbsX),

        0x60 => (Rts, Implied),
        0x61 => (Adc, XInd),
        0x65 => (Adc, Zpg),
        0x66 => (Ror, Zpg),
        0x68 => (Pla, Implied),
        0x69 => (Adc, Immediate),
        0x6A => (Ror, Implied),
        0x6C => (Jmp, Indirect),
        0x6D => (Adc, Absolute),
        0x6E => (Ror, Absolute),

        0x70 => (Bvs, Relative),
        0x71 => (Adc, IndY),
        0x75 => (Adc, ZpgX),
        0x76 => (Ror, ZpgX),
        0x78 => (Sei, Implied),
        0x79 => (Adc, AbsY),
        0x7D => (Adc, AbsX),
        0x7E => (Ror, AbsX),

        0x81 => (Sta, XInd),
        0x84 => (Sty, Zpg),
        0x85 => (Sta, Zpg),
        0x86 => (Stx, Zpg),
        0x88 => (Dey, Implied),
        0x8A => (Txa, Implied),
        0x8C => (Sty, Absolute),
        0x8D => (Sta, Absolute),
        0x8E => (Stx, Absolute),

        0x90 => (Bcc, Relative),
        0x91 => (Sta, IndY),
        0x94 => (Sty, ZpgX),
        0x95 => (Sta, ZpgX),
        0x96 => (Stx, ZpgY),
        0x98 => (Tya, Implied),
        0x99 => (Sta, AbsY),
        0x9A => (Txs, Implied),
        0x9D => (Sta, AbsX),

        0xA0 => (Ldy, Immediate),
        0xA1 => (Lda, XInd),
        0xA2 => (Ldx, Immediate),
        0xA4 => (Ldy, Zpg),
        0xA5 => (Lda, Zpg),
        0xA6 => (Ldx, Zpg),
        0xA8 => (Tay, Implied),
        0xA9 => (Lda, Immediate),
        0xAA => (Tax, Implied),
        0xAC => (Ldy, Absolute),
        0xAD => (Lda, Absolute),
        0xAE => (Ldx, Absolute),

        0xB0 => (Bcs, Relative),
        0xB1 => (Lda, IndY),
        0xB4 => (Ldy, ZpgX),
        0xB5 => (Lda, ZpgX),
        0xB6 => (Ldx, ZpgY),
        0xB8 => (Clv, Implied),
        0xB9 => (Lda, AbsY),
        0xBA => (Tsx, Implied),
        0xBC => (Ldy, AbsX),
        0xBD => (Lda, AbsX),
        0xBE => (Ldx, AbsY),

        0xC0 => (Cpy, Immediate),
        0xC1 => (Cmp, XInd),
        0xC4 => (Cpy, Zpg),
        0xC5 => (Cmp, Zpg),
        0xC6 => (Dec, Zpg),
        0xC8 => (Iny, Implied),
        0xC9 => (Cmp, Immediate),
        0xCA => (Dex, Implied),
        0xCC => (Cpy, Absolute),
        0xCD => (Cmp, Absolute),
        0xCE => (Dec, Absolute),

        0xD0 => (Bne, Relative),
        0xD1 => (Cmp, IndY),
        0xD5 => (Cmp, ZpgX),
        0xD6 => (Dec, ZpgX),
        0xD8 => (Cld, Implied),
        0xD9 => (Cmp, AbsY),
        0xDD => (Cmp, AbsX),
        0xDE => (Dec, AbsX),

        0xE0 => (Cpx, Immediate),
        0xE1 => (Sbc, XInd),
        0xE4 => (Cpx, Zpg),
        0xE5 => (Sbc, Zpg),
        0xE6 => (Inc, Zpg),
        0xE8 => (Inx, Implied),
        0xE9 => (Sbc, Immediate),
        0xEA => (Nop, Implied),
        0xEC => (Cpx, Absolute),
        0xED => (Sbc, Absolute),
        0xEE => (Inc, Absolute),

        0xF0 => (Beq, Relative),
        0xF1 => (Sbc, IndY),
        0xF5 => (Sbc, ZpgX),
        0xF6 => (Inc, ZpgX),
        0xF8 => (Sed, Implied),
        0xF9 => (Sbc, AbsY),
        0xFD => (Sbc, AbsX),
        0xFE => (Inc, AbsX),

        _ => return None,
    })
}
