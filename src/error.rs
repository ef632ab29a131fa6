/*!
error.rs - the crate's single fail-fast error taxonomy.

The original emulator core calls a variadic `error()` that prints a
contextual message and `exit(1)`s immediately (see `original_source/
emu6502/emmain.c`). This crate keeps that escalation policy (§7 of
SPEC_FULL.md: any condition the interpreter cannot faithfully model is
fatal) but represents it as a typed `Result` error instead of terminating
deep inside the executor, so callers (notably the CLI binary and tests)
decide how to report it.

Soft errors — the KERNAL `STATUS` byte codes 1-9 — are NOT part of this
enum. They are surfaced by setting the carry flag and writing a code to
RAM, exactly as real KERNAL routines do; see `kernal::set_status`.
*/

use thiserror::Error;

use crate::hooks::HookKind;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("illegal instruction: opcode {opcode:02X} (PC={pc:04X}, IC={ic:09X})")]
    IllegalOpcode { opcode: u8, pc: u16, ic: u64 },

    #[error("unexpected instruction in addressing-mode family: {mnemonic} (PC={pc:04X}, IC={ic:09X})")]
    UnexpectedInstruction {
        mnemonic: &'static str,
        pc: u16,
        ic: u64,
    },

    #[error("interrupt-related opcode not supported: {mnemonic} (PC={pc:04X})")]
    UnsupportedInterrupt { mnemonic: &'static str, pc: u16 },

    #[error("stack overflow: push with S=0 (PC={pc:04X})")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: pull with S=0xFF (PC={pc:04X})")]
    StackUnderflow { pc: u16 },

    #[error("unsupported KERNAL entry point: ${addr:04X}")]
    UnsupportedRomCall { addr: u16 },

    #[error("invalid device number {device} for {operation}")]
    InvalidDevice {
        device: u8,
        operation: &'static str,
    },

    #[error("invalid disk command: {text:?}")]
    InvalidDiskCommand { text: String },

    #[error("invalid disk command arguments for {command}: {text:?}")]
    InvalidDiskArgs { command: &'static str, text: String },

    #[error("disk command {command} not implemented")]
    UnimplementedDiskCommand { command: &'static str },

    #[error("disk drive command buffer is full (capacity {capacity})")]
    CommandBufferFull { capacity: usize },

    #[error("track/sector out of range: track={track} sector={sector}")]
    InvalidTrackSector { track: u8, sector: u8 },

    #[error("channel {channel} is not bound to a buffer")]
    UnboundChannel { channel: u8 },

    #[error("no disk is mounted")]
    NoDiskMounted,

    #[error("{what} wrong size: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("execution hooks lookup table is not ready, call prepare() first")]
    HooksNotPrepared,

    #[error("duplicate execution hook: pc={pc:04X} kind={kind:?} post={post} id={id}")]
    DuplicateHook {
        pc: u16,
        kind: HookKind,
        post: bool,
        id: i32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

pub type EmuResult<T> = Result<T, EmuError>;
