/*!
drive/command.rs - DOS command channel parser (§4.5).

Ported from `parseDiskCmdName`/`parseDecimalArgs`/`parseBinaryArgs` in
`original_source/emu6502/emdisk.c`. Commands are PETSCII text sent over
the command channel (secondary address 15); some take decimal PETSCII
arguments (`B-P:2,0`), some take raw binary argument bytes (`M-W<lo><hi>`),
and a few take none at all.
*/

use crate::error::{EmuError, EmuResult};

pub const MAX_ARG_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiskCommand {
    BlockAllocate,
    BlockExecute,
    BlockFree,
    BlockRead,
    BlockWrite,
    BufferPointer,
    MemoryExecute,
    MemoryRead,
    MemoryWrite,
    U1,
    U2,
    U9,
    Uj,
    New,
    Copy,
    Rename,
    Scratch,
    Initialize,
    Validate,
    Position,
}

impl DiskCommand {
    pub fn name(self) -> &'static str {
        use DiskCommand::*;
        match self {
            BlockAllocate => "B-A",
            BlockExecute => "B-E",
            BlockFree => "B-F",
            BlockRead => "B-R",
            BlockWrite => "B-W",
            BufferPointer => "B-P",
            MemoryExecute => "M-E",
            MemoryRead => "M-R",
            MemoryWrite => "M-W",
            U1 => "U1",
            U2 => "U2",
            U9 => "U9",
            Uj => "UJ",
            New => "N",
            Copy => "C",
            Rename => "R",
            Scratch => "S",
            Initialize => "I",
            Validate => "V",
            Position => "P",
        }
    }
}

enum ArgShape {
    None,
    Decimal,
    Binary(usize),
    MemoryWrite,
    Unimplemented,
}

fn arg_shape(cmd: DiskCommand) -> ArgShape {
    use ArgShape::*;
    use DiskCommand::*;
    match cmd {
        New | Initialize | Validate | U9 | Uj => None,
        Copy | Rename | Scratch => Unimplemented,
        BlockRead | BlockWrite | BlockAllocate | BlockFree | BufferPointer | U1 | U2
        | BlockExecute => Decimal,
        Position => Binary(4),
        MemoryRead | MemoryExecute => Binary(2),
        DiskCommand::MemoryWrite => ArgShape::MemoryWrite,
    }
}

/// Parse the command name at the start of `text`, returning the command
/// and the byte offset where its arguments begin.
pub fn parse_name(text: &[u8]) -> EmuResult<(DiskCommand, usize)> {
    use DiskCommand::*;
    let fail = || EmuError::InvalidDiskCommand {
        text: String::from_utf8_lossy(text).into_owned(),
    };

    if text.is_empty() {
        return Err(fail());
    }

    let cmd = match text[0] {
        b'B' if text.get(1) == Some(&b'-') => match text.get(2) {
            Some(b'A') => BlockAllocate,
            Some(b'E') => BlockExecute,
            Some(b'F') => BlockFree,
            Some(b'R') => BlockRead,
            Some(b'W') => BlockWrite,
            Some(b'P') => BufferPointer,
            _ => return Err(fail()),
        },
        b'M' if text.get(1) == Some(&b'-') => match text.get(2) {
            Some(b'E') => MemoryExecute,
            Some(b'R') => MemoryRead,
            Some(b'W') => MemoryWrite,
            _ => return Err(fail()),
        },
        b'U' => match text.get(1) {
            Some(b'A') | Some(b'1') => U1,
            Some(b'B') | Some(b'2') => U2,
            Some(b'I') | Some(b'9') => return Ok((U9, 2)),
            Some(b'J') => return Ok((Uj, 2)),
            _ => return Err(fail()),
        },
        b'N' => New,
        b'C' => Copy,
        b'R' => Rename,
        b'S' => Scratch,
        b'I' => Initialize,
        b'V' => Validate,
        b'P' => Position,
        _ => return Err(fail()),
    };

    let name_len = match cmd {
        BlockAllocate | BlockExecute | BlockFree | BlockRead | BlockWrite | BufferPointer
        | MemoryExecute | MemoryRead | MemoryWrite => 3,
        U1 | U2 => 2,
        _ => 1,
    };

    // Single-letter commands may carry an optional drive number digit
    // ("N0", "I0") before the argument separator.
    let mut arg_start = name_len;
    if matches!(cmd, New | Copy | Rename | Scratch | Initialize | Validate | Position)
        && text.get(arg_start).is_some_and(|b| b.is_ascii_digit())
    {
        arg_start += 1;
    }

    Ok((cmd, arg_start))
}

/// Parse the arguments following the command name, per `cmd`'s expected
/// shape. Returns the parsed byte arguments.
pub fn parse_args(cmd: DiskCommand, args_text: &[u8]) -> EmuResult<Vec<u8>> {
    let fail = || EmuError::InvalidDiskArgs {
        command: cmd.name(),
        text: String::from_utf8_lossy(args_text).into_owned(),
    };

    match arg_shape(cmd) {
        ArgShape::None => Ok(Vec::new()),
        ArgShape::Unimplemented => Err(EmuError::UnimplementedDiskCommand { command: cmd.name() }),
        ArgShape::Decimal => parse_decimal_args(args_text).ok_or_else(fail),
        ArgShape::Binary(n) => {
            if args_text.len() != n {
                return Err(fail());
            }
            Ok(args_text.to_vec())
        }
        ArgShape::MemoryWrite => {
            if args_text.len() < 3 {
                return Err(fail());
            }
            let len = args_text[2] as usize;
            if args_text.len() - 3 != len {
                return Err(fail());
            }
            Ok(args_text.to_vec())
        }
    }
}

fn parse_decimal_args(text: &[u8]) -> Option<Vec<u8>> {
    let mut args = Vec::new();
    let mut p = 0usize;
    while p < text.len() {
        if text[p] != b':' && text[p] != b',' {
            return None;
        }
        if args.len() == MAX_ARG_COUNT {
            return None;
        }
        p += 1;
        while p < text.len() && text[p].is_ascii_whitespace() {
            p += 1;
        }
        let start = p;
        while p < text.len() && text[p].is_ascii_digit() {
            p += 1;
        }
        if p == start {
            return None;
        }
        let value: u32 = std::str::from_utf8(&text[start..p]).ok()?.parse().ok()?;
        if value > u8::MAX as u32 {
            return None;
        }
        args.push(value as u8);
    }
    Some(args)
}
