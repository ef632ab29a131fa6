/*!
machine.rs - the aggregate that ties memory, registers, the disk drive,
the KERNAL trampoline, and the hook manager together, plus the top-level
fetch-decode-execute loop (§3, §5).
*/

use std::io::Write;

use crate::cpu::decode::decode;
use crate::cpu::{self, Regs};
use crate::drive::Drive;
use crate::error::EmuResult;
use crate::hooks::{Hook, HookKind, HookTable};
use crate::kernal::Kernal;
use crate::memory::Memory;
use crate::rom::RomSet;
use crate::trace;

/// Ties every subsystem together and drives execution.
pub struct Machine {
    pub regs: Regs,
    pub mem: Memory,
    pub drive: Drive,
    kernal: Kernal,
    hooks: HookTable,
    trace_sink: Option<Box<dyn Write>>,
}

impl Machine {
    pub fn new(roms: RomSet) -> Self {
        let mut hooks = HookTable::new();
        hooks.prepare().expect("empty hook table always prepares cleanly");
        let mut mem = Memory::new(roms);
        let kernal = Kernal::new();
        kernal.init_ram(&mut mem);
        Self {
            regs: Regs::new(),
            mem,
            drive: Drive::new(),
            kernal,
            hooks,
            trace_sink: None,
        }
    }

    /// Register an execution hook; takes effect after the next `prepare_hooks`.
    pub fn register_hook(&mut self, hook: Hook) {
        self.hooks.register(hook);
    }

    /// Freeze the hook table. Must be called at least once before `step`/`run`
    /// observes any registered hooks (an empty table works without it too,
    /// since `lookup` only errors when hooks were registered but never
    /// prepared).
    pub fn prepare_hooks(&mut self) -> EmuResult<()> {
        self.hooks.prepare()
    }

    /// Direct all `--trace` output at `sink` instead of discarding it.
    pub fn set_trace_sink(&mut self, sink: Box<dyn Write>) {
        self.trace_sink = Some(sink);
    }

    fn fire_hooks(&mut self, pc: u16, kind: HookKind, is_post: bool) -> EmuResult<()> {
        let Machine { hooks, regs, mem, .. } = self;
        hooks.fire(pc, kind, is_post, regs, mem)
    }

    fn write_trace_line(&mut self, pc_at_fetch: u16) {
        if self.trace_sink.is_none() {
            return;
        }
        let opcode = self.mem.load(pc_at_fetch);
        let Some((mnemonic, mode)) = decode(opcode) else {
            return;
        };
        let operand_len = mode.operand_len();
        let mut raw_bytes = vec![opcode];
        for i in 0..operand_len {
            raw_bytes.push(self.mem.load(pc_at_fetch.wrapping_add(1 + i as u16)));
        }
        let line = trace::format_line(pc_at_fetch, &raw_bytes, mnemonic.name(), &self.regs);
        if let Some(sink) = self.trace_sink.as_mut() {
            let _ = writeln!(sink, "{line}");
        }
    }

    /// Execute a single instruction, firing pre/post execution hooks at the
    /// fetch address and trampolining any KERNAL ROM call encountered.
    pub fn step(&mut self) -> EmuResult<()> {
        let pc = self.regs.pc;
        self.fire_hooks(pc, HookKind::Exec, false)?;
        self.write_trace_line(pc);

        let Machine {
            regs, mem, drive, kernal, ..
        } = self;
        let mut rom_call = |r: &mut Regs, m: &mut Memory, addr: u16| -> EmuResult<()> {
            log::debug!("ROM call trampoline: ${addr:04X}");
            kernal.dispatch(r, m, drive, addr)
        };
        cpu::step(regs, mem, &mut rom_call)?;

        self.fire_hooks(pc, HookKind::Exec, true)?;
        Ok(())
    }

    /// Run until `stop_pc` is reached (checked before each instruction) or
    /// `max_instructions` have executed, whichever comes first. Either bound
    /// may be omitted; running with both `None` executes until a fatal error
    /// (typically an illegal opcode used as a deliberate halt marker).
    pub fn run(&mut self, stop_pc: Option<u16>, max_instructions: Option<u64>) -> EmuResult<()> {
        loop {
            if let Some(stop) = stop_pc {
                if self.regs.pc == stop {
                    return Ok(());
                }
            }
            if let Some(max) = max_instructions {
                if self.regs.ic >= max {
                    return Ok(());
                }
            }
            self.step()?;
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("regs", &self.regs)
            .field("has_disk", &self.drive.is_mounted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmuError;
    use crate::rom::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE};

    fn machine() -> Machine {
        let roms = RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; KERNAL_SIZE]).unwrap();
        Machine::new(roms)
    }

    #[test]
    fn step_executes_one_instruction_and_advances_pc() {
        let mut m = machine();
        m.mem.store(0x0800, 0xA9); // LDA #$42
        m.mem.store(0x0801, 0x42);
        m.regs.pc = 0x0800;
        m.step().unwrap();
        assert_eq!(m.regs.a, 0x42);
        assert_eq!(m.regs.pc, 0x0802);
        assert_eq!(m.regs.ic, 1);
    }

    #[test]
    fn run_stops_at_configured_pc() {
        let mut m = machine();
        m.mem.store(0x0800, 0xEA); // NOP
        m.mem.store(0x0801, 0xEA);
        m.mem.store(0x0802, 0xEA);
        m.regs.pc = 0x0800;
        m.run(Some(0x0802), None).unwrap();
        assert_eq!(m.regs.pc, 0x0802);
        assert_eq!(m.regs.ic, 2);
    }

    #[test]
    fn run_stops_at_instruction_cap() {
        let mut m = machine();
        for addr in 0x0800u16..0x0810 {
            m.mem.store(addr, 0xEA);
        }
        m.regs.pc = 0x0800;
        m.run(None, Some(5)).unwrap();
        assert_eq!(m.regs.ic, 5);
    }

    #[test]
    fn illegal_opcode_halts_run_with_error() {
        let mut m = machine();
        m.mem.store(0x0800, 0x02);
        m.regs.pc = 0x0800;
        let err = m.run(None, None).unwrap_err();
        assert!(matches!(err, EmuError::IllegalOpcode { .. }));
    }

    #[test]
    fn rom_call_trampoline_round_trips_through_step() {
        let mut m = machine();
        // JSR $FFD2 (BSOUT); default output device is keyboard/screen, a
        // no-op in this model, so the call should return cleanly.
        m.mem.store(0x0800, 0x20);
        m.mem.store(0x0801, 0xD2);
        m.mem.store(0x0802, 0xFF);
        m.regs.pc = 0x0800;
        m.step().unwrap();
        assert_eq!(m.regs.pc, 0x0803);
    }

    #[test]
    fn trace_sink_receives_a_line_per_instruction() {
        let mut m = machine();
        let buf: Vec<u8> = Vec::new();
        let sink = std::sync::Arc::new(std::sync::Mutex::new(buf));
        struct SharedWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        m.set_trace_sink(Box::new(SharedWriter(sink.clone())));
        m.mem.store(0x0800, 0xEA);
        m.regs.pc = 0x0800;
        m.step().unwrap();
        let written = sink.lock().unwrap().clone();
        assert!(String::from_utf8(written).unwrap().contains("NOP"));
    }
}
