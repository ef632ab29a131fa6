/*!
bin/c64em.rs - command-line front end (§6).

Two invocation shapes:

  c64em <program.prg> [override_pc_hex]
  c64em state <reg_path> <ram_path> <disk_path>

`-v`/`--trace` sends a trace line per instruction to stdout;
`--trace-file PATH` redirects it to a file instead. `RUST_LOG` (via
`env_logger`) controls ambient diagnostic logging independently of
`--trace`. Exit codes: 0 success, 1 usage/I-O error, 2 missing required
input file, 255 any other fatal error.
*/

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use c64em::error::{EmuError, EmuResult};
use c64em::machine::Machine;
use c64em::rom::RomSet;

struct Args {
    rom_dir: PathBuf,
    trace: bool,
    trace_file: Option<PathBuf>,
    mode: Mode,
}

enum Mode {
    Prg { path: PathBuf, override_pc: Option<u16> },
    State { regs: PathBuf, ram: PathBuf, disk: PathBuf },
}

fn parse_args() -> EmuResult<Args> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    let mut rom_dir = PathBuf::from("rom/c64");
    let mut trace = false;
    let mut trace_file = None;

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-v" | "--trace" => {
                trace = true;
                argv.remove(i);
            }
            "--trace-file" => {
                if i + 1 >= argv.len() {
                    return Err(EmuError::Usage("--trace-file requires a path".into()));
                }
                trace = true;
                trace_file = Some(PathBuf::from(argv.remove(i + 1)));
                argv.remove(i);
            }
            "--rom-dir" => {
                if i + 1 >= argv.len() {
                    return Err(EmuError::Usage("--rom-dir requires a path".into()));
                }
                rom_dir = PathBuf::from(argv.remove(i + 1));
                argv.remove(i);
            }
            _ => i += 1,
        }
    }

    let mode = match argv.first().map(String::as_str) {
        Some("state") => {
            if argv.len() != 4 {
                return Err(EmuError::Usage(
                    "usage: c64em state <reg_path> <ram_path> <disk_path>".into(),
                ));
            }
            Mode::State {
                regs: PathBuf::from(&argv[1]),
                ram: PathBuf::from(&argv[2]),
                disk: PathBuf::from(&argv[3]),
            }
        }
        Some(path) => {
            let override_pc = argv
                .get(1)
                .map(|s| u16::from_str_radix(s.trim_start_matches("0x"), 16))
                .transpose()
                .map_err(|_| EmuError::Usage("override PC must be hex".into()))?;
            Mode::Prg {
                path: PathBuf::from(path),
                override_pc,
            }
        }
        None => {
            return Err(EmuError::Usage(
                "usage: c64em <program.prg> [override_pc_hex] | c64em state <regs> <ram> <disk>"
                    .into(),
            ))
        }
    };

    Ok(Args {
        rom_dir,
        trace,
        trace_file,
        mode,
    })
}

fn run(args: Args) -> EmuResult<()> {
    let roms = RomSet::load_from_dir(&args.rom_dir)?;
    let mut machine = Machine::new(roms);

    if args.trace {
        let sink: Box<dyn std::io::Write> = match &args.trace_file {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(std::io::stdout()),
        };
        machine.set_trace_sink(sink);
    }

    match args.mode {
        Mode::Prg { path, override_pc } => {
            if !Path::new(&path).exists() {
                return Err(EmuError::Usage(format!("program file not found: {}", path.display())));
            }
            log::info!("loading PRG {}", path.display());
            let load_addr = c64em::loader::load_prg(&path, &mut machine.mem)?;
            machine.regs.pc = override_pc.unwrap_or(load_addr);
        }
        Mode::State { regs, ram, disk } => {
            log::info!("loading machine-state snapshot");
            c64em::loader::load_registers(&regs, &mut machine.regs)?;
            c64em::loader::load_ram(&ram, &mut machine.mem)?;
            let image = std::fs::read(&disk)?;
            machine.drive.mount(image)?;
        }
    }

    machine.run(None, None)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(err @ EmuError::Usage(_)) => {
            log::error!("{err}");
            eprintln!("{err}");
            ExitCode::from(1)
        }
        Err(err @ EmuError::Io(_)) => {
            log::error!("{err}");
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            log::error!("{err}");
            eprintln!("{err}");
            ExitCode::from(255)
        }
    }
}
