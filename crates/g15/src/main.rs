//! Bendix G-15 emulator binary.
//!
//! Runs headless: loads a reset (boot) tape and an optional reader tape,
//! presses reset, then steps the processor until it halts or a step limit
//! is reached.

use std::path::{Path, PathBuf};
use std::process;

use g15::Machine;
use g15_panel::{load_ascii, load_pierce, load_standard, MemoryTape};

struct CliArgs {
    reset_tape: Option<PathBuf>,
    reader_tape: Option<PathBuf>,
    max_steps: u64,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        reset_tape: None,
        reader_tape: None,
        max_steps: 1_000_000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--reset-tape" => {
                i += 1;
                cli.reset_tape = args.get(i).map(PathBuf::from);
            }
            "--reader-tape" => {
                i += 1;
                cli.reader_tape = args.get(i).map(PathBuf::from);
            }
            "--max-steps" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.max_steps = s.parse().unwrap_or(1_000_000);
                }
            }
            "--help" | "-h" => {
                eprintln!("Usage: g15 [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --reset-tape <file>   Tape image loaded by the reset button (CN + bootstrap)");
                eprintln!("  --reader-tape <file>  Tape image left in the paper-tape reader");
                eprintln!("  --max-steps <n>       Fetch/transfer cycle limit [default: 1000000]");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Load a tape image, dispatching on its extension per the three formats
/// §6 defines (.pt Pierce, .ptr standard, .pti ASCII text).
fn load_tape_image(path: &Path) -> Vec<u8> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Cannot read tape image {}: {e}", path.display());
            process::exit(1);
        }
    };
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("pt") => load_pierce(&bytes),
        Some("ptr") => load_standard(&bytes),
        Some("pti") => {
            let text = String::from_utf8_lossy(&bytes);
            match load_ascii(&text) {
                Ok(codes) => codes,
                Err(e) => {
                    eprintln!("Bad ASCII tape image {}: {e}", path.display());
                    process::exit(1);
                }
            }
        }
        other => {
            eprintln!(
                "Unrecognized tape image extension {:?} on {} (expected .pt, .ptr, or .pti)",
                other,
                path.display()
            );
            process::exit(1);
        }
    }
}

fn main() {
    let cli = parse_args();

    let Some(reset_path) = cli.reset_tape else {
        eprintln!("A --reset-tape image is required to bring the machine out of reset.");
        process::exit(1);
    };
    let reset_codes = load_tape_image(&reset_path);

    let reader_codes = cli.reader_tape.as_deref().map(load_tape_image).unwrap_or_default();

    let mut machine = Machine::new(
        Box::new(MemoryTape::new(reader_codes)),
        Box::new(MemoryTape::new(vec![])),
        Box::new(MemoryTape::new(vec![])),
    );

    machine.reset(&reset_codes);

    match machine.run(cli.max_steps) {
        Ok(steps) => {
            eprintln!("halted after {steps} command cycles; AR = {:#010x}", machine.drum().ar().raw());
        }
        Err(e) => {
            eprintln!("machine error: {e}");
            process::exit(1);
        }
    }
}
