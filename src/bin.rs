//! Headless CHIP-8 runner.
//!
//! Loads a ROM, runs it live for a while or steps it a given number of
//! instructions, then prints the registers and the frame.
//!
//! ```bash
//! chip8 roms/ibm-logo.ch8 --seconds 2
//! chip8 roms/test_opcode.ch8 --steps 500 --legacy --log-level trace
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use log::info;

use chip8_host::{logger, runner, Mode, Severity};
use vip8::{Builder, Quirks, ThreadRandom, DEFAULT_FREQUENCY};

#[doc(hidden)]
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(help = "Path to the ROM file to run")]
    rom: PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_FREQUENCY, help = "Instructions per second")]
    frequency: u32,

    #[arg(short, long, default_value_t = 1.0, help = "Seconds to run live")]
    seconds: f64,

    #[arg(long, conflicts_with = "seconds", help = "Step this many instructions instead of running live")]
    steps: Option<usize>,

    #[arg(long, help = "Reproduce the legacy interpreter's quirks")]
    legacy: bool,

    #[arg(short, long, value_enum, default_value_t = Severity::Info, help = "Log verbosity")]
    log_level: Severity,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.log_level)?;

    let quirks = if args.legacy {
        Quirks::legacy()
    } else {
        Quirks::default()
    };
    let interpreter = Builder::new()
        .with_context(ThreadRandom)
        .with_rom_file(&args.rom)
        .with_quirks(quirks)
        .with_frequency(args.frequency)
        .spawn()
        .with_context(|| format!("can't start {}", args.rom.display()))?;
    info!("loaded {} at {} Hz", args.rom.display(), args.frequency);

    let mode = match args.steps {
        Some(count) => Mode::Steps { count },
        None => Mode::Live {
            duration: Duration::try_from_secs_f64(args.seconds)
                .context("invalid --seconds")?,
        },
    };
    let report = runner::run(&interpreter, mode)?;
    print!("{}", report);

    Ok(())
}
