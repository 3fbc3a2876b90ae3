use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use vip8::{Context, Frame, Interpreter, Registers, Step};

/// Rate of the external timer clock
pub const TIMER_FREQUENCY: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Let the worker run on its own for a while
    Live { duration: Duration },
    /// Drive the machine from the calling thread
    Steps { count: usize },
}

/// State of the machine once the run is over
#[derive(Debug, Clone)]
pub struct Report {
    /// Instructions executed, only counted in step mode
    pub executed: Option<usize>,
    pub registers: Registers,
    pub frame: Frame,
}

/// Run `interpreter` as requested and collect its final state
///
/// A halting fault is returned as the error, a program waiting for a key in
/// step mode simply ends the run.
pub fn run<C: Context + Send + 'static>(
    interpreter: &Interpreter<C>,
    mode: Mode,
) -> Result<Report, vip8::Error> {
    let executed = match mode {
        Mode::Live { duration } => {
            run_live(interpreter, duration);
            None
        }
        Mode::Steps { count } => Some(run_steps(interpreter, count)?),
    };
    if let Some(fault) = interpreter.fault() {
        return Err(fault);
    }
    Ok(Report {
        executed,
        registers: interpreter.registers(),
        frame: interpreter.display(),
    })
}

fn run_live<C: Context + Send + 'static>(interpreter: &Interpreter<C>, duration: Duration) {
    let period = Duration::from_nanos(1_000_000_000u64 / TIMER_FREQUENCY as u64);
    let started = Instant::now();
    interpreter.toggle_live();
    while started.elapsed() < duration && interpreter.is_live() {
        thread::sleep(period.min(duration.saturating_sub(started.elapsed())));
        interpreter.tick_timers();
    }
    if interpreter.is_live() {
        interpreter.toggle_live();
    }
    info!("live run over after {:?}", started.elapsed());
}

fn run_steps<C: Context + Send + 'static>(
    interpreter: &Interpreter<C>,
    count: usize,
) -> Result<usize, vip8::Error> {
    let per_timer_tick = (interpreter.frequency() / TIMER_FREQUENCY).max(1) as usize;
    let mut executed = 0;
    while executed < count {
        match interpreter.tick()? {
            Step::Executed(_) => executed += 1,
            Step::AwaitingKey => {
                warn!("program waits for a key after {} steps, stopping", executed);
                break;
            }
            Step::LiveRunning => {
                warn!("interpreter is running live, stepping refused");
                break;
            }
        }
        if executed % per_timer_tick == 0 {
            interpreter.tick_timers();
        }
    }
    Ok(executed)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = &self.registers;
        if let Some(executed) = self.executed {
            writeln!(f, "executed {} instructions", executed)?;
        }
        writeln!(
            f,
            "PC {:#05X}  I {:#05X}  DT {}  ST {}",
            regs.pc, regs.i, regs.delay_timer, regs.sound_timer
        )?;
        for (idx, value) in regs.v.iter().enumerate() {
            let sep = if idx % 8 == 7 { "\n" } else { "  " };
            write!(f, "V{:X} {:#04X}{}", idx, value, sep)?;
        }
        writeln!(f, "stack {:X?}", regs.stack)?;
        write!(f, "{}", self.frame)
    }
}
