//! Threaded front of the machine.
//!
//! A worker thread ticks the `Chip` at a fixed frequency while it is live,
//! every other thread talks to it through `Interpreter`. All of them go
//! through one mutex, so each call sees the machine between two instructions.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::chip::{Chip, Registers};
use crate::context::Context;
use crate::error::{Error, LoadError};
use crate::frame::Frame;
use crate::keypad::KeyWait;
use crate::opcode::OpCode;
use crate::timer::TimerState;

/// Instructions per second when nothing else is requested
pub const DEFAULT_FREQUENCY: u32 = 700;

/// How long the worker sleeps between polls of the live flag while paused
const IDLE_PERIOD: Duration = Duration::from_millis(100);

/// Outcome of a synchronous `Interpreter::tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Executed(OpCode),
    /// Sitting on `FX0A`, nothing was fetched
    AwaitingKey,
    /// The worker owns ticking, the call did nothing
    LiveRunning,
}

struct Shared<C: Context> {
    chip: Mutex<Chip<C>>,
    live: AtomicBool,
    shutdown: AtomicBool,
}

impl<C: Context> Shared<C> {
    /// A panic inside the lock leaves the machine between two instructions, carry on with it
    fn lock(&self) -> MutexGuard<'_, Chip<C>> {
        self.chip.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Interpreter<C: Context + Send + 'static> {
    shared: Arc<Shared<C>>,
    frequency: u32,
    worker: Option<JoinHandle<()>>,
}

impl<C: Context + Send + 'static> Interpreter<C> {
    /// Take ownership of `chip` and start the worker paused
    pub fn new(chip: Chip<C>, frequency: u32) -> Result<Self, LoadError> {
        if frequency == 0 {
            return Err(LoadError::InvalidFrequency);
        }
        let shared = Arc::new(Shared {
            chip: Mutex::new(chip),
            live: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });
        let period = Duration::from_nanos(1_000_000_000u64 / frequency as u64);
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("vip8-worker".into())
            .spawn(move || run_worker(&worker_shared, period))?;
        debug!("worker started at {} Hz", frequency);

        Ok(Self {
            shared,
            frequency,
            worker: Some(worker),
        })
    }

    /// Execute one instruction on the calling thread, does nothing while live
    pub fn tick(&self) -> Result<Step, Error> {
        let mut chip = self.shared.lock();
        if self.shared.live.load(Ordering::Acquire) {
            return Ok(Step::LiveRunning);
        }
        match chip.tick() {
            Ok(opcode) => Ok(Step::Executed(opcode)),
            Err(nb::Error::WouldBlock) => Ok(Step::AwaitingKey),
            Err(nb::Error::Other(fault)) => Err(fault),
        }
    }

    /// Start or pause the worker, returns whether it is live afterwards
    ///
    /// A halted machine never goes live again.
    pub fn toggle_live(&self) -> bool {
        let chip = self.shared.lock();
        let live = !self.shared.live.load(Ordering::Acquire);
        if live {
            if let Some(fault) = chip.fault() {
                warn!("refusing to go live, machine halted: {}", fault);
                return false;
            }
        }
        self.shared.live.store(live, Ordering::Release);
        info!("live run {}", if live { "started" } else { "paused" });
        live
    }

    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn set_key(&self, key: u8, pressed: bool) -> Result<(), Error> {
        self.shared.lock().set_key(key, pressed).map_err(|err| {
            warn!("{}", err);
            err
        })
    }

    /// Copy of the current frame
    pub fn display(&self) -> Frame {
        self.shared.lock().frame().clone()
    }

    pub fn registers(&self) -> Registers {
        self.shared.lock().registers()
    }

    /// Count both timers down, meant to be driven by a 60 Hz clock
    pub fn tick_timers(&self) -> TimerState {
        self.shared.lock().tick_timers()
    }

    pub fn key_wait(&self) -> KeyWait {
        self.shared.lock().key_wait()
    }

    /// Error the machine halted on, if any
    pub fn fault(&self) -> Option<Error> {
        self.shared.lock().fault()
    }
}

impl<C: Context + Send + 'static> Drop for Interpreter<C> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

fn run_worker<C: Context>(shared: &Shared<C>, period: Duration) {
    let mut next = Instant::now();
    while !shared.shutdown.load(Ordering::Acquire) {
        if !shared.live.load(Ordering::Acquire) {
            thread::park_timeout(IDLE_PERIOD);
            next = Instant::now();
            continue;
        }

        let now = Instant::now();
        if now < next {
            thread::park_timeout(next - now);
            continue;
        }
        next = now + period;

        let mut chip = shared.lock();
        // toggled off while waiting for the lock
        if !shared.live.load(Ordering::Acquire) {
            continue;
        }
        if let Err(nb::Error::Other(_)) = chip.tick() {
            shared.live.store(false, Ordering::Release);
            info!("live run stopped");
        }
    }
    debug!("worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::TestingContext;
    use crate::quirks::Quirks;

    fn interpreter(prog: &[u8], frequency: u32) -> Interpreter<TestingContext> {
        let mut chip = Chip::new(TestingContext::new(0), Quirks::default());
        chip.load(prog).unwrap();
        Interpreter::new(chip, frequency).unwrap()
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let chip = Chip::new(TestingContext::new(0), Quirks::default());
        assert!(matches!(
            Interpreter::new(chip, 0),
            Err(LoadError::InvalidFrequency)
        ));
    }

    #[test]
    fn synchronous_ticks() {
        let interpreter = interpreter(&[0x60, 0x05, 0x70, 0x03], DEFAULT_FREQUENCY);
        assert_eq!(interpreter.frequency(), DEFAULT_FREQUENCY);
        assert_eq!(
            interpreter.tick(),
            Ok(Step::Executed(OpCode::_6XNN { x: 0, nn: 0x05 }))
        );
        assert_eq!(
            interpreter.tick(),
            Ok(Step::Executed(OpCode::_7XNN { x: 0, nn: 0x03 }))
        );
        let regs = interpreter.registers();
        assert_eq!(regs.v[0], 8);
        assert_eq!(regs.pc, 516);
    }

    #[test]
    fn tick_is_noop_while_live() {
        let interpreter = interpreter(&[0x12, 0x00], 1000);
        assert!(interpreter.toggle_live());
        assert!(interpreter.is_live());
        assert_eq!(interpreter.tick(), Ok(Step::LiveRunning));
        assert!(!interpreter.toggle_live());
        assert!(!interpreter.is_live());
        assert_eq!(
            interpreter.tick(),
            Ok(Step::Executed(OpCode::_1NNN { nnn: 0x200 }))
        );
    }

    #[test]
    fn live_run_executes_program() {
        // count V0 up to 0x20 then spin on 0x206
        let interpreter = interpreter(
            &[0x70, 0x01, 0x30, 0x20, 0x12, 0x00, 0x12, 0x06],
            2000,
        );
        interpreter.toggle_live();
        assert!(wait_until(Duration::from_secs(5), || {
            interpreter.registers().pc == 0x206
        }));
        interpreter.toggle_live();
        assert_eq!(interpreter.registers().v[0], 0x20);
    }

    #[test]
    fn fault_stops_live_run() {
        let interpreter = interpreter(&[0x00, 0xEE], 1000);
        assert!(interpreter.toggle_live());
        assert!(wait_until(Duration::from_secs(5), || !interpreter.is_live()));
        assert_eq!(interpreter.fault(), Some(Error::StackUnderflow));
        assert_eq!(interpreter.tick(), Err(Error::StackUnderflow));
        assert!(!interpreter.toggle_live());
    }

    #[test]
    fn blocked_on_key() {
        let interpreter = interpreter(&[0xF5, 0x0A], DEFAULT_FREQUENCY);
        assert_eq!(interpreter.tick(), Ok(Step::AwaitingKey));
        assert_eq!(interpreter.tick(), Ok(Step::AwaitingKey));
        assert_eq!(interpreter.key_wait(), KeyWait::Waiting { x: 5 });
        assert_eq!(interpreter.registers().pc, 0x200);

        assert_eq!(
            interpreter.set_key(0x10, true),
            Err(Error::InvalidKey { key: 0x10 })
        );
        interpreter.set_key(0x0E, true).unwrap();
        assert_eq!(
            interpreter.tick(),
            Ok(Step::Executed(OpCode::_FX0A { x: 5 }))
        );
        let regs = interpreter.registers();
        assert_eq!(regs.v[5], 0x0E);
        assert_eq!(regs.pc, 0x202);
    }

    #[test]
    fn timers_and_display_snapshots() {
        // V0 := 3, delay := V0, sound := V0, I := glyph of V0, draw it at (V0, V0)
        let interpreter = interpreter(
            &[
                0x60, 0x03, 0xF0, 0x15, 0xF0, 0x18, 0xF0, 0x29, 0xD0, 0x05,
            ],
            DEFAULT_FREQUENCY,
        );
        for _ in 0..5 {
            interpreter.tick().unwrap();
        }
        let regs = interpreter.registers();
        assert_eq!((regs.delay_timer, regs.sound_timer), (3, 3));
        assert_eq!(interpreter.tick_timers(), TimerState::On);
        assert_eq!(interpreter.tick_timers(), TimerState::On);
        assert_eq!(interpreter.tick_timers(), TimerState::Finished);
        assert_eq!(interpreter.registers().delay_timer, 0);

        let frame = interpreter.display();
        assert_eq!(frame.get(3, 3), Some(true));
        assert_eq!(frame.get(6, 4), Some(true));
        assert_eq!(frame.get(3, 4), Some(false));
        assert_eq!(frame.lit(), 4 + 1 + 4 + 1 + 4);
    }
}
