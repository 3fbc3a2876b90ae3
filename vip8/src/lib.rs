//! Portable core of a CHIP-8 interpreter.
//!
//! `Chip` is the machine stepped by hand, `Interpreter` runs it on a worker
//! thread and serves snapshots and key events to any number of callers.
//! Both are usually put together with `Builder`.
pub mod builder;
pub mod chip;
pub mod context;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod keypad;
pub mod memory;
pub mod opcode;
pub mod quirks;
pub mod timer;

pub use builder::Builder;
pub use chip::{Chip, Registers};
pub use context::{Context, ThreadRandom};
pub use error::{Error, LoadError};
pub use frame::Frame;
pub use interpreter::{Interpreter, Step, DEFAULT_FREQUENCY};
pub use keypad::KeyWait;
pub use opcode::OpCode;
pub use quirks::{BcdOperand, Quirks, RegisterWidth, ShiftFlag};
pub use timer::TimerState;
