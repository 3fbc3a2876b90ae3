use std::io;

use thiserror::Error;

/// Faults raised while executing a program.
///
/// Any of them raised by `Chip::tick` is terminal for the current run: the
/// machine latches it and refuses to tick again. `InvalidKey` only comes back
/// from `set_key` and leaves the machine running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("opcode {opcode:#06X} is not implemented")]
    UnimplementedOpcode { opcode: u16 },

    #[error("can't return, call stack is empty")]
    StackUnderflow,

    #[error("can't enter subroutine at {target:#05X}, call stack is full")]
    StackOverflow { target: u16 },

    #[error("access of {len} byte(s) at {address:#06X} is out of address space")]
    AddressOutOfRange { address: usize, len: usize },

    #[error("write of {len} byte(s) at {address:#06X} hits the reserved interpreter area")]
    ReservedWrite { address: usize, len: usize },

    #[error("program counter {pc:#06X} is misaligned or out of address space")]
    InvalidProgramCounter { pc: u16 },

    #[error("key {key:#04X} does not exist on a 16 key pad")]
    InvalidKey { key: u8 },
}

/// Problems found while putting a machine together, before anything runs.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("can't read rom")]
    Io(#[from] io::Error),

    #[error("rom is {size} bytes, only {capacity} fit after the load address")]
    RomTooLarge { size: usize, capacity: usize },

    #[error("context not provided")]
    MissingContext,

    #[error("program not provided")]
    MissingProgram,

    #[error("tick frequency must be greater than zero")]
    InvalidFrequency,
}
