//! Context for accessing functionalities of platform that the interpreter is
//! emulated on.
//!
//! Display, keys and timers are all pulled or pushed through the
//! `Interpreter`, the only thing the machine asks its host for on its own is
//! entropy. Implementators must be `Send` to be moved into the worker thread.

/// Trait aggregating platform functionalities
pub trait Context {
    /// Generate random 8-bit number
    ///
    /// Called by `tick` whenever requested by executing program
    fn gen_random(&mut self) -> u8;
}

/// Default context drawing numbers from the thread-local generator of `rand`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl Context for ThreadRandom {
    fn gen_random(&mut self) -> u8 {
        rand::random::<u8>()
    }
}
