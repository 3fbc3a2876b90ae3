use std::fs;
use std::path::PathBuf;

use log::debug;

use crate::chip::Chip;
use crate::context::Context;
use crate::error::LoadError;
use crate::interpreter::{Interpreter, DEFAULT_FREQUENCY};
use crate::quirks::Quirks;

enum Program<'a> {
    Bytes(&'a [u8]),
    File(PathBuf),
}

pub struct Builder<'a, C: Context> {
    context: Option<C>,
    program: Option<Program<'a>>,
    quirks: Quirks,
    frequency: u32,
}

impl<'a, C: Context> Builder<'a, C> {
    pub fn new() -> Self {
        Self {
            context: None,
            program: None,
            quirks: Quirks::default(),
            frequency: DEFAULT_FREQUENCY,
        }
    }

    pub fn with_context(mut self, ctx: C) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn with_program(mut self, prog: &'a [u8]) -> Self {
        self.program = Some(Program::Bytes(prog));
        self
    }

    /// Read the program from `path` when building
    pub fn with_rom_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.program = Some(Program::File(path.into()));
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Ticks per second of the worker, only used by `spawn`
    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn build(self) -> Result<Chip<C>, LoadError> {
        let context = self.context.ok_or(LoadError::MissingContext)?;
        let mut chip = Chip::new(context, self.quirks);
        match self.program.ok_or(LoadError::MissingProgram)? {
            Program::Bytes(prog) => chip.load(prog)?,
            Program::File(path) => {
                debug!("reading rom from {}", path.display());
                chip.load(&fs::read(&path)?)?
            }
        }
        Ok(chip)
    }

    /// Build the machine and hand it to a paused `Interpreter`
    pub fn spawn(self) -> Result<Interpreter<C>, LoadError>
    where
        C: Send + 'static,
    {
        if self.frequency == 0 {
            return Err(LoadError::InvalidFrequency);
        }
        let frequency = self.frequency;
        Interpreter::new(self.build()?, frequency)
    }
}

impl<'a, C: Context> Default for Builder<'a, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::TestingContext;
    use crate::quirks::RegisterWidth;

    #[test]
    fn with_context_and_prog() {
        let result = Builder::new()
            .with_context(TestingContext::new(0))
            .with_program(&[])
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn with_context_only() {
        let result = Builder::new().with_context(TestingContext::new(0)).build();
        assert!(matches!(result, Err(LoadError::MissingProgram)));
    }

    #[test]
    fn with_program_only() {
        let result = Builder::<'_, TestingContext>::new()
            .with_program(&[])
            .build();
        assert!(matches!(result, Err(LoadError::MissingContext)));
    }

    #[test]
    fn with_quirks() {
        let chip = Builder::new()
            .with_context(TestingContext::new(0))
            .with_program(&[])
            .with_quirks(Quirks::legacy())
            .build()
            .unwrap();
        assert_eq!(chip.quirks().register_width, RegisterWidth::Word);
    }

    #[test]
    fn with_oversized_program() {
        let rom = [0u8; 4096];
        let result = Builder::new()
            .with_context(TestingContext::new(0))
            .with_program(&rom)
            .build();
        assert!(matches!(result, Err(LoadError::RomTooLarge { .. })));
    }

    #[test]
    fn with_missing_rom_file() {
        let result = Builder::new()
            .with_context(TestingContext::new(0))
            .with_rom_file("/nonexistent/vip8/rom.ch8")
            .build();
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn with_rom_file() {
        let path = std::env::temp_dir().join(format!("vip8-builder-{}.ch8", std::process::id()));
        fs::write(&path, [0x60, 0x2A]).unwrap();
        let mut chip = Builder::new()
            .with_context(TestingContext::new(0))
            .with_rom_file(&path)
            .build()
            .unwrap();
        fs::remove_file(&path).unwrap();

        chip.tick().unwrap();
        assert_eq!(chip.registers().v[0], 0x2A);
    }

    #[test]
    fn spawn_with_frequency() {
        let interpreter = Builder::new()
            .with_context(TestingContext::new(0))
            .with_program(&[])
            .with_frequency(60)
            .spawn()
            .unwrap();
        assert_eq!(interpreter.frequency(), 60);
        assert!(!interpreter.is_live());

        let result = Builder::new()
            .with_context(TestingContext::new(0))
            .with_program(&[])
            .with_frequency(0)
            .spawn();
        assert!(matches!(result, Err(LoadError::InvalidFrequency)));
    }
}
