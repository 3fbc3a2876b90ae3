use heapless::Vec;
use log::{error, trace};

use crate::context::Context;
use crate::error::{Error, LoadError};
use crate::frame::{Frame, HEIGHT, WIDTH};
use crate::keypad::{KeyWait, Keypad};
use crate::memory::{Memory, MEM_SIZE, PROGRAM_START};
use crate::opcode::OpCode;
use crate::quirks::{BcdOperand, Quirks, ShiftFlag};
use crate::timer::{Timer, TimerState};

/// Maximal depth of nested subroutines
pub const STACK_DEPTH: usize = 16;

/// Copy of the register file taken in one go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub v: [u16; 16],
    pub i: u16,
    pub pc: u16,
    /// Return addresses, innermost call last
    pub stack: std::vec::Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
}

/// The machine itself: memory, registers, display, timers and keypad
///
/// `Chip` is single threaded, `Interpreter` wraps it for use across threads.
pub struct Chip<C: Context> {
    ctx: C,
    quirks: Quirks,
    v: [u16; 16],
    i: u16,
    pc: u16,
    frame: Frame,
    memory: Memory,
    stack: Vec<u16, STACK_DEPTH>,
    delay_timer: Timer,
    sound_timer: Timer,
    keypad: Keypad,
    fault: Option<Error>,
}

impl<C: Context> Chip<C> {
    pub fn new(ctx: C, quirks: Quirks) -> Self {
        Self {
            ctx,
            quirks,
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            frame: Frame::new(),
            memory: Memory::new(),
            stack: Vec::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            keypad: Keypad::new(),
            fault: None,
        }
    }

    /// Copy `prog` to memory at 0x200
    pub fn load(&mut self, prog: &[u8]) -> Result<(), LoadError> {
        self.memory.load(prog)
    }

    /// Fetch, execute and clip a single instruction
    ///
    /// `WouldBlock` means the machine sits on `FX0A` until a key is pressed.
    /// Any other error is terminal: it is latched and returned by every later call.
    pub fn tick(&mut self) -> nb::Result<OpCode, Error> {
        if let Some(fault) = self.fault {
            return Err(nb::Error::Other(fault));
        }
        self.step().map_err(|err| {
            if let nb::Error::Other(fault) = err {
                error!("machine halted at {:#05X}: {}", self.pc, fault);
                self.fault = Some(fault);
            }
            err
        })
    }

    /// Count both timers down by one, returns the state of the sound timer
    pub fn tick_timers(&mut self) -> TimerState {
        self.delay_timer.decrement();
        self.sound_timer.decrement()
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), Error> {
        self.keypad.set(key, pressed)
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn registers(&self) -> Registers {
        Registers {
            v: self.v,
            i: self.i,
            pc: self.pc,
            stack: self.stack.to_vec(),
            delay_timer: self.delay_timer.load(),
            sound_timer: self.sound_timer.load(),
        }
    }

    pub fn key_wait(&self) -> KeyWait {
        self.keypad.wait()
    }

    pub fn fault(&self) -> Option<Error> {
        self.fault
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    fn step(&mut self) -> nb::Result<OpCode, Error> {
        match self.keypad.wait() {
            KeyWait::Waiting { .. } => return Err(nb::Error::WouldBlock),
            KeyWait::Captured { x, key } => {
                self.v[x as usize] = key as u16;
                self.keypad.finish_waiting();
                self.skip();
                self.clip_registers();
                return Ok(OpCode::_FX0A { x });
            }
            KeyWait::Idle => {}
        }

        let at = self.pc;
        let opcode = self.fetch()?;
        trace!("{:#05X}: {}", at, opcode);
        self.execute(opcode)?;
        self.clip_registers();

        match self.keypad.wait() {
            KeyWait::Waiting { .. } => Err(nb::Error::WouldBlock),
            _ => Ok(opcode),
        }
    }

    fn fetch(&mut self) -> Result<OpCode, Error> {
        if self.pc % 2 != 0 || self.pc as usize + 1 >= MEM_SIZE {
            return Err(Error::InvalidProgramCounter { pc: self.pc });
        }
        let raw = self.memory.word(self.pc)?;
        self.pc += 2;
        OpCode::try_from(raw)
    }

    /// Step over the following instruction, an address run off the end is caught by the next fetch
    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    fn clip_registers(&mut self) {
        let mask = self.quirks.register_width.mask();
        self.v.iter_mut().for_each(|reg| *reg &= mask);
    }
}

// OpCodes impls
impl<C: Context> Chip<C> {
    #[rustfmt::skip]
    fn execute(&mut self, opcode: OpCode) -> Result<(), Error> {
        match opcode {
            OpCode::_00E0             => self.clear_screen(),
            OpCode::_00EE             => self.subroutine_return(),
            OpCode::_1NNN { nnn }     => self.jump_to(nnn),
            OpCode::_2NNN { nnn }     => self.exec_subroutine_at(nnn),
            OpCode::_3XNN { x, nn }   => self.skip_if_vx_eq_nn(x, nn),
            OpCode::_4XNN { x, nn }   => self.skip_if_vx_ne_nn(x, nn),
            OpCode::_5XY0 { x, y }    => self.skip_if_vx_eq_vy(x, y),
            OpCode::_6XNN { x, nn }   => self.assign_vx_nn(x, nn),
            OpCode::_7XNN { x, nn }   => self.assign_add_vx_nn(x, nn),
            OpCode::_8XY0 { x, y }    => self.assign_vx_vy(x, y),
            OpCode::_8XY1 { x, y }    => self.assign_or_vx_vy(x, y),
            OpCode::_8XY2 { x, y }    => self.assign_and_vx_vy(x, y),
            OpCode::_8XY3 { x, y }    => self.assign_xor_vx_vy(x, y),
            OpCode::_8XY4 { x, y }    => self.assign_add_vx_vy(x, y),
            OpCode::_8XY5 { x, y }    => self.assign_sub_vx_vy(x, y),
            OpCode::_8XY6 { x, .. }   => self.assign_vx_shifted_r(x),
            OpCode::_8XY7 { x, y }    => self.assign_vx_vy_sub_vx(x, y),
            OpCode::_8XYE { x, .. }   => self.assign_vx_shifted_l(x),
            OpCode::_9XY0 { x, y }    => self.skip_if_vx_ne_vy(x, y),
            OpCode::_ANNN { nnn }     => self.assign_i_nnn(nnn),
            OpCode::_BNNN { nnn }     => self.jump_to_nnn_add_v0(nnn),
            OpCode::_CXNN { x, nn }   => self.assign_vx_random_and_nn(x, nn),
            OpCode::_DXYN { x, y, n } => self.draw_n_at_vx_vy(x, y, n),
            OpCode::_EX9E { x }       => self.skip_if_vx_in_keys(x),
            OpCode::_EXA1 { x }       => self.skip_if_vx_not_in_keys(x),
            OpCode::_FX07 { x }       => self.assign_vx_delay_t(x),
            OpCode::_FX0A { x }       => self.assign_vx_wait_for_key(x),
            OpCode::_FX15 { x }       => self.assign_delay_t_vx(x),
            OpCode::_FX18 { x }       => self.assign_sound_t_vx(x),
            OpCode::_FX1E { x }       => self.assign_add_i_vx(x),
            OpCode::_FX29 { x }       => self.assign_i_addr_of_sprite_vx(x),
            OpCode::_FX33 { x }       => self.assign_mem_at_i_bcd_of_vx(x),
            OpCode::_FX55 { .. }      => self.assign_mem_at_i_registers(),
            OpCode::_FX65 { .. }      => self.assign_registers_mem_at_i(),
        }
    }

    fn vx(&self, x: u8) -> u16 {
        self.v[x as usize]
    }

    /// Clear the screen
    /// 00E0,
    fn clear_screen(&mut self) -> Result<(), Error> {
        self.frame.clear();
        Ok(())
    }

    /// Return from a subroutine
    /// 00EE,
    fn subroutine_return(&mut self) -> Result<(), Error> {
        self.stack
            .pop()
            .ok_or(Error::StackUnderflow)
            .map(|addr| self.pc = addr)
    }

    /// Jump to address NNN
    /// 1NNN { nnn: u16 },
    fn jump_to(&mut self, nnn: u16) -> Result<(), Error> {
        self.pc = nnn;
        Ok(())
    }

    /// Execute subroutine starting at address NNN
    /// 2NNN { nnn: u16 },
    fn exec_subroutine_at(&mut self, nnn: u16) -> Result<(), Error> {
        self.stack
            .push(self.pc)
            .map_err(|_| Error::StackOverflow { target: nnn })
            .map(|_| self.pc = nnn)
    }

    /// Skip the following instruction if the value of register VX equals NN
    /// 3XNN { x: u8, nn: u8 },
    fn skip_if_vx_eq_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        if self.vx(x) == nn as u16 {
            self.skip();
        }
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is not equal to NN
    /// 4XNN { x: u8, nn: u8 },
    fn skip_if_vx_ne_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        if self.vx(x) != nn as u16 {
            self.skip();
        }
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is equal to the value of register VY
    /// 5XY0 { x: u8, y: u8 },
    fn skip_if_vx_eq_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        if self.vx(x) == self.vx(y) {
            self.skip();
        }
        Ok(())
    }

    /// Store number NN in register VX
    /// 6XNN { x: u8, nn: u8 },
    fn assign_vx_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = nn as u16;
        Ok(())
    }

    /// Add the value NN to register VX
    /// 7XNN { x: u8, nn: u8 },
    fn assign_add_vx_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = self.vx(x).wrapping_add(nn as u16);
        Ok(())
    }

    /// Store the value of register VY in register VX
    /// 8XY0 { x: u8, y: u8 },
    fn assign_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] = self.vx(y);
        Ok(())
    }

    /// Set VX to VX OR VY
    /// 8XY1 { x: u8, y: u8 },
    fn assign_or_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] |= self.vx(y);
        Ok(())
    }

    /// Set VX to VX AND VY
    /// 8XY2 { x: u8, y: u8 },
    fn assign_and_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] &= self.vx(y);
        Ok(())
    }

    /// Set VX to VX XOR VY
    /// 8XY3 { x: u8, y: u8 },
    fn assign_xor_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        self.v[x as usize] ^= self.vx(y);
        Ok(())
    }

    /// Add the value of register VY to register VX, Set VF to 01 if the sum exceeds 0xFF, Set VF to 00 otherwise
    /// 8XY4 { x: u8, y: u8 },
    fn assign_add_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let sum = self.vx(x) as u32 + self.vx(y) as u32;
        self.v[x as usize] = sum as u16;
        self.v[0xF] = (sum > 0xFF) as u16;
        Ok(())
    }

    /// Subtract the value of register VY from register VX, Set VF to 01 if VX was greater than VY, Set VF to 00 otherwise
    /// 8XY5 { x: u8, y: u8 },
    fn assign_sub_vx_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let flag = (self.vx(x) > self.vx(y)) as u16;
        self.v[x as usize] = self.vx(x).wrapping_sub(self.vx(y));
        self.v[0xF] = flag;
        Ok(())
    }

    /// Shift register VX right by one bit
    /// 8XY6 { x: u8, y: u8 },
    fn assign_vx_shifted_r(&mut self, x: u8) -> Result<(), Error> {
        match self.quirks.shift_flag {
            ShiftFlag::Value => {
                let flag = self.vx(x) & 0x01;
                self.v[x as usize] = self.vx(x) >> 1;
                self.v[0xF] = flag;
            }
            // flag lands first, so shifting VF itself shifts the flag
            ShiftFlag::RegisterIndex => {
                self.v[0xF] = x as u16 & 0x01;
                self.v[x as usize] = self.vx(x) >> 1;
            }
        }
        Ok(())
    }

    /// Set register VX to the value of VY minus VX, Set VF to 01 if VY was greater than VX, Set VF to 00 otherwise
    /// 8XY7 { x: u8, y: u8 },
    fn assign_vx_vy_sub_vx(&mut self, x: u8, y: u8) -> Result<(), Error> {
        let flag = (self.vx(y) > self.vx(x)) as u16;
        self.v[x as usize] = self.vx(y).wrapping_sub(self.vx(x));
        self.v[0xF] = flag;
        Ok(())
    }

    /// Shift register VX left by one bit
    /// 8XYE { x: u8, y: u8 },
    fn assign_vx_shifted_l(&mut self, x: u8) -> Result<(), Error> {
        match self.quirks.shift_flag {
            ShiftFlag::Value => {
                let flag = (self.vx(x) >> 7) & 0x01;
                self.v[x as usize] = self.vx(x).wrapping_shl(1);
                self.v[0xF] = flag;
            }
            ShiftFlag::RegisterIndex => {
                self.v[0xF] = x as u16 & 0x80;
                self.v[x as usize] = self.vx(x).wrapping_shl(1);
            }
        }
        Ok(())
    }

    /// Skip the following instruction if the value of register VX is not equal to the value of register VY
    /// 9XY0 { x: u8, y: u8 },
    fn skip_if_vx_ne_vy(&mut self, x: u8, y: u8) -> Result<(), Error> {
        if self.vx(x) != self.vx(y) {
            self.skip();
        }
        Ok(())
    }

    /// Store memory address NNN in register I
    /// ANNN { nnn: u16 },
    fn assign_i_nnn(&mut self, nnn: u16) -> Result<(), Error> {
        self.i = nnn;
        Ok(())
    }

    /// Jump to address NNN + V0
    /// BNNN { nnn: u16 },
    fn jump_to_nnn_add_v0(&mut self, nnn: u16) -> Result<(), Error> {
        let addr = nnn as usize + self.vx(0) as usize;
        if addr < MEM_SIZE {
            self.pc = addr as u16;
            Ok(())
        } else {
            Err(Error::AddressOutOfRange {
                address: addr,
                len: 2,
            })
        }
    }

    /// Set VX to a random number with a mask of NN
    /// CXNN { x: u8, nn: u8 },
    fn assign_vx_random_and_nn(&mut self, x: u8, nn: u8) -> Result<(), Error> {
        self.v[x as usize] = (self.ctx.gen_random() & nn) as u16;
        Ok(())
    }

    /// Draw a sprite at position VX, VY with N bytes of sprite data starting at the address stored in I, Set VF to 01 if any set pixels are changed to unset, and 00 otherwise
    /// DXYN { x: u8, y: u8, n: u8 },
    fn draw_n_at_vx_vy(&mut self, x: u8, y: u8, n: u8) -> Result<(), Error> {
        let sprite = self.memory.slice(self.i as usize, n as usize)?;
        let origin_x = (self.v[x as usize] as usize) % WIDTH;
        let origin_y = (self.v[y as usize] as usize) % HEIGHT;
        self.v[0xF] = 0;
        let mut collision = false;
        for (row, &byte) in sprite.iter().enumerate() {
            collision |= self.frame.xor_row(origin_x, origin_y + row, byte);
        }
        self.v[0xF] = collision as u16;
        Ok(())
    }

    /// Skip the following instruction if the key corresponding to the hex value currently stored in register VX is pressed
    /// EX9E { x: u8 },
    fn skip_if_vx_in_keys(&mut self, x: u8) -> Result<(), Error> {
        if self.keypad.is_pressed(self.vx(x)) {
            self.skip();
        }
        Ok(())
    }

    /// Skip the following instruction if the key corresponding to the hex value currently stored in register VX is not pressed
    /// EXA1 { x: u8 },
    fn skip_if_vx_not_in_keys(&mut self, x: u8) -> Result<(), Error> {
        if !self.keypad.is_pressed(self.vx(x)) {
            self.skip();
        }
        Ok(())
    }

    /// Store the current value of the delay timer in register VX
    /// FX07 { x: u8 },
    fn assign_vx_delay_t(&mut self, x: u8) -> Result<(), Error> {
        self.v[x as usize] = self.delay_timer.load() as u16;
        Ok(())
    }

    /// Wait for a keypress and store the result in register VX
    /// FX0A { x: u8 },
    ///
    /// Only arms the keypad, the key is stored by `step` once it arrives.
    /// Until then pc is held on this instruction.
    fn assign_vx_wait_for_key(&mut self, x: u8) -> Result<(), Error> {
        self.keypad.start_waiting(x);
        self.pc -= 2;
        Ok(())
    }

    /// Set the delay timer to the value of register VX
    /// FX15 { x: u8 },
    fn assign_delay_t_vx(&mut self, x: u8) -> Result<(), Error> {
        self.delay_timer.store(self.vx(x) as u8);
        Ok(())
    }

    /// Set the sound timer to the value of register VX
    /// FX18 { x: u8 },
    fn assign_sound_t_vx(&mut self, x: u8) -> Result<(), Error> {
        self.sound_timer.store(self.vx(x) as u8);
        Ok(())
    }

    /// Add the value stored in register VX to register I
    /// FX1E { x: u8 },
    fn assign_add_i_vx(&mut self, x: u8) -> Result<(), Error> {
        let addr = self.i as usize + self.vx(x) as usize;
        if addr < MEM_SIZE {
            self.i = addr as u16;
            Ok(())
        } else {
            Err(Error::AddressOutOfRange {
                address: addr,
                len: 1,
            })
        }
    }

    /// Set I to the memory address of the sprite data corresponding to the hexadecimal digit stored in register VX
    /// FX29 { x: u8 },
    fn assign_i_addr_of_sprite_vx(&mut self, x: u8) -> Result<(), Error> {
        self.i = Memory::glyph_addr(self.vx(x));
        Ok(())
    }

    /// Store the hundreds, tens and ones of the operand at addresses I, I+1, and I+2
    /// FX33 { x: u8 },
    fn assign_mem_at_i_bcd_of_vx(&mut self, x: u8) -> Result<(), Error> {
        let value = match self.quirks.bcd_operand {
            BcdOperand::Value => self.vx(x),
            BcdOperand::RegisterIndex => x as u16,
        };
        let digits = [
            (value / 100 % 10) as u8,
            (value / 10 % 10) as u8,
            (value % 10) as u8,
        ];
        self.memory
            .slice_mut(self.i as usize, digits.len())?
            .copy_from_slice(&digits);
        Ok(())
    }

    /// Store the low bytes of all sixteen registers in memory starting at address I
    /// FX55 { x: u8 },
    fn assign_mem_at_i_registers(&mut self) -> Result<(), Error> {
        let bytes = self.v.map(|reg| reg as u8);
        self.memory
            .slice_mut(self.i as usize, bytes.len())?
            .copy_from_slice(&bytes);
        Ok(())
    }

    /// Fill all sixteen registers with the values stored in memory starting at address I
    /// FX65 { x: u8 },
    fn assign_registers_mem_at_i(&mut self) -> Result<(), Error> {
        let bytes = self.memory.slice(self.i as usize, self.v.len())?;
        self.v
            .iter_mut()
            .zip(bytes)
            .for_each(|(reg, &byte)| *reg = byte as u16);
        Ok(())
    }
}


#[cfg(test)]
mod key_wait_tests {
    use super::*;
    use crate::context::testing::TestingContext;

    #[test]
    fn wait_for_key_holds_pc_until_press() {
        let mut chip = Chip::new(TestingContext::new(0), Quirks::default());
        chip.load(&[0xF3, 0x0A, 0x60, 0x01]).unwrap();

        for _ in 0..5 {
            assert_eq!(chip.tick(), Err(nb::Error::WouldBlock));
            assert_eq!(chip.pc, 0x200);
            assert_eq!(chip.key_wait(), KeyWait::Waiting { x: 3 });
        }

        chip.set_key(0xB, true).unwrap();
        assert_eq!(chip.tick(), Ok(OpCode::_FX0A { x: 3 }));
        assert_eq!(chip.v[3], 0x0B);
        assert_eq!(chip.pc, 0x202);
        assert_eq!(chip.key_wait(), KeyWait::Idle);

        assert_eq!(chip.tick(), Ok(OpCode::_6XNN { x: 0, nn: 0x01 }));
    }

    #[test]
    fn release_does_not_end_wait() {
        let mut chip = Chip::new(TestingContext::new(0), Quirks::default());
        chip.load(&[0xF0, 0x0A]).unwrap();
        chip.set_key(0x4, true).unwrap();
        assert_eq!(chip.tick(), Err(nb::Error::WouldBlock));

        // key held before the wait started doesn't count, neither does its release
        chip.set_key(0x4, false).unwrap();
        assert_eq!(chip.tick(), Err(nb::Error::WouldBlock));
        assert_eq!(chip.pc, 0x200);
    }
}
