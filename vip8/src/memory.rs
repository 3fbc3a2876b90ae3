use log::debug;

use crate::error::{Error, LoadError};

/// Size of the address space
pub const MEM_SIZE: usize = 4096;
/// Where programs are loaded and where the program counter starts
pub const PROGRAM_START: u16 = 0x200;
/// Where the hexadecimal glyphs are baked in
pub const FONT_START: u16 = 0x020;
/// Bytes per glyph
pub const GLYPH_HEIGHT: u16 = 5;

const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Flat 4K byte store
///
/// 0x000-0x1FF is reserved for the interpreter and holds the glyphs at
/// `FONT_START`, programs live from `PROGRAM_START` up. Program logic can
/// read anywhere but only write above the reserved area.
pub struct Memory(Box<[u8; MEM_SIZE]>);

impl Memory {
    pub fn new() -> Self {
        let mut bytes = Box::new([0u8; MEM_SIZE]);
        let font = FONT_START as usize;
        bytes[font..font + FONT.len()].copy_from_slice(&FONT);
        Self(bytes)
    }

    /// Load program from slice of bytes to memory from 0x200 (_start address)
    pub fn load(&mut self, prog: &[u8]) -> Result<(), LoadError> {
        let start = PROGRAM_START as usize;
        let capacity = MEM_SIZE - start;
        if prog.len() > capacity {
            return Err(LoadError::RomTooLarge {
                size: prog.len(),
                capacity,
            });
        }
        self.0[start..start + prog.len()].copy_from_slice(prog);
        debug!("loaded {} byte program at {:#05X}", prog.len(), start);
        Ok(())
    }

    /// Big-endian instruction word at `addr`
    pub fn word(&self, addr: u16) -> Result<u16, Error> {
        let bytes = self.slice(addr as usize, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], Error> {
        Self::check_range(addr, len)?;
        Ok(&self.0[addr..addr + len])
    }

    /// Writable window for program logic, refused inside the reserved area
    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], Error> {
        Self::check_range(addr, len)?;
        if addr < PROGRAM_START as usize {
            return Err(Error::ReservedWrite { address: addr, len });
        }
        Ok(&mut self.0[addr..addr + len])
    }

    /// Address of the glyph for hexadecimal `digit`, only its low nibble counts
    pub fn glyph_addr(digit: u16) -> u16 {
        FONT_START + GLYPH_HEIGHT * (digit & 0x000F)
    }

    fn check_range(addr: usize, len: usize) -> Result<(), Error> {
        if addr + len <= MEM_SIZE {
            Ok(())
        } else {
            Err(Error::AddressOutOfRange { address: addr, len })
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Memory {
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}
