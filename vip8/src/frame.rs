use std::fmt;

use bitvec::prelude::*;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub(crate) const MEM_LENGTH: usize = WIDTH * HEIGHT / 8;

/// Monochrome 64x32 frame of the machine's display
///
/// Internally, the data is stored in a form of concatenating rows from top to bottom of the frame.
/// Rows are represented as an individual bits of continuous memory, matching the state of pixels
/// from left to the right.
///
/// Pixels are addressed by `(x, y)`, `x` being the column and `y` the row.
/// A `Frame` handed out by the interpreter is an owned copy, taking it never
/// blocks the machine for longer than a memcpy.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame([u8; MEM_LENGTH]);

impl Frame {
    pub(crate) fn new() -> Self {
        Self([0; MEM_LENGTH])
    }

    /// View the raw memory of a frame, 8 bytes per row, most significant bit leftmost
    pub fn as_raw(&self) -> &[u8] {
        &self.0
    }

    /// Access frame's pixels by indexes, `None` when outside of the frame
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        if x >= WIDTH {
            return None;
        }
        self.iter_rows().nth(y).and_then(|row| row.get(x).map(|bit| *bit))
    }

    /// Get iterator over rows in a form of a `BitSlice`s
    pub fn iter_rows(&self) -> impl Iterator<Item = &BitSlice<u8, Msb0>> {
        self.0.chunks(WIDTH / 8).map(|row| row.view_bits::<Msb0>())
    }

    /// Column-major copy of the frame, indexed as `[x][y]`
    pub fn to_columns(&self) -> [[bool; HEIGHT]; WIDTH] {
        let mut columns = [[false; HEIGHT]; WIDTH];
        for (y, row) in self.iter_rows().enumerate() {
            for (x, lit) in row.iter().by_vals().enumerate() {
                columns[x][y] = lit;
            }
        }
        columns
    }

    /// Number of lit pixels
    pub fn lit(&self) -> usize {
        self.0.view_bits::<Msb0>().count_ones()
    }

    pub fn is_clear(&self) -> bool {
        self.0.iter().all(|&byte| byte == 0)
    }

    pub(crate) fn clear(&mut self) {
        self.0 = [0; MEM_LENGTH];
    }

    /// XOR one sprite row onto the frame with its leftmost pixel at `(x, y)`
    ///
    /// The row is cut at the right edge and rows past the bottom edge are
    /// dropped entirely. Returns whether a lit pixel was switched off.
    pub(crate) fn xor_row(&mut self, x: usize, y: usize, sprite: u8) -> bool {
        let row = match self.iter_rows_mut().nth(y) {
            Some(row) => row,
            None => return false,
        };
        let mut collision = false;
        for (offset, bit) in sprite.view_bits::<Msb0>().iter().by_vals().enumerate() {
            let px = x + offset;
            if px >= WIDTH {
                break;
            }
            if bit {
                let lit = row[px];
                collision |= lit;
                row.set(px, !lit);
            }
        }
        collision
    }

    fn iter_rows_mut(&mut self) -> impl Iterator<Item = &mut BitSlice<u8, Msb0>> {
        self.0
            .chunks_mut(WIDTH / 8)
            .map(|row| row.view_bits_mut::<Msb0>())
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// One line per row, `#` for lit pixels and `.` for dark ones
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.iter_rows() {
            for lit in row.iter().by_vals() {
                f.write_str(if lit { "#" } else { "." })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n{}", self)
    }
}

#[cfg(test)]
impl Frame {
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
