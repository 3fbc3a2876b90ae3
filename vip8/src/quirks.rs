//! Behaviours on which CHIP-8 interpreters disagree.
//!
//! `Quirks::default()` is the conventional machine found in most documentation.
//! `Quirks::legacy()` reproduces three behaviours of an early desktop
//! interpreter: shift flags taken from the register number, `FX33` splitting
//! the register number and registers kept 16 bits wide. Everything else runs
//! the conventional way.

/// Where `8XY6` and `8XYE` take the bit they store in VF from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftFlag {
    /// Bit shifted out of VX
    Value,
    /// `X & 0x01` for right shifts and `X & 0x80` for left shifts, the latter
    /// always being zero
    RegisterIndex,
}

/// What `FX33` splits into decimal digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdOperand {
    /// Content of VX
    Value,
    /// The register number X itself
    RegisterIndex,
}

/// Width every general register is clipped to after each instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    Byte,
    Word,
}

impl RegisterWidth {
    pub fn mask(self) -> u16 {
        match self {
            RegisterWidth::Byte => 0x00FF,
            RegisterWidth::Word => 0xFFFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    pub shift_flag: ShiftFlag,
    pub bcd_operand: BcdOperand,
    pub register_width: RegisterWidth,
}

impl Quirks {
    pub fn legacy() -> Self {
        Self {
            shift_flag: ShiftFlag::RegisterIndex,
            bcd_operand: BcdOperand::RegisterIndex,
            register_width: RegisterWidth::Word,
        }
    }
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            shift_flag: ShiftFlag::Value,
            bcd_operand: BcdOperand::Value,
            register_width: RegisterWidth::Byte,
        }
    }
}
