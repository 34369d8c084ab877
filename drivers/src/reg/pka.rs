/*++

Licensed under the Apache-2.0 license.

File Name:

    pka.rs

Abstract:

    File contains register definitions for the public key accelerator

--*/

use bitfield::bitfield;
use bitflags::bitflags;

/// Control Register
pub const CTRL: u32 = 0x000;

/// Result flags of the last operation
pub const FLAGS: u32 = 0x008;

/// Keyslot address and data window
pub const KEYSLOT_ADDR: u32 = 0x010;
pub const KEYSLOT_DATA: u32 = 0x014;

/// Operand banks. Each bank holds four registers of `REG_WORDS` words,
/// word 0 least significant. A double-width result spans two
/// consecutive registers.
pub const BANK_BASE: u32 = 0x1000;
pub const BANK_STRIDE: u32 = 0x800;
pub const REG_STRIDE: u32 = 0x200;
pub const REG_WORDS: usize = 128;
pub const REGS_PER_BANK: u8 = 4;

/// Keyslot layout
pub const KEYSLOT_FIELDS: usize = 4;
pub const KEYSLOT_FIELD_WORDS: usize = REG_WORDS;

/// Presets
pub const PRESET_START: u32 = 0x1;
pub const PRESET_KEYSLOT_COMMIT: u32 = 0x2;

bitfield! {
    /// PKA Control
    #[derive(Default, PartialEq, Eq, Clone, Copy)]
    pub struct PkaCtrl(u32);

    /// Primitive code
    pub u32, primitive, set_primitive: 7, 0;

    /// Operand width
    pub u32, mode, set_mode: 11, 8;

    /// Take exponent, modulus and Montgomery constants from a keyslot
    pub use_keyslot, set_use_keyslot: 12;

    /// Keyslot index
    pub u32, keyslot, set_keyslot: 17, 16;
}

bitfield! {
    /// Keyslot window address
    #[derive(Default, PartialEq, Eq, Clone, Copy)]
    pub struct KeySlotAddr(u32);

    /// Word within the field
    pub u32, word, set_word: 6, 0;

    /// Field within the keyslot
    pub u32, field, set_field: 9, 8;

    /// Keyslot index
    pub u32, slot, set_slot: 13, 12;

    /// Advance `word` after every data write
    pub auto_increment, set_auto_increment: 31;
}

bitflags! {
    /// PKA result flags
    pub struct PkaFlags: u32 {
        /// Operation failed
        const ERROR = 1 << 0;
        /// Operand has no inverse for the modulus
        const NOT_INVERTIBLE = 1 << 1;
        /// Montgomery constants do not belong to the modulus
        const BAD_MONTGOMERY = 1 << 2;
    }
}

/// Operand bank
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bank {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

/// Offset of register `index` of `bank`.
pub const fn operand_reg(bank: Bank, index: u8) -> u32 {
    BANK_BASE + (bank as u32) * BANK_STRIDE + (index as u32) * REG_STRIDE
}
