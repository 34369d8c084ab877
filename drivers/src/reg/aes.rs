/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains register definitions for the AES engine

--*/

use bitfield::bitfield;

/// Configuration Register
pub const CONFIG: u32 = 0x000;

/// Source DMA address
pub const SRC_ADDR_LO: u32 = 0x004;
pub const SRC_ADDR_HI: u32 = 0x008;

/// Destination DMA address
pub const DST_ADDR_LO: u32 = 0x00C;
pub const DST_ADDR_HI: u32 = 0x010;

/// Data length in bytes
pub const DATA_LEN: u32 = 0x014;

/// Key, big-endian words
pub const KEY: u32 = 0x040;
pub const KEY_WORDS: usize = 8;

/// Counter (CTR and GCM) or chaining value (CBC-MAC). Updated by the
/// engine after every operation.
pub const IV: u32 = 0x060;

/// GHASH accumulator. Updated by the engine after GCM operations.
pub const GHASH: u32 = 0x070;

/// Additional data and text lengths in bytes, consumed by the GCM tag
/// operation.
pub const AAD_LEN_LO: u32 = 0x080;
pub const AAD_LEN_HI: u32 = 0x084;
pub const TEXT_LEN_LO: u32 = 0x088;
pub const TEXT_LEN_HI: u32 = 0x08C;

/// Computed GCM tag
pub const TAG: u32 = 0x090;

/// Keyslot programming
pub const KEYSLOT_CTRL: u32 = 0x0C0;
pub const KEYSLOT_KEY: u32 = 0x0E0;

/// Presets
pub const PRESET_START: u32 = 0x1;
pub const PRESET_KEYSLOT_WRITE: u32 = 0x2;
pub const PRESET_KEYSLOT_CLEAR: u32 = 0x3;

/// Mode field encodings
pub const MODE_CTR: u32 = 1;
pub const MODE_CBC_MAC: u32 = 2;
pub const MODE_GCM_AAD: u32 = 3;
pub const MODE_GCM_TEXT: u32 = 4;
pub const MODE_GCM_TAG: u32 = 5;

/// Key size field encodings
pub const KEY_SIZE_128: u32 = 0;
pub const KEY_SIZE_192: u32 = 1;
pub const KEY_SIZE_256: u32 = 2;

bitfield! {
    /// AES Configuration
    #[derive(Default, PartialEq, Eq, Clone, Copy)]
    pub struct AesConfig(u32);

    /// Mode of operation
    pub u32, mode, set_mode: 3, 0;

    /// GCM text direction; the GHASH covers the input when set
    pub decrypt, set_decrypt: 4;

    /// Key size of the register key
    pub u32, key_size, set_key_size: 7, 6;

    /// Take the key from a keyslot instead of the KEY registers
    pub use_keyslot, set_use_keyslot: 8;

    /// Keyslot index
    pub u32, keyslot, set_keyslot: 15, 12;
}

bitfield! {
    /// Keyslot Control
    #[derive(Default, PartialEq, Eq, Clone, Copy)]
    pub struct KeySlotCtrl(u32);

    /// Keyslot index
    pub u32, slot, set_slot: 3, 0;

    /// Key size of the written key
    pub u32, key_size, set_key_size: 5, 4;
}
