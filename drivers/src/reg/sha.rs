/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains register definitions for the SHA-2 engine

--*/

use bitfield::bitfield;

/// Configuration Register
pub const CONFIG: u32 = 0x000;

/// Input DMA address (low and high word)
pub const IN_ADDR_LO: u32 = 0x004;
pub const IN_ADDR_HI: u32 = 0x008;

/// Input length in bytes for this operation
pub const IN_LEN: u32 = 0x00C;

/// Total message length in bytes, consumed by the final operation only
pub const MSG_LEN_LO: u32 = 0x010;
pub const MSG_LEN_HI: u32 = 0x014;

/// Hash state. Holds the intermediate state after a non-final operation
/// and the digest after the final one. Writable to restore a saved state.
pub const HASH_RESULT: u32 = 0x100;
pub const HASH_RESULT_WORDS: usize = 16;

/// Start preset
pub const PRESET_START: u32 = 0x1;

/// Algorithm field encodings
pub const ALG_SHA224: u32 = 1;
pub const ALG_SHA256: u32 = 2;
pub const ALG_SHA384: u32 = 3;
pub const ALG_SHA512: u32 = 4;

bitfield! {
    /// SHA Configuration
    #[derive(Default, PartialEq, Eq, Clone, Copy)]
    pub struct ShaConfig(u32);

    /// Hash algorithm
    pub u32, alg, set_alg: 3, 0;

    /// Start from the algorithm's initial hash value instead of HASH_RESULT
    pub init_hash, set_init_hash: 8;

    /// Apply padding using the total message length
    pub last, set_last: 9;
}
