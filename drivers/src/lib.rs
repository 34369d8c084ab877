/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the security engine driver library.

--*/

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod aes;
mod array;
mod ccm;
mod engine;
mod gcm;
mod hal;
mod key_slot;
mod operand;
mod pka;
pub mod printer;
pub mod reg;
mod rsa;
mod session;
mod sha;

pub use aes::{ctr, ctr_start, inc32, AesKey, AesPending, Direction, AES_BLOCK_SIZE, AES_MAX_KEY_SIZE};
pub use array::{Array4x16, Array4x4, Array4x8};
pub use ccm::{
    CcmSession, CCM_MAX_NONCE_SIZE, CCM_MAX_TAG_SIZE, CCM_MIN_NONCE_SIZE, CCM_MIN_TAG_SIZE,
};
pub use engine::{
    EngineGuard, PendingOp, SecurityEngine, AES_KEYSLOT_COUNT, PKA_KEYSLOT_COUNT,
};
pub use gcm::{
    GcmSession, GcmTag, GCM_DEFAULT_NONCE, GCM_MAX_TAG_SIZE, GCM_MAX_TEXT_SIZE, GCM_MIN_TAG_SIZE,
    GCM_NONCE_SIZE,
};
pub use hal::{EngineId, ScratchAlloc, ScratchTag, SeHal, SeMemory, SeMutex, SeRegs};
pub use key_slot::{KeySlot, KeySlotId, SlotKind};
pub use operand::{
    decode, encode, field, is_zero, significant_words, swap_endian, Endian, Operand, OperandMut,
    WORD_SIZE,
};
pub use pka::{PkaContext, PkaMode, PkaPrimitive, PKA_MAX_BITS, PKA_MAX_REDUCE_BITS};
pub use rsa::{
    KeySlotField, MontgomeryConstants, RsaExponent, RsaKey, RsaKeyLoad, RsaKeySize, RsaSession,
    RSA_MAX_BYTES,
};
pub use se_error::{ErrorKind, SeError, SeResult};
pub use session::{Session, SessionKey, SessionKind};
pub use sha::{digest, ShaAlg, ShaDigest, ShaDigestOp, ShaPending, SHA_MAX_BLOCK_SIZE, SHA_MAX_DIGEST_SIZE};
