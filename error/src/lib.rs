/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the security engine crates for
    error handling.

--*/
#![cfg_attr(not(any(feature = "std", test)), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Security Engine Error Type
///
/// Error codes are laid out as `CCCC_KIII`:
///
/// * `CCCC` - component that raised the error
/// * `K`    - error class, see [`ErrorKind`]
/// * `III`  - index within the component and class
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SeError(pub NonZeroU32);

/// Error classes shared by every component.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorKind {
    /// Caller contract violated; detected before touching hardware.
    InvalidArgs = 1,

    /// Internal or session state does not permit the request.
    BadState = 2,

    /// Valid request that this build or this hardware does not support.
    NotSupported = 3,

    /// Authentication failure.
    NotValid = 4,

    /// Scratch allocation failure.
    NoMemory = 5,

    /// Opaque hardware wait or operation failure.
    EngineFailure = 6,
}

impl ErrorKind {
    const fn from_u32(val: u32) -> Option<Self> {
        match val {
            1 => Some(Self::InvalidArgs),
            2 => Some(Self::BadState),
            3 => Some(Self::NotSupported),
            4 => Some(Self::NotValid),
            5 => Some(Self::NoMemory),
            6 => Some(Self::EngineFailure),
            _ => None,
        }
    }
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: SeError = SeError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl SeError {
    /// Create an error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get a SeError from a u32 is to
    /// use `SeError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("SeError cannot be 0"),
        }
    }

    /// Component field of the error code.
    pub const fn component(&self) -> u16 {
        (self.0.get() >> 16) as u16
    }

    /// Error class of the error code, `None` for codes that were not
    /// produced by this crate.
    pub const fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_u32((self.0.get() >> 12) & 0xf)
    }

    /// Returns true if the error belongs to `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    define_error_constants![
        // Engine interface (0x0001)
        (
            ENGINE_INVALID_ALIGNMENT,
            0x0001_1001,
            "Engine Error: scratch alignment is not a power of two"
        ),
        (ENGINE_BUSY, 0x0001_2001, "Engine Error: engine is busy"),
        (
            ENGINE_MUTEX_NOT_HELD,
            0x0001_2002,
            "Engine Error: mutex released without being held"
        ),
        (
            ENGINE_SCRATCH_EXHAUSTED,
            0x0001_5001,
            "Engine Error: scratch memory exhausted"
        ),
        (
            ENGINE_OPERATION_FAILED,
            0x0001_6001,
            "Engine Error: hardware operation failed"
        ),
        (
            ENGINE_DMA_FAULT,
            0x0001_6002,
            "Engine Error: DMA crossed a physical discontinuity"
        ),
        (
            ENGINE_UNKNOWN_PRESET,
            0x0001_6003,
            "Engine Error: unknown operation preset"
        ),
        // Operand codec (0x0002)
        (
            DRIVER_OPERAND_INVALID_LENGTH,
            0x0002_1001,
            "Driver Error: operand length is not a multiple of the word size"
        ),
        (
            DRIVER_OPERAND_OVERFLOW,
            0x0002_1002,
            "Driver Error: operand has non-zero bits outside of the field"
        ),
        (
            DRIVER_OPERAND_BUFFER_TOO_SMALL,
            0x0002_1003,
            "Driver Error: operand word buffer too small"
        ),
        // PKA (0x0003)
        (
            DRIVER_PKA_INVALID_OPERAND_LENGTH,
            0x0003_1001,
            "Driver Error: PKA operand length invalid"
        ),
        (
            DRIVER_PKA_MISSING_RESULT,
            0x0003_1002,
            "Driver Error: PKA result buffer missing"
        ),
        (
            DRIVER_PKA_ZERO_MODULUS,
            0x0003_1003,
            "Driver Error: PKA modulus is zero"
        ),
        (
            DRIVER_PKA_MISSING_MODULUS,
            0x0003_1004,
            "Driver Error: PKA modulus not supplied and not loaded"
        ),
        (
            DRIVER_PKA_RESULT_TOO_SMALL,
            0x0003_1005,
            "Driver Error: PKA result buffer too small"
        ),
        (
            DRIVER_PKA_WIDTH_MISMATCH,
            0x0003_1006,
            "Driver Error: PKA operand wider than the loaded modulus"
        ),
        (
            DRIVER_PKA_NO_DOUBLE_RESULT,
            0x0003_2001,
            "Driver Error: PKA has no double-width result to move"
        ),
        (
            DRIVER_PKA_UNSUPPORTED_WIDTH,
            0x0003_3001,
            "Driver Error: PKA operand width not supported"
        ),
        (
            DRIVER_PKA_DOUBLE_PRECISION_UNSUPPORTED,
            0x0003_3002,
            "Driver Error: PKA double precision mode not supported"
        ),
        (
            DRIVER_PKA_MOVE_TOO_WIDE,
            0x0003_3003,
            "Driver Error: PKA double-width result exceeds the reducible width"
        ),
        (
            DRIVER_PKA_ENGINE_FAILURE,
            0x0003_6001,
            "Driver Error: PKA operation failed"
        ),
        // RSA (0x0004)
        (
            DRIVER_RSA_INVALID_KEY_SIZE,
            0x0004_1001,
            "Driver Error: RSA key size not supported"
        ),
        (
            DRIVER_RSA_INVALID_INPUT_SIZE,
            0x0004_1002,
            "Driver Error: RSA input size does not match the key size"
        ),
        (
            DRIVER_RSA_OUTPUT_TOO_SMALL,
            0x0004_1003,
            "Driver Error: RSA output buffer too small"
        ),
        (
            DRIVER_RSA_INVALID_EXPONENT,
            0x0004_1004,
            "Driver Error: RSA exponent invalid"
        ),
        (
            DRIVER_RSA_INVALID_MONTGOMERY,
            0x0004_1006,
            "Driver Error: RSA Montgomery constants do not match the key"
        ),
        (
            DRIVER_RSA_KEY_NOT_SET,
            0x0004_2001,
            "Driver Error: RSA operation requested before a key was set"
        ),
        (
            DRIVER_RSA_KEY_KIND_CHANGED,
            0x0004_2002,
            "Driver Error: RSA key material supplied for a resident keyslot"
        ),
        (
            DRIVER_RSA_KEYSLOT_DISABLED,
            0x0004_3001,
            "Driver Error: RSA keyslot loading disabled in this build"
        ),
        // SHA (0x0005)
        (
            DRIVER_SHA_OUTPUT_TOO_SMALL,
            0x0005_1001,
            "Driver Error: SHA digest buffer too small"
        ),
        (
            DRIVER_SHA_INVALID_STATE,
            0x0005_2001,
            "Driver Error: SHA invalid state"
        ),
        (
            DRIVER_SHA_BUFFER_OVERFLOW,
            0x0005_2002,
            "Driver Error: SHA gather buffer already full"
        ),
        (
            DRIVER_SHA_ENGINE_FAILURE,
            0x0005_6001,
            "Driver Error: SHA operation failed"
        ),
        // AES (0x0006)
        (
            DRIVER_AES_INVALID_KEY_SIZE,
            0x0006_1001,
            "Driver Error: AES key size invalid"
        ),
        (
            DRIVER_AES_INVALID_LENGTH,
            0x0006_1002,
            "Driver Error: AES data length invalid"
        ),
        (
            DRIVER_AES_OUTPUT_TOO_SMALL,
            0x0006_1003,
            "Driver Error: AES output buffer too small"
        ),
        (
            DRIVER_AES_NOT_CONTIGUOUS,
            0x0006_1004,
            "Driver Error: AES asynchronous buffers must be physically contiguous"
        ),
        (
            DRIVER_AES_ENGINE_FAILURE,
            0x0006_6001,
            "Driver Error: AES operation failed"
        ),
        // GCM (0x0007)
        (
            DRIVER_GCM_INVALID_TAG_LENGTH,
            0x0007_1001,
            "Driver Error: GCM tag length invalid"
        ),
        (
            DRIVER_GCM_AAD_AFTER_DATA,
            0x0007_1002,
            "Driver Error: GCM additional data supplied after text"
        ),
        (
            DRIVER_GCM_OUTPUT_TOO_SMALL,
            0x0007_1003,
            "Driver Error: GCM output buffer too small"
        ),
        (
            DRIVER_GCM_TAG_DIRECTION_MISMATCH,
            0x0007_1004,
            "Driver Error: GCM tag argument does not match the direction"
        ),
        (
            DRIVER_GCM_DATA_TOO_LONG,
            0x0007_1005,
            "Driver Error: GCM message length limit exceeded"
        ),
        (
            DRIVER_GCM_KEY_NOT_SET,
            0x0007_2001,
            "Driver Error: GCM key not set"
        ),
        (
            DRIVER_GCM_KEY_KIND_CHANGED,
            0x0007_2002,
            "Driver Error: GCM key kind changed within a session"
        ),
        (
            DRIVER_GCM_INVALID_STATE,
            0x0007_2003,
            "Driver Error: GCM invalid state"
        ),
        (
            DRIVER_GCM_UNSUPPORTED_NONCE_LENGTH,
            0x0007_3001,
            "Driver Error: GCM nonce length not supported"
        ),
        (
            DRIVER_GCM_TAG_MISMATCH,
            0x0007_4001,
            "Driver Error: GCM tag mismatch"
        ),
        // CCM (0x0008)
        (
            DRIVER_CCM_INVALID_NONCE_LENGTH,
            0x0008_1001,
            "Driver Error: CCM nonce length invalid"
        ),
        (
            DRIVER_CCM_INVALID_TAG_LENGTH,
            0x0008_1002,
            "Driver Error: CCM tag length invalid"
        ),
        (
            DRIVER_CCM_PAYLOAD_TOO_LONG,
            0x0008_1003,
            "Driver Error: CCM payload length not representable"
        ),
        (
            DRIVER_CCM_LENGTH_MISMATCH,
            0x0008_1004,
            "Driver Error: CCM data length differs from the declared length"
        ),
        (
            DRIVER_CCM_OUTPUT_TOO_SMALL,
            0x0008_1005,
            "Driver Error: CCM output buffer too small"
        ),
        (
            DRIVER_CCM_AAD_TOO_LONG,
            0x0008_1006,
            "Driver Error: CCM additional data length not representable"
        ),
        (
            DRIVER_CCM_UPDATE_NOT_ALLOWED,
            0x0008_2001,
            "Driver Error: CCM sessions are single shot"
        ),
        (
            DRIVER_CCM_KEY_NOT_SET,
            0x0008_2002,
            "Driver Error: CCM key not set"
        ),
        (
            DRIVER_CCM_KEY_KIND_CHANGED,
            0x0008_2003,
            "Driver Error: CCM key kind changed within a session"
        ),
        (
            DRIVER_CCM_INVALID_STATE,
            0x0008_2004,
            "Driver Error: CCM invalid state"
        ),
        (
            DRIVER_CCM_TAG_MISMATCH,
            0x0008_4001,
            "Driver Error: CCM tag mismatch"
        ),
        // Keyslots (0x0009)
        (
            DRIVER_KEYSLOT_INVALID_INDEX,
            0x0009_1001,
            "Driver Error: keyslot index out of range"
        ),
        (
            DRIVER_KEYSLOT_IN_USE,
            0x0009_2001,
            "Driver Error: keyslot already checked out"
        ),
        (
            DRIVER_KEYSLOT_NOT_CHECKED_OUT,
            0x0009_2002,
            "Driver Error: keyslot returned without being checked out"
        ),
        (
            DRIVER_KEYSLOT_WRITE_FAILURE,
            0x0009_6001,
            "Driver Error: keyslot write failed"
        ),
        (
            DRIVER_KEYSLOT_CLEAR_FAILURE,
            0x0009_6002,
            "Driver Error: keyslot clear failed"
        ),
        // Sessions (0x000A)
        (
            DRIVER_SESSION_TAG_REQUIRED,
            0x000A_1001,
            "Driver Error: GCM finalization requires a tag"
        ),
        (
            DRIVER_SESSION_TAG_NOT_APPLICABLE,
            0x000A_1002,
            "Driver Error: tag supplied to a session without one"
        ),
        (
            DRIVER_SESSION_ALGORITHM_MISMATCH,
            0x000A_2001,
            "Driver Error: session algorithm does not match the request"
        ),
        (
            DRIVER_SESSION_EMPTY,
            0x000A_2002,
            "Driver Error: session not initialized"
        ),
        (
            DRIVER_SESSION_OPERATION_NOT_SUPPORTED,
            0x000A_3001,
            "Driver Error: operation not supported by the session algorithm"
        ),
        // Known answer tests (0x000B)
        (
            KAT_SHA256_DIGEST_MISMATCH,
            0x000B_6001,
            "KAT Error: SHA-256 digest mismatch"
        ),
        (
            KAT_SHA384_DIGEST_MISMATCH,
            0x000B_6002,
            "KAT Error: SHA-384 digest mismatch"
        ),
        (
            KAT_GCM_CIPHERTEXT_MISMATCH,
            0x000B_6003,
            "KAT Error: AES-GCM ciphertext mismatch"
        ),
        (
            KAT_GCM_TAG_MISMATCH,
            0x000B_6004,
            "KAT Error: AES-GCM tag mismatch"
        ),
        (
            KAT_GCM_PLAINTEXT_MISMATCH,
            0x000B_6005,
            "KAT Error: AES-GCM plaintext mismatch"
        ),
        (
            KAT_CCM_CIPHERTEXT_MISMATCH,
            0x000B_6006,
            "KAT Error: AES-CCM ciphertext mismatch"
        ),
        (
            KAT_CCM_PLAINTEXT_MISMATCH,
            0x000B_6007,
            "KAT Error: AES-CCM plaintext mismatch"
        ),
        (
            KAT_RSA_MODEXP_MISMATCH,
            0x000B_6008,
            "KAT Error: RSA modular exponentiation mismatch"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::SeError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::SeError(val)
    }
}

impl From<SeError> for core::num::NonZeroU32 {
    fn from(val: SeError) -> Self {
        val.0
    }
}

impl From<SeError> for u32 {
    fn from(val: SeError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for SeError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(SeError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type SeResult<T> = Result<T, SeError>;
