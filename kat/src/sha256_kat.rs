/*++

Licensed under the Apache-2.0 license.

File Name:

    sha256_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for SHA-256 cryptography operations.

--*/

use se_drivers::{SeError, SeHal, SeResult, SecurityEngine, ShaAlg, ShaDigestOp};

const SHA256_ABC_DIGEST: [u8; 32] = [
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
];

// Two block message, hashed across calls
const SHA256_TWO_BLOCK_MSG: &[u8] = b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq";
const SHA256_TWO_BLOCK_DIGEST: [u8; 32] = [
    0x24, 0x8d, 0x6a, 0x61, 0xd2, 0x06, 0x38, 0xb8, 0xe5, 0xc0, 0x26, 0x93, 0x0c, 0x3e, 0x60, 0x39,
    0xa3, 0x3c, 0xe4, 0x59, 0x64, 0xff, 0x21, 0x67, 0xf6, 0xec, 0xed, 0xd4, 0x19, 0xdb, 0x06, 0xc1,
];

#[derive(Default, Debug)]
pub struct Sha256Kat {}

impl Sha256Kat {
    /// This function executes the Known Answer Tests (aka KAT) for SHA256.
    ///
    /// Test vector source:
    /// FIPS 180-2 Appendix B
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    ///
    /// # Returns
    ///
    /// * `SeResult` - Result denoting the KAT outcome.
    pub fn execute<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        self.kat_one_shot(se)?;
        self.kat_streaming(se)
    }

    fn kat_one_shot<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        let mut digest = [0u8; 32];
        se_drivers::digest(se, ShaAlg::Sha256, b"abc", &mut digest)?;

        if digest != SHA256_ABC_DIGEST {
            Err(SeError::KAT_SHA256_DIGEST_MISMATCH)?;
        }
        Ok(())
    }

    fn kat_streaming<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        let (head, tail) = SHA256_TWO_BLOCK_MSG.split_at(20);
        let mut op = ShaDigestOp::new(ShaAlg::Sha256);
        op.update(se, head)?;
        let mut digest = [0u8; 32];
        op.finalize(se, tail, &mut digest)?;

        if digest != SHA256_TWO_BLOCK_DIGEST {
            Err(SeError::KAT_SHA256_DIGEST_MISMATCH)?;
        }
        Ok(())
    }
}
