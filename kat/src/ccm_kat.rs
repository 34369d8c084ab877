/*++

Licensed under the Apache-2.0 license.

File Name:

    ccm_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for AES-128-CCM cryptography operations.

--*/

use se_drivers::{CcmSession, Direction, SeError, SeHal, SeResult, SecurityEngine};

// RFC 3610 Packet Vector #1

const KEY: [u8; 16] = [
    0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xcb, 0xcc, 0xcd, 0xce, 0xcf,
];
const NONCE: [u8; 13] = [
    0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x00, 0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5,
];
const AAD: [u8; 8] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
const PT: [u8; 23] = [
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17,
    0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e,
];
const TAG_LEN: usize = 8;

// Ciphertext followed by the tag
const CT: [u8; 31] = [
    0x58, 0x8c, 0x97, 0x9a, 0x61, 0xc6, 0x63, 0xd2, 0xf0, 0x66, 0xd0, 0xc2, 0xc0, 0xf9, 0x89, 0x80,
    0x6d, 0x5f, 0x6b, 0x61, 0xda, 0xc3, 0x84, 0x17, 0xe8, 0xd1, 0x2c, 0xfd, 0xf9, 0x26, 0xe0,
];

#[derive(Default, Debug)]
pub struct Aes128CcmKat {}

impl Aes128CcmKat {
    /// This function executes the Known Answer Tests (aka KAT) for AES-128-CCM.
    ///
    /// Test vector source:
    /// https://www.rfc-editor.org/rfc/rfc3610#section-8
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    ///
    /// # Returns
    ///
    /// * `SeResult` - Result denoting the KAT outcome.
    pub fn execute<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        self.encrypt(se)?;
        self.decrypt(se)
    }

    fn encrypt<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        let mut ccm =
            CcmSession::new(se, Direction::Encrypt, &NONCE, TAG_LEN, AAD.len(), PT.len())?;
        let mut ciphertext = [0u8; 31];
        run(se, &mut ccm, &PT, &mut ciphertext)?;

        if ciphertext != CT {
            Err(SeError::KAT_CCM_CIPHERTEXT_MISMATCH)?;
        }
        Ok(())
    }

    fn decrypt<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        let mut ccm =
            CcmSession::new(se, Direction::Decrypt, &NONCE, TAG_LEN, AAD.len(), PT.len())?;
        let mut plaintext = [0u8; 23];
        run(se, &mut ccm, &CT, &mut plaintext)?;

        if plaintext != PT {
            Err(SeError::KAT_CCM_PLAINTEXT_MISMATCH)?;
        }
        Ok(())
    }
}

/// Key, additional data and payload; the work buffer is returned on
/// every path.
fn run<H: SeHal>(
    se: &mut SecurityEngine<H>,
    ccm: &mut CcmSession<H>,
    input: &[u8],
    output: &mut [u8],
) -> SeResult<usize> {
    let result = ccm
        .set_key((&KEY).into())
        .and_then(|_| ccm.update_aad(&AAD))
        .and_then(|_| ccm.finalize(se, input, output));
    if result.is_err() {
        ccm.reset(se);
    }
    result
}
