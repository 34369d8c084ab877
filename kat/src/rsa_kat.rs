/*++

Licensed under the Apache-2.0 license.

File Name:

    rsa_kat.rs

Abstract:

    File contains the Known Answer Tests (KAT) for RSA-2048 modular exponentiation.

--*/

use se_drivers::{
    Endian, RsaExponent, RsaKey, RsaKeyLoad, RsaSession, SeError, SeHal, SeResult,
    SecurityEngine,
};

// Generated with:
//
// key = rsa.generate_private_key(65537, 2048)
// n = key.private_numbers().public_numbers.n
// m = int.from_bytes(hashlib.sha256(b"abc").digest() * 8, "big") % n
// s = pow(m, key.private_numbers().d, n)

const PUBLIC_EXPONENT: [u8; 4] = [0x00, 0x01, 0x00, 0x01];

const MODULUS: [u8; 256] = [
    0xf0, 0x82, 0xf7, 0xfd, 0x0d, 0x63, 0xdf, 0x4e, 0xc8, 0x42, 0xca, 0x45, 0xd2, 0x12, 0x09, 0x69,
    0x60, 0x48, 0xe5, 0x20, 0x28, 0x2a, 0x93, 0xa8, 0x0e, 0x2a, 0x7c, 0xb1, 0x36, 0x13, 0x10, 0x31,
    0x85, 0x4f, 0xda, 0x45, 0xe7, 0x59, 0xa6, 0x4a, 0x56, 0xb5, 0x10, 0x46, 0x37, 0x74, 0x6e, 0x20,
    0x7d, 0x85, 0x84, 0x96, 0x51, 0x5a, 0x3d, 0x63, 0x49, 0x0e, 0x9a, 0xad, 0x9a, 0x06, 0x50, 0xdc,
    0xc7, 0xc4, 0x86, 0x56, 0x3c, 0xe6, 0x81, 0xb4, 0x3a, 0x8a, 0x62, 0x6b, 0xe9, 0x6d, 0x56, 0xc4,
    0xfb, 0x2c, 0x8e, 0x3b, 0x7a, 0xaa, 0x74, 0x76, 0x7a, 0x88, 0x2f, 0x75, 0xfb, 0xbc, 0xf8, 0xed,
    0x0e, 0x73, 0x2a, 0x6b, 0xc6, 0x90, 0x8a, 0x37, 0xbf, 0xb3, 0x3f, 0xc3, 0x6a, 0x9f, 0xca, 0xe3,
    0x42, 0x47, 0xe1, 0xf0, 0x34, 0x5e, 0x65, 0x5a, 0xec, 0x1a, 0x61, 0x63, 0x31, 0x22, 0xc3, 0x19,
    0xcb, 0x2f, 0x51, 0xa1, 0xa2, 0x9c, 0xdf, 0x19, 0xe6, 0x2e, 0x98, 0xe4, 0x64, 0x61, 0x5b, 0x96,
    0x1b, 0xae, 0x78, 0x7b, 0x3a, 0x33, 0xae, 0x65, 0x71, 0xd3, 0xae, 0x43, 0x5b, 0x43, 0xf4, 0x0f,
    0x30, 0x11, 0x10, 0x97, 0x84, 0xad, 0x62, 0x9b, 0xe1, 0xf7, 0xc6, 0x78, 0x46, 0xa1, 0x17, 0xaa,
    0xa3, 0xcd, 0x6e, 0xc8, 0x5e, 0x79, 0x04, 0xb0, 0xd8, 0x82, 0x91, 0xfe, 0x9b, 0xd0, 0x75, 0x72,
    0xc3, 0xf2, 0x91, 0x85, 0xe2, 0x98, 0x97, 0x9b, 0x8b, 0xe4, 0x79, 0x7b, 0xb9, 0xb7, 0x47, 0xb7,
    0x8c, 0xb0, 0x5f, 0x34, 0xcb, 0x17, 0x1d, 0x55, 0xb0, 0xc5, 0x66, 0xfe, 0xb2, 0x73, 0xdc, 0x8d,
    0x44, 0xbe, 0x44, 0x31, 0x8c, 0x21, 0x7e, 0x57, 0xdb, 0x66, 0x54, 0x8b, 0xab, 0x18, 0xa2, 0xe6,
    0xe6, 0x85, 0x5c, 0x72, 0x1f, 0xf3, 0x68, 0xfb, 0x6d, 0xce, 0x24, 0xd5, 0xc8, 0xa8, 0xd1, 0xf9,
];

const SIGNATURE: [u8; 256] = [
    0x51, 0xc2, 0x18, 0xc1, 0x4c, 0x97, 0x5e, 0x96, 0xe8, 0xfe, 0x13, 0x90, 0x8d, 0x6f, 0x99, 0x28,
    0x07, 0xd6, 0x59, 0x12, 0xb0, 0x3c, 0xf4, 0x8c, 0xd4, 0xab, 0x79, 0xa1, 0x87, 0x4b, 0xab, 0xa5,
    0x19, 0x43, 0xd9, 0x82, 0x6d, 0x61, 0xfc, 0x7d, 0x0f, 0x62, 0x28, 0x58, 0x7b, 0x0d, 0xa0, 0xc6,
    0xd7, 0xbc, 0x98, 0xfa, 0x30, 0x99, 0x6a, 0x16, 0x2e, 0xaa, 0x36, 0x00, 0xd8, 0x51, 0xf4, 0x3e,
    0x35, 0xf5, 0xfd, 0x87, 0xa9, 0x57, 0x11, 0xaa, 0xc0, 0x32, 0x14, 0x75, 0xcc, 0x62, 0xb5, 0x81,
    0xb7, 0x98, 0x7c, 0x1d, 0x6c, 0xd8, 0x1d, 0x24, 0x3d, 0x18, 0x15, 0x8c, 0xf2, 0x28, 0xd3, 0xde,
    0x40, 0x98, 0xc2, 0xc0, 0x81, 0x80, 0xb5, 0x5e, 0x07, 0xa7, 0xe7, 0x89, 0x0f, 0x4b, 0xdc, 0xfa,
    0x98, 0xd0, 0x5c, 0xc1, 0x53, 0x61, 0x79, 0xab, 0xa1, 0x6d, 0x62, 0x89, 0x42, 0x80, 0x71, 0x06,
    0x7b, 0xc0, 0xb8, 0xf7, 0x0f, 0x29, 0x84, 0x76, 0x5f, 0xab, 0x3f, 0x19, 0xf2, 0xb6, 0xd4, 0xd4,
    0x29, 0x75, 0xb3, 0xd6, 0x14, 0x57, 0xb7, 0xb2, 0xa2, 0xe0, 0xc4, 0xd3, 0x79, 0x0c, 0x07, 0x10,
    0xa1, 0xca, 0x68, 0xf5, 0xb5, 0x84, 0xbc, 0xd4, 0xef, 0x95, 0x5c, 0xe3, 0x38, 0xdb, 0xf8, 0xfa,
    0xc5, 0x6c, 0x1f, 0x97, 0xd8, 0xea, 0x93, 0xf4, 0xa5, 0x4c, 0x63, 0x8b, 0x73, 0x4e, 0x8a, 0xa1,
    0xec, 0x4a, 0x27, 0x82, 0xf6, 0x8b, 0xe9, 0x49, 0x5a, 0x89, 0x66, 0x65, 0x50, 0x5a, 0x61, 0x74,
    0xb5, 0x48, 0xfc, 0x00, 0x9d, 0xf6, 0x99, 0x7b, 0xc5, 0x8b, 0x3c, 0x15, 0x3b, 0x09, 0xbe, 0xc5,
    0x99, 0x12, 0x37, 0x4a, 0x3e, 0x9b, 0xb1, 0x96, 0x40, 0x3b, 0x98, 0xd9, 0xf9, 0xb6, 0x97, 0x67,
    0x51, 0xdf, 0x02, 0xf6, 0xc9, 0xe9, 0x46, 0x1e, 0xaa, 0xa4, 0xa9, 0xdb, 0xce, 0xb3, 0xfb, 0x85,
];

const MESSAGE: [u8; 256] = [
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
];

#[derive(Default, Debug)]
pub struct Rsa2048Kat {}

impl Rsa2048Kat {
    /// This function executes the Known Answer Tests (aka KAT) for RSA-2048.
    ///
    /// Test vector source:
    /// Generated with python cryptography
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    ///
    /// # Returns
    ///
    /// * `SeResult` - Result denoting the KAT outcome.
    pub fn execute<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        self.kat_public_exponent(se)
    }

    fn kat_public_exponent<H: SeHal>(&self, se: &mut SecurityEngine<H>) -> SeResult<()> {
        let key = RsaKey {
            modulus: &MODULUS,
            public_exponent: &PUBLIC_EXPONENT,
            private_exponent: None,
            endian: Endian::Big,
        };
        let mut rsa = RsaSession::new(2048, RsaKeyLoad::Direct)?;
        rsa.set_key(&key, RsaExponent::Public)?;

        let mut result = [0u8; 256];
        let status = rsa.exponentiate(se, &SIGNATURE, &mut result);
        rsa.reset();
        status?;

        if result != MESSAGE {
            Err(SeError::KAT_RSA_MODEXP_MISMATCH)?;
        }
        Ok(())
    }
}
