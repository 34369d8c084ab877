/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the security engine Known Answer Tests.

--*/

#![no_std]

mod aes256gcm_kat;
mod ccm_kat;
mod rsa_kat;
mod sha256_kat;
mod sha384_kat;

pub use aes256gcm_kat::Aes256GcmKat;
pub use ccm_kat::Aes128CcmKat;
pub use rsa_kat::Rsa2048Kat;
pub use se_drivers::{SeError, SeResult};
pub use sha256_kat::Sha256Kat;
pub use sha384_kat::Sha384Kat;

use se_drivers::{SeHal, SecurityEngine};

/// Run every known answer test, stopping at the first failure.
pub fn execute_all<H: SeHal>(se: &mut SecurityEngine<H>) -> SeResult<()> {
    Sha256Kat::default().execute(se)?;
    Sha384Kat::default().execute(se)?;
    Aes256GcmKat::default().execute(se)?;
    Aes128CcmKat::default().execute(se)?;
    Rsa2048Kat::default().execute(se)?;
    Ok(())
}
