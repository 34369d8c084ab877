/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains register definitions for the security engine. Offsets
    are relative to the register base of each engine.

--*/

pub mod aes;
pub mod pka;
pub mod sha;
