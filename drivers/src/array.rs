/*++

Licensed under the Apache-2.0 license.

File Name:

    array.rs

Abstract:

    File contains common array definitions used to move word arrays
    between software and engine register windows.

--*/

use crate::engine::EngineGuard;
use crate::hal::SeHal;
use zeroize::Zeroize;

macro_rules! array4 {
    ($dim: literal) => {
        paste::paste! {
             pub const [<ARRAY_4X $dim _BYTE_SIZE>]: usize = $dim * core::mem::size_of::<u32>();
             pub const [<ARRAY_4X $dim _WORD_SIZE>]: usize = $dim ;

             #[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Zeroize)]
             pub struct [<Array4x $dim>](pub [u32; [<ARRAY_4X $dim _WORD_SIZE>]]);

             impl From<[u8; [<ARRAY_4X $dim _BYTE_SIZE>]]> for [<Array4x $dim>] {
                 #[inline(never)]
                 fn from(value: [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]) -> Self {
                     Self::from(&value)
                 }
             }

             impl<'a> From<&'a [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]> for [<Array4x $dim>] {
                 #[inline(never)]
                 fn from(value: &'a [u8; [<ARRAY_4X $dim _BYTE_SIZE>]]) -> Self {
                     let mut result = [<Array4x $dim>]([0u32; [<ARRAY_4X $dim _WORD_SIZE>]]);
                     for (word, chunk) in result.0.iter_mut().zip(value.chunks_exact(4)) {
                         *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                     }
                     result
                 }
             }

             impl From<[<Array4x $dim>]> for [u8; [<ARRAY_4X $dim _BYTE_SIZE>]] {
                 #[inline(never)]
                 fn from(value: [<Array4x $dim>]) -> Self {
                     let mut result = [0u8; [<ARRAY_4X $dim _BYTE_SIZE>]];
                     for (chunk, word) in result.chunks_exact_mut(4).zip(value.0.iter()) {
                         chunk.copy_from_slice(&word.to_be_bytes());
                     }
                     result
                 }
             }

             impl From<[u32; [<ARRAY_4X $dim _WORD_SIZE>]]> for [<Array4x $dim>] {
                 #[inline(never)]
                 fn from(value: [u32; [<ARRAY_4X $dim _WORD_SIZE>]]) -> Self {
                     [<Array4x $dim>](value)
                 }
             }

             impl From<[<Array4x $dim>]> for [u32; [<ARRAY_4X $dim _WORD_SIZE>]] {
                 #[inline(never)]
                 fn from(value: [<Array4x $dim>]) -> Self {
                     value.0
                 }
             }

             impl [<Array4x $dim>] {
                 /// Read consecutive registers starting at `offset`.
                 #[inline(never)]
                 #[allow(unused)]
                 pub(crate) fn read_regs<H: SeHal>(guard: &mut EngineGuard<'_, H>, offset: u32) -> Self {
                     let mut result = [0u32; [<ARRAY_4X $dim _WORD_SIZE>]];
                     for (i, word) in result.iter_mut().enumerate() {
                         *word = guard.read(offset + (i * 4) as u32);
                     }
                     Self(result)
                 }

                 /// Write consecutive registers starting at `offset`.
                 #[inline(never)]
                 #[allow(unused)]
                 pub(crate) fn write_regs<H: SeHal>(&self, guard: &mut EngineGuard<'_, H>, offset: u32) {
                     for (i, word) in self.0.iter().enumerate() {
                         guard.write(offset + (i * 4) as u32, *word);
                     }
                 }
             }
        }
    };
}

array4!(4);
array4!(8);
array4!(16);
