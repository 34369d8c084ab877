/*++

Licensed under the Apache-2.0 license.

File Name:

    regs.rs

Abstract:

    File contains the register file backing one modelled engine.

--*/

use std::collections::HashMap;

/// Sparse 32-bit register file. Unwritten registers read as zero.
#[derive(Default)]
pub(crate) struct RegFile(HashMap<u32, u32>);

impl RegFile {
    pub fn read(&self, offset: u32) -> u32 {
        self.0.get(&offset).copied().unwrap_or(0)
    }

    pub fn write(&mut self, offset: u32, value: u32) {
        self.0.insert(offset, value);
    }

    /// Two consecutive registers holding a 64-bit value, low word first.
    pub fn read_u64(&self, lo: u32, hi: u32) -> u64 {
        u64::from(self.read(lo)) | (u64::from(self.read(hi)) << 32)
    }

    pub fn read_words(&self, offset: u32, words: &mut [u32]) {
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.read(offset + (i * 4) as u32);
        }
    }

    pub fn write_words(&mut self, offset: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write(offset + (i * 4) as u32, *word);
        }
    }

    /// `N` big-endian words starting at `offset` as bytes.
    pub fn read_be_bytes<const N: usize>(&self, offset: u32) -> [u8; N] {
        let mut result = [0u8; N];
        for (i, chunk) in result.chunks_mut(4).enumerate() {
            let word = self.read(offset + (i * 4) as u32).to_be_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        result
    }

    pub fn write_be_bytes(&mut self, offset: u32, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write(offset + (i * 4) as u32, u32::from_be_bytes(word));
        }
    }

    /// True if every register in `offset..offset + 4 * words` is zero.
    pub fn is_zero(&self, offset: u32, words: usize) -> bool {
        (0..words).all(|i| self.read(offset + (i * 4) as u32) == 0)
    }
}
