/*++

Licensed under the Apache-2.0 license.

File Name:

    operand.rs

Abstract:

    File contains the operand codec: conversions between caller byte
    strings of either endianness and engine register words (word 0 least
    significant).

--*/

use crate::{SeError, SeResult};

/// Engine word size in bytes
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// Byte order of a caller operand
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Endian {
    Big,
    Little,
}

/// Read-only big number operand
#[derive(Debug, Copy, Clone)]
pub struct Operand<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl<'a> Operand<'a> {
    pub const fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self { bytes, endian }
    }

    pub const fn be(bytes: &'a [u8]) -> Self {
        Self::new(bytes, Endian::Big)
    }

    pub const fn le(bytes: &'a [u8]) -> Self {
        Self::new(bytes, Endian::Little)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Length in engine words.
    ///
    /// # Errors
    ///
    /// `DRIVER_OPERAND_INVALID_LENGTH` if the length is not a whole number
    /// of words.
    pub fn word_len(&self) -> SeResult<usize> {
        if self.bytes.len() % WORD_SIZE != 0 {
            return Err(SeError::DRIVER_OPERAND_INVALID_LENGTH);
        }
        Ok(self.bytes.len() / WORD_SIZE)
    }

    pub fn is_zero(&self) -> bool {
        is_zero(self.bytes)
    }

    /// Word `i` counted from the least significant end. The operand must
    /// be word aligned.
    fn word(&self, i: usize) -> u32 {
        let chunk = match self.endian {
            Endian::Big => {
                let end = self.bytes.len() - i * WORD_SIZE;
                &self.bytes[end - WORD_SIZE..end]
            }
            Endian::Little => &self.bytes[i * WORD_SIZE..][..WORD_SIZE],
        };
        let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
        match self.endian {
            Endian::Big => u32::from_be_bytes(word),
            Endian::Little => u32::from_le_bytes(word),
        }
    }
}

/// Writable big number operand
#[derive(Debug)]
pub struct OperandMut<'a> {
    bytes: &'a mut [u8],
    endian: Endian,
}

impl<'a> OperandMut<'a> {
    pub fn new(bytes: &'a mut [u8], endian: Endian) -> Self {
        Self { bytes, endian }
    }

    pub fn be(bytes: &'a mut [u8]) -> Self {
        Self::new(bytes, Endian::Big)
    }

    pub fn le(bytes: &'a mut [u8]) -> Self {
        Self::new(bytes, Endian::Little)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn word_len(&self) -> SeResult<usize> {
        if self.bytes.len() % WORD_SIZE != 0 {
            return Err(SeError::DRIVER_OPERAND_INVALID_LENGTH);
        }
        Ok(self.bytes.len() / WORD_SIZE)
    }
}

/// Encode `value` into `target_words` engine words, zero extending.
///
/// # Errors
///
/// * `DRIVER_OPERAND_INVALID_LENGTH` - value is not word aligned
/// * `DRIVER_OPERAND_BUFFER_TOO_SMALL` - `out` holds fewer than `target_words`
/// * `DRIVER_OPERAND_OVERFLOW` - non-zero words would be truncated
pub fn encode(value: &Operand, target_words: usize, out: &mut [u32]) -> SeResult<()> {
    let words = value.word_len()?;
    let out = out
        .get_mut(..target_words)
        .ok_or(SeError::DRIVER_OPERAND_BUFFER_TOO_SMALL)?;
    out.fill(0);
    for i in 0..words {
        let word = value.word(i);
        match out.get_mut(i) {
            Some(slot) => *slot = word,
            None if word != 0 => return Err(SeError::DRIVER_OPERAND_OVERFLOW),
            None => {}
        }
    }
    Ok(())
}

/// Decode engine words into `out`.
///
/// # Errors
///
/// * `DRIVER_OPERAND_INVALID_LENGTH` - `out` is not word aligned
/// * `DRIVER_OPERAND_OVERFLOW` - `words` has non-zero bits beyond `out`
pub fn decode(words: &[u32], out: &mut OperandMut) -> SeResult<()> {
    let out_words = out.word_len()?;
    if words.iter().skip(out_words).any(|&w| w != 0) {
        return Err(SeError::DRIVER_OPERAND_OVERFLOW);
    }
    let len = out.bytes.len();
    for i in 0..out_words {
        let word = words.get(i).copied().unwrap_or(0);
        match out.endian {
            Endian::Big => {
                let end = len - i * WORD_SIZE;
                out.bytes[end - WORD_SIZE..end].copy_from_slice(&word.to_be_bytes());
            }
            Endian::Little => {
                out.bytes[i * WORD_SIZE..][..WORD_SIZE].copy_from_slice(&word.to_le_bytes());
            }
        }
    }
    Ok(())
}

/// Reverse the byte order of `buf` in place.
pub fn swap_endian(buf: &mut [u8]) {
    buf.reverse();
}

/// Returns true if every byte of `bytes` is zero.
pub fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().fold(0u8, |acc, b| acc | b) == 0
}

/// Number of words of `value` below its most significant non-zero word.
pub fn significant_words(value: &Operand) -> SeResult<usize> {
    let words = value.word_len()?;
    Ok((0..words)
        .rev()
        .find(|&i| value.word(i) != 0)
        .map_or(0, |i| i + 1))
}

/// Pack `value` into a register field `width` bits wide.
///
/// # Errors
///
/// `DRIVER_OPERAND_OVERFLOW` if `value` has bits above `width`.
pub fn field(value: u32, width: u32) -> SeResult<u32> {
    if width < u32::BITS && value >> width != 0 {
        return Err(SeError::DRIVER_OPERAND_OVERFLOW);
    }
    Ok(value)
}
