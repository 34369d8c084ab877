/*++

Licensed under the Apache-2.0 license.

File Name:

    ccm.rs

Abstract:

    File contains the AES-CCM session. The whole message is formatted in
    a scratch work buffer; decrypted plaintext stays there until the tag
    has been verified.

--*/

use crate::aes::{AesEngine, AesKey, Direction, StoredKey, AES_BLOCK_SIZE};
use crate::engine::SecurityEngine;
use crate::hal::{ScratchTag, SeHal};
use crate::reg::aes as aes_reg;
use crate::{cprintln, SeError, SeResult};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Shortest nonce in bytes
pub const CCM_MIN_NONCE_SIZE: usize = 7;

/// Longest nonce in bytes
pub const CCM_MAX_NONCE_SIZE: usize = 13;

/// Shortest tag in bytes
pub const CCM_MIN_TAG_SIZE: usize = 4;

/// Longest tag in bytes
pub const CCM_MAX_TAG_SIZE: usize = 16;

/// Work buffer alignment
const WORK_ALIGNMENT: usize = AES_BLOCK_SIZE;

/// Additional data at or above this length uses the six byte length
/// encoding.
const AAD_LONG_THRESHOLD: usize = 0xFF00;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum CcmState {
    /// Work buffer allocated, accepting additional data
    Aad,

    /// Finalized, failed or reset
    Done,
}

/// Work buffer layout: B0, encoded additional data, payload, each
/// padded to whole blocks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Layout {
    aad_prefix: usize,
    payload_offset: usize,
    size: usize,
}

impl Layout {
    fn new(aad_len: usize, payload_len: usize) -> SeResult<Self> {
        let aad_prefix = match aad_len {
            0 => 0,
            len if len < AAD_LONG_THRESHOLD => 2,
            len if u32::try_from(len).is_ok() => 6,
            _ => return Err(SeError::DRIVER_CCM_AAD_TOO_LONG),
        };
        let aad_region = aad_len
            .checked_add(aad_prefix)
            .and_then(pad16)
            .ok_or(SeError::DRIVER_CCM_AAD_TOO_LONG)?;
        let payload_offset = aad_region
            .checked_add(AES_BLOCK_SIZE)
            .ok_or(SeError::DRIVER_CCM_AAD_TOO_LONG)?;
        let size = pad16(payload_len)
            .and_then(|region| region.checked_add(payload_offset))
            .ok_or(SeError::DRIVER_CCM_PAYLOAD_TOO_LONG)?;
        Ok(Self {
            aad_prefix,
            payload_offset,
            size,
        })
    }
}

/// Round up to whole blocks, `None` on overflow.
fn pad16(len: usize) -> Option<usize> {
    Some(len.checked_add(AES_BLOCK_SIZE - 1)? / AES_BLOCK_SIZE * AES_BLOCK_SIZE)
}

/// AES-CCM session
pub struct CcmSession<H: SeHal> {
    direction: Direction,
    key: Option<StoredKey>,
    state: CcmState,
    nonce: [u8; CCM_MAX_NONCE_SIZE],
    nonce_len: usize,
    tag_len: usize,
    aad_len: usize,
    payload_len: usize,
    layout: Layout,

    /// Additional data copied into the work buffer so far
    aad_written: usize,

    work: Option<H::Buffer>,
}

impl<H: SeHal> CcmSession<H> {
    /// Start a session and allocate its work buffer.
    ///
    /// # Arguments
    ///
    /// * `se` - Security engine
    /// * `direction` - Encrypt or decrypt
    /// * `nonce` - 7 to 13 bytes
    /// * `tag_len` - Even, 4 to 16
    /// * `aad_len` - Total additional data length
    /// * `payload_len` - Plaintext length, excluding the tag
    pub fn new(
        se: &mut SecurityEngine<H>,
        direction: Direction,
        nonce: &[u8],
        tag_len: usize,
        aad_len: usize,
        payload_len: usize,
    ) -> SeResult<Self> {
        if !(CCM_MIN_NONCE_SIZE..=CCM_MAX_NONCE_SIZE).contains(&nonce.len()) {
            return Err(SeError::DRIVER_CCM_INVALID_NONCE_LENGTH);
        }
        if !(CCM_MIN_TAG_SIZE..=CCM_MAX_TAG_SIZE).contains(&tag_len) || tag_len % 2 != 0 {
            return Err(SeError::DRIVER_CCM_INVALID_TAG_LENGTH);
        }
        // The length field takes the bytes the nonce leaves free.
        let length_size = AES_BLOCK_SIZE - 1 - nonce.len();
        if length_size < core::mem::size_of::<u64>()
            && (payload_len as u64) >> (8 * length_size) != 0
        {
            return Err(SeError::DRIVER_CCM_PAYLOAD_TOO_LONG);
        }
        let layout = Layout::new(aad_len, payload_len)?;

        let mut work = se
            .hal_mut()
            .get_buffer(ScratchTag::CcmWork, WORK_ALIGNMENT, layout.size)?;
        if work.as_ref().len() < layout.size {
            se.hal_mut().put_buffer(work);
            return Err(SeError::ENGINE_SCRATCH_EXHAUSTED);
        }
        work.as_mut().zeroize();

        let mut session = Self {
            direction,
            key: None,
            state: CcmState::Aad,
            nonce: [0; CCM_MAX_NONCE_SIZE],
            nonce_len: nonce.len(),
            tag_len,
            aad_len,
            payload_len,
            layout,
            aad_written: 0,
            work: Some(work),
        };
        session.nonce[..nonce.len()].copy_from_slice(nonce);
        session.format_header()?;
        Ok(session)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    /// Set or replace the key. The key kind (register or keyslot) cannot
    /// change within a session.
    pub fn set_key(&mut self, key: AesKey) -> SeResult<()> {
        let key = StoredKey::new(key)?;
        if let Some(current) = &self.key {
            if !current.same_kind(&key) {
                return Err(SeError::DRIVER_CCM_KEY_KIND_CHANGED);
            }
        }
        if self.state != CcmState::Aad {
            return Err(SeError::DRIVER_CCM_INVALID_STATE);
        }
        self.key = Some(key);
        Ok(())
    }

    /// Append additional data. The total must match the length given at
    /// initialization by the time the session is finalized.
    pub fn update_aad(&mut self, aad: &[u8]) -> SeResult<()> {
        if self.state != CcmState::Aad {
            return Err(SeError::DRIVER_CCM_INVALID_STATE);
        }
        if self.aad_written + aad.len() > self.aad_len {
            return Err(SeError::DRIVER_CCM_LENGTH_MISMATCH);
        }
        let offset = AES_BLOCK_SIZE + self.layout.aad_prefix + self.aad_written;
        let work = self.work_mut()?;
        work[offset..offset + aad.len()].copy_from_slice(aad);
        self.aad_written += aad.len();
        Ok(())
    }

    /// CCM is single shot; all text goes through [`Self::finalize`].
    pub fn update(&mut self) -> SeResult<usize> {
        Err(SeError::DRIVER_CCM_UPDATE_NOT_ALLOWED)
    }

    /// Encrypt or decrypt the whole payload.
    ///
    /// Encryption writes `ciphertext || tag`. Decryption takes
    /// `ciphertext || tag` and writes the plaintext only after the tag
    /// verifies.
    ///
    /// # Returns
    ///
    /// Number of bytes written to `output`
    pub fn finalize(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize> {
        if self.state != CcmState::Aad {
            return Err(SeError::DRIVER_CCM_INVALID_STATE);
        }
        if self.key.is_none() {
            return Err(SeError::DRIVER_CCM_KEY_NOT_SET);
        }
        if self.aad_written != self.aad_len {
            return Err(SeError::DRIVER_CCM_LENGTH_MISMATCH);
        }
        let (expected_in, produced) = match self.direction {
            Direction::Encrypt => (self.payload_len, self.payload_len + self.tag_len),
            Direction::Decrypt => (self.payload_len + self.tag_len, self.payload_len),
        };
        if input.len() != expected_in {
            return Err(SeError::DRIVER_CCM_LENGTH_MISMATCH);
        }
        if output.len() < produced {
            return Err(SeError::DRIVER_CCM_OUTPUT_TOO_SMALL);
        }

        let result = match self.direction {
            Direction::Encrypt => self.encrypt(se, input, output),
            Direction::Decrypt => self.decrypt(se, input, output),
        };
        self.release(se);
        result.map(|_| produced)
    }

    /// Zero and release the work buffer and clear the session.
    pub fn reset(&mut self, se: &mut SecurityEngine<H>) {
        self.key = None;
        self.release(se);
    }

    fn encrypt(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()> {
        let payload_offset = self.layout.payload_offset;
        let plen = self.payload_len;
        self.work_mut()?[payload_offset..payload_offset + plen].copy_from_slice(input);

        let key = self.key.take().ok_or(SeError::DRIVER_CCM_KEY_NOT_SET)?;
        let a0 = self.counter_block(0);
        let a1 = self.counter_block(1);
        let result = match self.work.as_ref() {
            Some(work) => AesEngine::lock(se, &key).and_then(|mut aes| {
                let mac = Zeroizing::new(cbc_mac(&mut aes, work.as_ref())?);
                aes.set_mode(aes_reg::MODE_CTR, false);
                aes.set_counter(&a1);
                aes.stream(input, Some(&mut output[..plen]))?;
                aes.set_counter(&a0);
                let mut tag = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
                aes.stream(&mac[..], Some(&mut tag[..]))?;
                output[plen..plen + self.tag_len].copy_from_slice(&tag[..self.tag_len]);
                Ok(())
            }),
            None => Err(SeError::DRIVER_CCM_INVALID_STATE),
        };
        self.key = Some(key);
        if result.is_err() {
            output[..plen + self.tag_len].zeroize();
        }
        result
    }

    fn decrypt(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()> {
        let payload_offset = self.layout.payload_offset;
        let plen = self.payload_len;
        let (ciphertext, expected) = input.split_at(plen);

        let key = self.key.take().ok_or(SeError::DRIVER_CCM_KEY_NOT_SET)?;
        let a0 = self.counter_block(0);
        let a1 = self.counter_block(1);
        let tag_len = self.tag_len;
        let result = match self.work.as_mut() {
            Some(work) => AesEngine::lock(se, &key).and_then(|mut aes| {
                let work = work.as_mut();
                aes.set_mode(aes_reg::MODE_CTR, false);
                aes.set_counter(&a1);
                aes.stream(
                    ciphertext,
                    Some(&mut work[payload_offset..payload_offset + plen]),
                )?;
                let mac = Zeroizing::new(cbc_mac(&mut aes, work)?);
                aes.set_mode(aes_reg::MODE_CTR, false);
                aes.set_counter(&a0);
                let mut tag = Zeroizing::new([0u8; AES_BLOCK_SIZE]);
                aes.stream(&mac[..], Some(&mut tag[..]))?;
                let valid = bool::from(tag[..tag_len].ct_eq(expected));
                if !valid {
                    cprintln!("[ccm] tag mismatch");
                    return Err(SeError::DRIVER_CCM_TAG_MISMATCH);
                }
                output[..plen].copy_from_slice(&work[payload_offset..payload_offset + plen]);
                Ok(())
            }),
            None => Err(SeError::DRIVER_CCM_INVALID_STATE),
        };
        self.key = Some(key);
        result
    }

    /// Write B0 and the additional data length encoding.
    fn format_header(&mut self) -> SeResult<()> {
        let length_size = AES_BLOCK_SIZE - 1 - self.nonce_len;
        let mut flags = (((self.tag_len - 2) / 2) << 3) as u8 | (length_size - 1) as u8;
        if self.aad_len > 0 {
            flags |= 1 << 6;
        }
        let mut b0 = [0u8; AES_BLOCK_SIZE];
        b0[0] = flags;
        b0[1..1 + self.nonce_len].copy_from_slice(&self.nonce[..self.nonce_len]);
        let len = (self.payload_len as u64).to_be_bytes();
        b0[1 + self.nonce_len..].copy_from_slice(&len[len.len() - length_size..]);

        let aad_len = self.aad_len;
        let prefix = self.layout.aad_prefix;
        let work = self.work_mut()?;
        work[..AES_BLOCK_SIZE].copy_from_slice(&b0);
        let header = &mut work[AES_BLOCK_SIZE..AES_BLOCK_SIZE + prefix];
        match prefix {
            0 => {}
            2 => header.copy_from_slice(&(aad_len as u16).to_be_bytes()),
            _ => {
                header[..2].copy_from_slice(&[0xFF, 0xFE]);
                header[2..].copy_from_slice(&(aad_len as u32).to_be_bytes());
            }
        }
        Ok(())
    }

    /// Counter block `flags || nonce || i`
    fn counter_block(&self, i: u64) -> [u8; AES_BLOCK_SIZE] {
        let length_size = AES_BLOCK_SIZE - 1 - self.nonce_len;
        let mut block = [0u8; AES_BLOCK_SIZE];
        block[0] = (length_size - 1) as u8;
        block[1..1 + self.nonce_len].copy_from_slice(&self.nonce[..self.nonce_len]);
        let i = i.to_be_bytes();
        block[1 + self.nonce_len..].copy_from_slice(&i[i.len() - length_size..]);
        block
    }

    fn work_mut(&mut self) -> SeResult<&mut [u8]> {
        self.work
            .as_mut()
            .map(|work| work.as_mut())
            .ok_or(SeError::DRIVER_CCM_INVALID_STATE)
    }

    fn release(&mut self, se: &mut SecurityEngine<H>) {
        self.state = CcmState::Done;
        self.nonce.zeroize();
        if let Some(mut work) = self.work.take() {
            work.as_mut().zeroize();
            se.hal_mut().put_buffer(work);
        }
    }
}

impl<H: SeHal> Drop for CcmSession<H> {
    fn drop(&mut self) {
        if let Some(work) = self.work.as_mut() {
            work.as_mut().zeroize();
        }
    }
}

/// CBC-MAC of `data` (whole blocks) with a zero IV.
fn cbc_mac<H: SeHal>(aes: &mut AesEngine<'_, H>, data: &[u8]) -> SeResult<[u8; AES_BLOCK_SIZE]> {
    aes.set_mode(aes_reg::MODE_CBC_MAC, false);
    aes.set_counter(&[0; AES_BLOCK_SIZE]);
    aes.stream(data, None)?;
    Ok(aes.counter())
}
