/*++

Licensed under the Apache-2.0 license.

File Name:

    gcm.rs

Abstract:

    File contains the AES-GCM session: nonce and counter setup, streaming
    additional data and text through the AES engine, and tag export or
    constant time verification.

--*/

use crate::aes::{inc32, AesEngine, AesKey, AesState, Direction, StoredKey, AES_BLOCK_SIZE};
use crate::engine::SecurityEngine;
use crate::hal::SeHal;
use crate::printer::HexU32;
use crate::reg::aes as aes_reg;
use crate::{cprintln, SeError, SeResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Supported nonce length in bytes
pub const GCM_NONCE_SIZE: usize = 12;

/// Nonce used when the caller supplies an empty one
pub const GCM_DEFAULT_NONCE: [u8; GCM_NONCE_SIZE] = [0; GCM_NONCE_SIZE];

/// Shortest accepted tag in bytes
pub const GCM_MIN_TAG_SIZE: usize = 12;

/// Full tag size in bytes
pub const GCM_MAX_TAG_SIZE: usize = 16;

/// Largest text in bytes, 2^36 - 32
pub const GCM_MAX_TEXT_SIZE: u64 = (1 << 36) - 32;

/// Tag handling at finalization
#[derive(Debug)]
pub enum GcmTag<'a> {
    /// Encryption: receives the computed tag
    Export(&'a mut [u8]),

    /// Decryption: the expected tag
    Verify(&'a [u8]),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum GcmPhase {
    /// Accepting additional data
    Aad,

    /// Text started; additional data closed
    Text,

    /// Finalized or failed
    Done,
}

/// AES-GCM session
pub struct GcmSession {
    direction: Direction,
    key: Option<StoredKey>,
    phase: GcmPhase,
    tag_len: usize,

    /// Pre-counter block, nonce || 1
    j0: [u8; AES_BLOCK_SIZE],

    /// Counter and GHASH between calls
    state: AesState,

    aad_len: u64,
    text_len: u64,

    /// Partial block of additional data
    aad_buf: [u8; AES_BLOCK_SIZE],
    aad_used: usize,

    /// Partial block of text
    text_buf: [u8; AES_BLOCK_SIZE],
    text_used: usize,
}

impl GcmSession {
    /// Start a session.
    ///
    /// # Arguments
    ///
    /// * `direction` - Encrypt or decrypt
    /// * `nonce` - 12 bytes, or empty for [`GCM_DEFAULT_NONCE`]
    /// * `tag_len` - Tag length in bytes, 12 to 16, or 0 for 16
    pub fn new(direction: Direction, nonce: &[u8], tag_len: usize) -> SeResult<Self> {
        let nonce = match nonce.len() {
            0 => &GCM_DEFAULT_NONCE[..],
            GCM_NONCE_SIZE => nonce,
            // Other lengths derive J0 with GHASH under the raw key, which
            // a keyslot key never exposes.
            _ => return Err(SeError::DRIVER_GCM_UNSUPPORTED_NONCE_LENGTH),
        };
        let tag_len = match tag_len {
            0 => GCM_MAX_TAG_SIZE,
            GCM_MIN_TAG_SIZE..=GCM_MAX_TAG_SIZE => tag_len,
            _ => return Err(SeError::DRIVER_GCM_INVALID_TAG_LENGTH),
        };

        let mut j0 = [0u8; AES_BLOCK_SIZE];
        j0[..GCM_NONCE_SIZE].copy_from_slice(nonce);
        j0[AES_BLOCK_SIZE - 1] = 1;
        let mut counter = j0;
        inc32(&mut counter);

        Ok(Self {
            direction,
            key: None,
            phase: GcmPhase::Aad,
            tag_len,
            j0,
            state: AesState {
                counter: counter.into(),
                ghash: Default::default(),
            },
            aad_len: 0,
            text_len: 0,
            aad_buf: [0; AES_BLOCK_SIZE],
            aad_used: 0,
            text_buf: [0; AES_BLOCK_SIZE],
            text_used: 0,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn tag_len(&self) -> usize {
        self.tag_len
    }

    /// Set or replace the key. A key may be replaced by one of the same
    /// kind until the first additional data or text is processed.
    pub fn set_key(&mut self, key: AesKey) -> SeResult<()> {
        let key = StoredKey::new(key)?;
        if let Some(current) = &self.key {
            if !current.same_kind(&key) {
                return Err(SeError::DRIVER_GCM_KEY_KIND_CHANGED);
            }
        }
        if self.phase != GcmPhase::Aad || self.aad_len != 0 || self.aad_used != 0 {
            return Err(SeError::DRIVER_GCM_INVALID_STATE);
        }
        self.key = Some(key);
        Ok(())
    }

    /// Authenticate additional data. Only allowed before the first text.
    pub fn update_aad<H: SeHal>(&mut self, se: &mut SecurityEngine<H>, aad: &[u8]) -> SeResult<()> {
        match self.phase {
            GcmPhase::Aad => {}
            GcmPhase::Text => return Err(SeError::DRIVER_GCM_AAD_AFTER_DATA),
            GcmPhase::Done => return Err(SeError::DRIVER_GCM_INVALID_STATE),
        }
        if self.key.is_none() {
            return Err(SeError::DRIVER_GCM_KEY_NOT_SET);
        }

        let mut aad = aad;
        if self.aad_used > 0 {
            let take = (AES_BLOCK_SIZE - self.aad_used).min(aad.len());
            self.aad_buf[self.aad_used..][..take].copy_from_slice(&aad[..take]);
            self.aad_used += take;
            aad = &aad[take..];
        }
        let whole = aad.len() - aad.len() % AES_BLOCK_SIZE;
        let flush_buf = self.aad_used == AES_BLOCK_SIZE;
        if flush_buf || whole > 0 {
            let result = self.with_engine(se, |session, aes| {
                aes.set_mode(aes_reg::MODE_GCM_AAD, false);
                if flush_buf {
                    aes.stream(&session.aad_buf, None)?;
                    session.aad_len += AES_BLOCK_SIZE as u64;
                }
                aes.stream(&aad[..whole], None)?;
                session.aad_len += whole as u64;
                Ok(())
            });
            self.check(result)?;
            if flush_buf {
                self.aad_buf.zeroize();
                self.aad_used = 0;
            }
        }
        let rest = &aad[whole..];
        self.aad_buf[self.aad_used..][..rest.len()].copy_from_slice(rest);
        self.aad_used += rest.len();
        Ok(())
    }

    /// Encrypt or decrypt `input`. Whole blocks are processed; a trailing
    /// partial block is held until the next call.
    ///
    /// # Returns
    ///
    /// Number of bytes written to `output`
    pub fn update<H: SeHal>(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize> {
        self.check_text(input.len())?;
        let total = self.text_used + input.len();
        let produced = total - total % AES_BLOCK_SIZE;
        if output.len() < produced {
            return Err(SeError::DRIVER_GCM_OUTPUT_TOO_SMALL);
        }
        if produced == 0 {
            if self.phase == GcmPhase::Aad && self.aad_used > 0 {
                let result = self.with_engine(se, |session, aes| session.close_aad(aes));
                self.check(result)?;
            }
            // Too little for a block; no text reaches the engine.
            self.text_buf[self.text_used..][..input.len()].copy_from_slice(input);
            self.text_used += input.len();
            self.phase = GcmPhase::Text;
            return Ok(0);
        }

        let result = self.with_engine(se, |session, aes| {
            session.close_aad(aes)?;
            session.crypt(aes, input, output, false)
        });
        self.check(result)
    }

    /// Process the remaining text and produce or verify the tag.
    ///
    /// # Returns
    ///
    /// Number of bytes written to `output`
    pub fn finalize<H: SeHal>(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
        tag: GcmTag,
    ) -> SeResult<usize> {
        self.check_text(input.len())?;
        let produced = self.text_used + input.len();
        if output.len() < produced {
            return Err(SeError::DRIVER_GCM_OUTPUT_TOO_SMALL);
        }
        match (&tag, self.direction) {
            (GcmTag::Export(out), Direction::Encrypt) if out.len() < self.tag_len => {
                return Err(SeError::DRIVER_GCM_OUTPUT_TOO_SMALL);
            }
            (GcmTag::Verify(expected), Direction::Decrypt) if expected.len() != self.tag_len => {
                return Err(SeError::DRIVER_GCM_INVALID_TAG_LENGTH);
            }
            (GcmTag::Export(_), Direction::Encrypt) | (GcmTag::Verify(_), Direction::Decrypt) => {}
            _ => return Err(SeError::DRIVER_GCM_TAG_DIRECTION_MISMATCH),
        }

        let mut computed = [0u8; AES_BLOCK_SIZE];
        let result = self.with_engine(se, |session, aes| {
            session.close_aad(aes)?;
            let written = session.crypt(aes, input, output, true)?;
            computed = aes.gcm_tag(&session.j0, session.aad_len, session.text_len)?;
            Ok(written)
        });
        let result = result.and_then(|written| match tag {
            GcmTag::Export(out) => {
                out[..self.tag_len].copy_from_slice(&computed[..self.tag_len]);
                Ok(written)
            }
            GcmTag::Verify(expected) => {
                if bool::from(computed[..self.tag_len].ct_eq(expected)) {
                    Ok(written)
                } else {
                    output[..written].zeroize();
                    cprintln!("[gcm] tag mismatch");
                    Err(SeError::DRIVER_GCM_TAG_MISMATCH)
                }
            }
        });
        computed.zeroize();
        self.close();
        result
    }

    /// Clear all session state. The session must be initialized again.
    pub fn reset(&mut self) {
        self.close();
        self.key = None;
    }

    fn check_text(&self, len: usize) -> SeResult<()> {
        if self.phase == GcmPhase::Done {
            return Err(SeError::DRIVER_GCM_INVALID_STATE);
        }
        if self.key.is_none() {
            return Err(SeError::DRIVER_GCM_KEY_NOT_SET);
        }
        let total = self.text_len + (self.text_used + len) as u64;
        if total > GCM_MAX_TEXT_SIZE {
            return Err(SeError::DRIVER_GCM_DATA_TOO_LONG);
        }
        Ok(())
    }

    /// Lock the engine with the session key and state, run `f`, and save
    /// the state again.
    fn with_engine<H: SeHal, T>(
        &mut self,
        se: &mut SecurityEngine<H>,
        f: impl FnOnce(&mut Self, &mut AesEngine<'_, H>) -> SeResult<T>,
    ) -> SeResult<T> {
        let key = self.key.take().ok_or(SeError::DRIVER_GCM_KEY_NOT_SET)?;
        let result = AesEngine::lock(se, &key).and_then(|mut aes| {
            aes.restore(&self.state);
            let result = f(self, &mut aes)?;
            self.state = aes.save();
            Ok(result)
        });
        self.key = Some(key);
        result
    }

    /// Hash the held partial block of additional data and switch to text.
    fn close_aad<H: SeHal>(&mut self, aes: &mut AesEngine<'_, H>) -> SeResult<()> {
        if self.phase != GcmPhase::Aad {
            return Ok(());
        }
        if self.aad_used > 0 {
            aes.set_mode(aes_reg::MODE_GCM_AAD, false);
            aes.stream(&self.aad_buf[..self.aad_used], None)?;
            self.aad_len += self.aad_used as u64;
            self.aad_buf.zeroize();
            self.aad_used = 0;
        }
        self.phase = GcmPhase::Text;
        Ok(())
    }

    /// Run text through the engine. Unless `last`, a trailing partial
    /// block is held back.
    fn crypt<H: SeHal>(
        &mut self,
        aes: &mut AesEngine<'_, H>,
        input: &[u8],
        output: &mut [u8],
        last: bool,
    ) -> SeResult<usize> {
        aes.set_mode(aes_reg::MODE_GCM_TEXT, self.direction == Direction::Decrypt);
        let mut input = input;
        let mut written = 0;

        if self.text_used > 0 {
            let take = (AES_BLOCK_SIZE - self.text_used).min(input.len());
            self.text_buf[self.text_used..][..take].copy_from_slice(&input[..take]);
            self.text_used += take;
            input = &input[take..];
            if self.text_used < AES_BLOCK_SIZE && !last {
                return Ok(0);
            }
            let used = self.text_used;
            let mut block = [0u8; AES_BLOCK_SIZE];
            aes.stream(&self.text_buf[..used], Some(&mut block[..used]))?;
            output[..used].copy_from_slice(&block[..used]);
            block.zeroize();
            self.text_buf.zeroize();
            self.text_used = 0;
            self.text_len += used as u64;
            written = used;
        }

        let whole = if last {
            input.len()
        } else {
            input.len() - input.len() % AES_BLOCK_SIZE
        };
        if whole > 0 {
            aes.stream(&input[..whole], Some(&mut output[written..written + whole]))?;
            self.text_len += whole as u64;
            written += whole;
        }

        let rest = &input[whole..];
        self.text_buf[..rest.len()].copy_from_slice(rest);
        self.text_used = rest.len();
        Ok(written)
    }

    fn check<T>(&mut self, result: SeResult<T>) -> SeResult<T> {
        if let Err(err) = &result {
            cprintln!("[gcm] session failed {}", HexU32((*err).into()));
            self.close();
        }
        result
    }

    fn close(&mut self) {
        self.phase = GcmPhase::Done;
        self.state.zeroize();
        self.aad_buf.zeroize();
        self.text_buf.zeroize();
        self.aad_used = 0;
        self.text_used = 0;
    }
}

impl Drop for GcmSession {
    fn drop(&mut self) {
        self.close();
    }
}
