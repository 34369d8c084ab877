/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains API for the AES engine: key loading from registers or
    keyslots, DMA streaming split at physical discontinuities, and the
    CTR, CBC-MAC and GCM primitives used by the AEAD sessions.

--*/

use crate::array::Array4x4;
use crate::engine::{EngineGuard, PendingOp, SecurityEngine};
use crate::hal::{EngineId, SeHal};
use crate::key_slot::{KeySlot, KeySlotId, SlotKind};
use crate::reg::aes::{self as aes_reg, AesConfig};
use crate::{SeError, SeResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Largest AES key in bytes
pub const AES_MAX_KEY_SIZE: usize = 32;

/// Cipher direction
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// AES Key
#[derive(Debug, Copy, Clone)]
pub enum AesKey<'a> {
    /// Key bytes: 16, 24 or 32
    Array(&'a [u8]),

    /// Key previously loaded with `SecurityEngine::load_aes_keyslot`
    KeySlot(&'a KeySlot),
}

impl<'a> From<&'a [u8; 32]> for AesKey<'a> {
    fn from(value: &'a [u8; 32]) -> Self {
        Self::Array(value)
    }
}

impl<'a> From<&'a [u8; 16]> for AesKey<'a> {
    fn from(value: &'a [u8; 16]) -> Self {
        Self::Array(value)
    }
}

impl<'a> From<&'a KeySlot> for AesKey<'a> {
    fn from(value: &'a KeySlot) -> Self {
        Self::KeySlot(value)
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct KeyBytes {
    bytes: [u8; AES_MAX_KEY_SIZE],
    len: usize,
}

impl KeyBytes {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Key held by a session between calls
pub(crate) enum StoredKey {
    Array(KeyBytes),
    KeySlot(KeySlotId),
}

impl StoredKey {
    pub(crate) fn new(key: AesKey) -> SeResult<Self> {
        match key {
            AesKey::Array(bytes) => {
                key_size_field(bytes.len())?;
                let mut key = KeyBytes {
                    bytes: [0; AES_MAX_KEY_SIZE],
                    len: bytes.len(),
                };
                key.bytes[..bytes.len()].copy_from_slice(bytes);
                Ok(StoredKey::Array(key))
            }
            AesKey::KeySlot(slot) => {
                if slot.kind() != SlotKind::Aes {
                    return Err(SeError::DRIVER_KEYSLOT_INVALID_INDEX);
                }
                Ok(StoredKey::KeySlot(slot.id()))
            }
        }
    }

    /// True if `other` is loaded the same way (register or keyslot).
    pub(crate) fn same_kind(&self, other: &StoredKey) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

/// Counter and GHASH registers saved between calls
#[derive(Debug, Default, Copy, Clone, Zeroize)]
pub(crate) struct AesState {
    pub(crate) counter: Array4x4,
    pub(crate) ghash: Array4x4,
}

/// Block used for DMA of data that cannot be read or written in place
#[repr(C, align(16))]
struct BounceBlock([u8; AES_BLOCK_SIZE]);

/// Key size field for a key of `len` bytes.
pub(crate) fn key_size_field(len: usize) -> SeResult<u32> {
    match len {
        16 => Ok(aes_reg::KEY_SIZE_128),
        24 => Ok(aes_reg::KEY_SIZE_192),
        32 => Ok(aes_reg::KEY_SIZE_256),
        _ => Err(SeError::DRIVER_AES_INVALID_KEY_SIZE),
    }
}

/// Pack `key` into big-endian register words, zero filling the rest.
pub(crate) fn pack_key(key: &[u8], words: &mut [u32; aes_reg::KEY_WORDS]) {
    words.fill(0);
    for (word, chunk) in words.iter_mut().zip(key.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

/// Increment the last 32 bits of `block` modulo 2^32.
pub fn inc32(block: &mut [u8; AES_BLOCK_SIZE]) {
    let ctr = u32::from_be_bytes([block[12], block[13], block[14], block[15]]).wrapping_add(1);
    block[12..].copy_from_slice(&ctr.to_be_bytes());
}

fn load_key<H: SeHal>(guard: &mut EngineGuard<'_, H>, key: &StoredKey) -> SeResult<AesConfig> {
    let mut config = AesConfig(0);
    match key {
        StoredKey::Array(key) => {
            config.set_key_size(key_size_field(key.len)?);
            let mut words = [0u32; aes_reg::KEY_WORDS];
            pack_key(key.as_bytes(), &mut words);
            let mut regs = crate::array::Array4x8::from(words);
            regs.write_regs(guard, aes_reg::KEY);
            regs.zeroize();
            words.zeroize();
        }
        StoredKey::KeySlot(id) => {
            config.set_use_keyslot(true);
            config.set_keyslot(crate::operand::field(u32::from(id.index()), 4)?);
        }
    }
    Ok(config)
}

fn clear_key_regs<H: SeHal>(guard: &mut EngineGuard<'_, H>) {
    guard.clear_regs(aes_reg::KEY, aes_reg::KEY_WORDS);
    guard.clear_regs(aes_reg::IV, 4);
    guard.clear_regs(aes_reg::GHASH, 4);
}

fn program_dma<H: SeHal>(
    guard: &mut EngineGuard<'_, H>,
    config: AesConfig,
    src: *const u8,
    dst: Option<*mut u8>,
    len: usize,
) -> SeResult<()> {
    let data_len = u32::try_from(len).map_err(|_| SeError::DRIVER_AES_INVALID_LENGTH)?;
    guard.hal().flush_cache(src, len);
    let src_addr = guard.hal().phys_addr(src);
    let dst_addr = match dst {
        Some(dst) => {
            guard.hal().flush_cache(dst, len);
            guard.hal().phys_addr(dst)
        }
        None => 0,
    };
    guard.write(aes_reg::SRC_ADDR_LO, src_addr as u32);
    guard.write(aes_reg::SRC_ADDR_HI, (src_addr >> 32) as u32);
    guard.write(aes_reg::DST_ADDR_LO, dst_addr as u32);
    guard.write(aes_reg::DST_ADDR_HI, (dst_addr >> 32) as u32);
    guard.write(aes_reg::DATA_LEN, data_len);
    guard.write(aes_reg::CONFIG, config.0);
    Ok(())
}

/// Locked AES engine with a key loaded. Key, counter and GHASH
/// registers are cleared when dropped.
pub(crate) struct AesEngine<'a, H: SeHal> {
    guard: EngineGuard<'a, H>,
    config: AesConfig,
}

impl<'a, H: SeHal> AesEngine<'a, H> {
    pub(crate) fn lock(se: &'a mut SecurityEngine<H>, key: &StoredKey) -> SeResult<Self> {
        if let StoredKey::KeySlot(id) = key {
            se.check_aes_keyslot_id(*id)?;
        }
        let mut guard = se.lock(EngineId::Aes)?;
        match load_key(&mut guard, key) {
            Ok(config) => Ok(Self { guard, config }),
            Err(err) => {
                clear_key_regs(&mut guard);
                Err(err)
            }
        }
    }

    pub(crate) fn set_mode(&mut self, mode: u32, decrypt: bool) {
        self.config.set_mode(mode);
        self.config.set_decrypt(decrypt);
    }

    pub(crate) fn set_counter(&mut self, block: &[u8; AES_BLOCK_SIZE]) {
        Array4x4::from(block).write_regs(&mut self.guard, aes_reg::IV);
    }

    pub(crate) fn counter(&mut self) -> [u8; AES_BLOCK_SIZE] {
        Array4x4::read_regs(&mut self.guard, aes_reg::IV).into()
    }

    pub(crate) fn restore(&mut self, state: &AesState) {
        state.counter.write_regs(&mut self.guard, aes_reg::IV);
        state.ghash.write_regs(&mut self.guard, aes_reg::GHASH);
    }

    pub(crate) fn save(&mut self) -> AesState {
        AesState {
            counter: Array4x4::read_regs(&mut self.guard, aes_reg::IV),
            ghash: Array4x4::read_regs(&mut self.guard, aes_reg::GHASH),
        }
    }

    /// Run the current mode over `input`, writing `output` when the mode
    /// produces data. DMA is split where either buffer is physically
    /// discontiguous; a block straddling a discontinuity goes through a
    /// bounce block. Only the last piece may be shorter than a block.
    pub(crate) fn stream(&mut self, input: &[u8], mut output: Option<&mut [u8]>) -> SeResult<()> {
        if let Some(out) = output.as_deref() {
            if out.len() < input.len() {
                return Err(SeError::DRIVER_AES_OUTPUT_TOO_SMALL);
            }
        }

        let mut off = 0;
        while off < input.len() {
            let rest = input.len() - off;
            let src = input[off..].as_ptr();
            let mut run = self.guard.hal().contiguous_len(src, rest);
            if let Some(out) = output.as_deref() {
                run = run.min(self.guard.hal().contiguous_len(out[off..].as_ptr(), rest));
            }
            let chunk = if run == rest {
                rest
            } else {
                run - run % AES_BLOCK_SIZE
            };

            if chunk == 0 {
                let n = rest.min(AES_BLOCK_SIZE);
                let mut bounce = BounceBlock([0; AES_BLOCK_SIZE]);
                bounce.0[..n].copy_from_slice(&input[off..off + n]);
                let ptr = bounce.0.as_mut_ptr();
                let dst = output.as_ref().map(|_| ptr);
                let result = self.run_dma(ptr, dst, n);
                if let (Ok(()), Some(out)) = (&result, output.as_deref_mut()) {
                    out[off..off + n].copy_from_slice(&bounce.0[..n]);
                }
                bounce.0.zeroize();
                result?;
                off += n;
            } else {
                let dst = output.as_deref_mut().map(|out| out[off..].as_mut_ptr());
                self.run_dma(src, dst, chunk)?;
                off += chunk;
            }
        }
        Ok(())
    }

    /// Compute the GCM tag from the saved GHASH, the pre-counter block and
    /// the byte lengths of the additional data and text.
    pub(crate) fn gcm_tag(
        &mut self,
        j0: &[u8; AES_BLOCK_SIZE],
        aad_len: u64,
        text_len: u64,
    ) -> SeResult<[u8; AES_BLOCK_SIZE]> {
        self.set_counter(j0);
        self.guard.write(aes_reg::AAD_LEN_LO, aad_len as u32);
        self.guard.write(aes_reg::AAD_LEN_HI, (aad_len >> 32) as u32);
        self.guard.write(aes_reg::TEXT_LEN_LO, text_len as u32);
        self.guard.write(aes_reg::TEXT_LEN_HI, (text_len >> 32) as u32);
        self.set_mode(aes_reg::MODE_GCM_TAG, false);
        self.guard.write(aes_reg::CONFIG, self.config.0);
        self.guard
            .run(aes_reg::PRESET_START, SeError::DRIVER_AES_ENGINE_FAILURE)?;
        Ok(Array4x4::read_regs(&mut self.guard, aes_reg::TAG).into())
    }

    fn run_dma(&mut self, src: *const u8, dst: Option<*mut u8>, len: usize) -> SeResult<()> {
        program_dma(&mut self.guard, self.config, src, dst, len)?;
        self.guard
            .run(aes_reg::PRESET_START, SeError::DRIVER_AES_ENGINE_FAILURE)?;
        if let Some(dst) = dst {
            self.guard.hal().invalidate_cache(dst, len);
        }
        Ok(())
    }
}

impl<H: SeHal> Drop for AesEngine<'_, H> {
    fn drop(&mut self) {
        clear_key_regs(&mut self.guard);
    }
}

/// AES-CTR over `input`, starting from `counter`.
///
/// # Arguments
///
/// * `se` - Security engine
/// * `key` - Key
/// * `counter` - Initial counter block; receives the next counter block
/// * `input` - Data to encrypt or decrypt
/// * `output` - At least as long as `input`
pub fn ctr<H: SeHal>(
    se: &mut SecurityEngine<H>,
    key: AesKey,
    counter: &mut [u8; AES_BLOCK_SIZE],
    input: &[u8],
    output: &mut [u8],
) -> SeResult<()> {
    if output.len() < input.len() {
        return Err(SeError::DRIVER_AES_OUTPUT_TOO_SMALL);
    }
    let key = StoredKey::new(key)?;
    let mut aes = AesEngine::lock(se, &key)?;
    aes.set_mode(aes_reg::MODE_CTR, false);
    aes.set_counter(counter);
    aes.stream(input, Some(output))?;
    *counter = aes.counter();
    Ok(())
}

/// Start AES-CTR over `input` and return without waiting.
///
/// Both buffers must be physically contiguous; the engine reads and
/// writes them in place until [`AesPending::finish`].
pub fn ctr_start<'a, H: SeHal>(
    se: &'a mut SecurityEngine<H>,
    key: AesKey,
    counter: &[u8; AES_BLOCK_SIZE],
    input: &'a [u8],
    output: &'a mut [u8],
) -> SeResult<AesPending<'a, H>> {
    if input.is_empty() {
        return Err(SeError::DRIVER_AES_INVALID_LENGTH);
    }
    if output.len() < input.len() {
        return Err(SeError::DRIVER_AES_OUTPUT_TOO_SMALL);
    }
    let len = input.len();
    if se.hal().contiguous_len(input.as_ptr(), len) != len
        || se.hal().contiguous_len(output.as_ptr(), len) != len
    {
        return Err(SeError::DRIVER_AES_NOT_CONTIGUOUS);
    }
    let key = StoredKey::new(key)?;
    if let StoredKey::KeySlot(id) = &key {
        se.check_aes_keyslot_id(*id)?;
    }

    let mut guard = se.lock(EngineId::Aes)?;
    let started = load_key(&mut guard, &key).and_then(|mut config| {
        config.set_mode(aes_reg::MODE_CTR);
        Array4x4::from(counter).write_regs(&mut guard, aes_reg::IV);
        program_dma(
            &mut guard,
            config,
            input.as_ptr(),
            Some(output.as_mut_ptr()),
            len,
        )?;
        guard.start(aes_reg::PRESET_START, SeError::DRIVER_AES_ENGINE_FAILURE)
    });
    if let Err(err) = started {
        clear_key_regs(&mut guard);
        return Err(err);
    }
    Ok(AesPending {
        op: PendingOp::new(guard, SeError::DRIVER_AES_ENGINE_FAILURE)
            .with_cleanup(clear_key_regs::<H>),
        output: &mut output[..len],
    })
}

/// AES-CTR operation in flight
pub struct AesPending<'a, H: SeHal> {
    op: PendingOp<'a, H>,
    output: &'a mut [u8],
}

impl<'a, H: SeHal> AesPending<'a, H> {
    /// Non-blocking completion check
    pub fn poll(&mut self) -> bool {
        self.op.poll()
    }

    /// Wait for completion and release the engine.
    ///
    /// # Returns
    ///
    /// The next counter block
    pub fn finish(self) -> SeResult<[u8; AES_BLOCK_SIZE]> {
        let mut guard = self.op.finish()?;
        guard
            .hal()
            .invalidate_cache(self.output.as_mut_ptr(), self.output.len());
        let counter = Array4x4::read_regs(&mut guard, aes_reg::IV).into();
        clear_key_regs(&mut guard);
        Ok(counter)
    }
}
